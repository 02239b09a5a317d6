use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use rust_decimal::Decimal;
use serde_json::json;

use loomerp_bom::{BomId, BomVersionId};
use loomerp_core::{AggregateId, DomainError, UserId};

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    let (status, code) = match &err {
        DomainError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
        DomainError::InvalidId(_) => (StatusCode::BAD_REQUEST, "invalid_id"),
        DomainError::InvalidQuantity { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_quantity"),
        DomainError::EmptyApproverList { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "empty_approver_list")
        }
        DomainError::InvariantViolation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation"),
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        DomainError::ItemCostNotFound { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "item_cost_not_found")
        }
        DomainError::CyclicReference { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "cyclic_reference"),
        DomainError::MaxDepthExceeded { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "max_depth_exceeded")
        }
        DomainError::InvalidStateTransition { .. } => {
            (StatusCode::CONFLICT, "invalid_state_transition")
        }
        DomainError::VersionLocked { .. } => (StatusCode::CONFLICT, "version_locked"),
        DomainError::UnauthorizedApprover { .. } => (StatusCode::FORBIDDEN, "unauthorized_approver"),
        DomainError::DuplicateVersionLabel { .. } => (StatusCode::CONFLICT, "duplicate_version_label"),
        DomainError::DuplicateBomCode { .. } => (StatusCode::CONFLICT, "duplicate_bom_code"),
        DomainError::ConcurrentModification { .. } => (StatusCode::CONFLICT, "concurrent_modification"),
        DomainError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    json_error(status, code, message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

fn parse_aggregate_id(raw: &str, what: &str) -> Result<AggregateId, axum::response::Response> {
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}

pub fn parse_bom_id(raw: &str) -> Result<BomId, axum::response::Response> {
    parse_aggregate_id(raw, "bom").map(BomId::new)
}

pub fn parse_version_id(raw: &str) -> Result<BomVersionId, axum::response::Response> {
    parse_aggregate_id(raw, "bom version").map(BomVersionId::new)
}

pub fn parse_optional_version_id(
    raw: Option<&str>,
) -> Result<Option<BomVersionId>, axum::response::Response> {
    raw.filter(|s| !s.is_empty()).map(parse_version_id).transpose()
}

pub fn parse_user_id(raw: &str) -> Result<UserId, axum::response::Response> {
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id"))
}

/// Parse a production quantity. Sign is checked by the engine.
pub fn parse_quantity(raw: Option<&str>) -> Result<Decimal, axum::response::Response> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
        json_error(StatusCode::BAD_REQUEST, "invalid_input", "quantity is required")
    })?;
    Decimal::from_str(raw).map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_input",
            format!("quantity '{raw}' is not a number"),
        )
    })
}
