use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};

use loomerp_core::{DomainResult, UserId};
use loomerp_infra::VersionContent;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(get_version))
        .route("/:id/lines", post(add_line))
        .route("/:id/lines/:line_no", put(update_line).delete(remove_line))
        .route("/:id/submit", post(submit))
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
        .route("/:id/activate", post(activate))
}

fn content_response(result: DomainResult<VersionContent>) -> axum::response::Response {
    match result {
        Ok(content) => Json(dto::VersionResponse::from(content)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

fn version_response(result: DomainResult<loomerp_bom::BomVersion>) -> axum::response::Response {
    match result {
        Ok(version) => Json(dto::VersionResponse::from(&version)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_version(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let version_id = match errors::parse_version_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    content_response(services.versions.get_version(version_id))
}

pub async fn add_line(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::LineRequest>,
) -> axum::response::Response {
    let version_id = match errors::parse_version_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(line_no) = body.line_no else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_input", "line_no is required");
    };
    let (line, expected) = body.into_line(line_no);

    match services.versions.add_line(version_id, line, expected) {
        Ok(content) => (StatusCode::CREATED, Json(dto::VersionResponse::from(content))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_line(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, line_no)): Path<(String, u32)>,
    Json(body): Json<dto::LineRequest>,
) -> axum::response::Response {
    let version_id = match errors::parse_version_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (line, expected) = body.into_line(line_no);
    content_response(services.versions.update_line(version_id, line_no, line, expected))
}

pub async fn remove_line(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, line_no)): Path<(String, u32)>,
    Query(query): Query<dto::RevisionQuery>,
) -> axum::response::Response {
    let version_id = match errors::parse_version_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    content_response(
        services
            .versions
            .remove_line(version_id, line_no, query.expected_revision),
    )
}

pub async fn submit(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::SubmitRequest>,
) -> axum::response::Response {
    let version_id = match errors::parse_version_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let approvers = match body
        .approvers
        .iter()
        .map(|raw| errors::parse_user_id(raw))
        .collect::<Result<Vec<UserId>, _>>()
    {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    version_response(
        services
            .versions
            .submit_for_approval(version_id, approvers, body.expected_revision),
    )
}

pub async fn approve(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::DecisionRequest>,
) -> axum::response::Response {
    let (version_id, actor) = match parse_decision(&id, &body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    version_response(
        services
            .versions
            .approve(version_id, actor, body.comment, body.expected_revision),
    )
}

pub async fn reject(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::DecisionRequest>,
) -> axum::response::Response {
    let (version_id, actor) = match parse_decision(&id, &body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    version_response(
        services
            .versions
            .reject(version_id, actor, body.comment, body.expected_revision),
    )
}

pub async fn activate(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::RevisionQuery>,
) -> axum::response::Response {
    let version_id = match errors::parse_version_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    version_response(services.versions.activate(version_id, query.expected_revision))
}

fn parse_decision(
    id: &str,
    body: &dto::DecisionRequest,
) -> Result<(loomerp_bom::BomVersionId, UserId), axum::response::Response> {
    Ok((errors::parse_version_id(id)?, errors::parse_user_id(&body.actor)?))
}
