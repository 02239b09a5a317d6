use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use loomerp_bom::ExplodeOptions;
use loomerp_infra::{NewBom, NewVersion};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_bom))
        .route("/:id", get(get_bom))
        .route("/:id/explosion", get(explode))
        .route("/:id/cost", get(cost))
        .route("/:id/lead-time", get(lead_time))
        .route("/:id/versions", get(list_versions).post(create_version))
        .route("/:id/versions/current", get(current_version))
}

pub async fn create_bom(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateBomRequest>,
) -> axum::response::Response {
    let bom = match services.versions.create_bom(NewBom {
        code: body.code,
        name: body.name,
        product_style: body.product_style,
    }) {
        Ok(bom) => bom,
        Err(e) => return errors::domain_error_to_response(e),
    };

    (StatusCode::CREATED, Json(dto::BomResponse::from(bom))).into_response()
}

pub async fn get_bom(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let bom_id = match errors::parse_bom_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.versions.bom(bom_id) {
        Ok(bom) => Json(dto::BomResponse::from(bom)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn explode(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::CalculationQuery>,
) -> axum::response::Response {
    let (bom_id, version_id, quantity) = match parse_calculation(&id, &query) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let options = ExplodeOptions {
        include_optional: query.include_optional.unwrap_or(true),
    };

    match services.engine.explode(bom_id, version_id, quantity, options) {
        Ok(explosion) => Json(explosion).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn cost(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::CalculationQuery>,
) -> axum::response::Response {
    let (bom_id, version_id, quantity) = match parse_calculation(&id, &query) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let include_optional = query.include_optional.unwrap_or(true);

    match services.engine.cost(bom_id, version_id, quantity, include_optional) {
        Ok(breakdown) => Json(breakdown).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn lead_time(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::VersionQuery>,
) -> axum::response::Response {
    let bom_id = match errors::parse_bom_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let version_id = match errors::parse_optional_version_id(query.version_id.as_deref()) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.lead_time(bom_id, version_id) {
        Ok(lead_time) => Json(lead_time).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_versions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let bom_id = match errors::parse_bom_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    // Unknown BOMs are a 404 rather than an empty list.
    if let Err(e) = services.versions.bom(bom_id) {
        return errors::domain_error_to_response(e);
    }
    match services.versions.list_versions(bom_id) {
        Ok(versions) => Json(
            versions
                .iter()
                .map(dto::VersionResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn create_version(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreateVersionRequest>,
) -> axum::response::Response {
    let bom_id = match errors::parse_bom_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let created_by = match errors::parse_user_id(&body.created_by) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.versions.create_version(NewVersion {
        bom_id,
        label: body.label,
        description: body.description,
        created_by,
    }) {
        Ok(content) => (StatusCode::CREATED, Json(dto::VersionResponse::from(content))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn current_version(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let bom_id = match errors::parse_bom_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let content = services
        .versions
        .current_version(bom_id)
        .and_then(|version| services.versions.get_version(version.id_typed()));
    match content {
        Ok(content) => Json(dto::VersionResponse::from(content)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

fn parse_calculation(
    id: &str,
    query: &dto::CalculationQuery,
) -> Result<
    (
        loomerp_bom::BomId,
        Option<loomerp_bom::BomVersionId>,
        rust_decimal::Decimal,
    ),
    axum::response::Response,
> {
    let bom_id = errors::parse_bom_id(id)?;
    let version_id = errors::parse_optional_version_id(query.version_id.as_deref())?;
    let quantity = errors::parse_quantity(query.quantity.as_deref())?;
    Ok((bom_id, version_id, quantity))
}
