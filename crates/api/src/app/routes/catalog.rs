use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    response::IntoResponse,
    routing::put,
};

use loomerp_bom::{ItemId, UnitOfMeasure};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/items/:item_id", put(upsert_item))
}

pub async fn upsert_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(item_id): Path<String>,
    Json(body): Json<dto::UpsertItemRequest>,
) -> axum::response::Response {
    match services.catalog.upsert(
        ItemId::new(item_id.trim()),
        body.unit_cost,
        UnitOfMeasure::new(body.base_uom.trim()),
    ) {
        Ok(item) => Json(item).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
