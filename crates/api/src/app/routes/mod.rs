use axum::Router;

pub mod boms;
pub mod catalog;
pub mod system;
pub mod versions;

/// Router for all BOM endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/boms", boms::router())
        .nest("/versions", versions::router())
        .nest("/catalog", catalog::router())
}
