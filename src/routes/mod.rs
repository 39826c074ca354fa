pub mod admin;
pub mod events;
pub mod health;
pub mod stats;

use axum::extract::DefaultBodyLimit;
use axum::Router;

use crate::middleware::request_id;
use crate::response::AppError;
use crate::state::AppState;

/// Maximum request body size: 256 KiB; ingestion events and config patches
/// are small JSON documents.
const MAX_BODY_SIZE: usize = 256 * 1024;

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .nest("/events", events::router())
        .nest("/stats", stats::router())
        .nest("/admin", admin::router())
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE));

    Router::new()
        .nest("/api", api_routes)
        .nest("/health", health::router())
        .fallback(fallback_404)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .with_state(state)
}

async fn fallback_404() -> AppError {
    AppError::not_found("资源不存在")
}
