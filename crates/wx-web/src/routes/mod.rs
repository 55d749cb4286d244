//! HTTP route handlers.

pub mod api;
pub mod ingest;

use axum::Router;

use crate::AppState;

/// Create the query API router.
///
/// Routes:
/// - `GET /api/current` - latest cached reading
/// - `GET /api/history` - stored readings in a time window
/// - `GET /api/station` - station metadata
/// - `GET /api/publishers` - publisher status
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api::routes())
        .with_state(state)
}

/// Create the device ingestion router. Every path is accepted.
pub fn ingest_router(state: AppState) -> Router {
    Router::new()
        .fallback(ingest::ingest_handler)
        .with_state(state)
}
