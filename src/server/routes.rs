//! Router configuration for the API server.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the router with all API routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/scraper/trigger", post(handlers::trigger_scrape))
        .route("/api/scraper/status", get(handlers::scrape_status))
        .route("/api/scraper/progress", get(handlers::scrape_progress))
        .route("/api/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
