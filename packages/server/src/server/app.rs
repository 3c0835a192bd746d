//! Application setup and server configuration.

use std::sync::Arc;

use axum::{extract::Extension, routing::get, Router};
use relay::DispatchStats;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::server::routes::health_handler;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    /// Counters of the published-post dispatcher
    pub dispatch_stats: Arc<DispatchStats>,
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}
