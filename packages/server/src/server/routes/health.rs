use std::time::Duration;

use axum::{extract::Extension, http::StatusCode, Json};
use relay::DispatchSnapshot;
use serde::Serialize;

use crate::server::app::AppState;

const DB_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    database: DatabaseProbe,
    pool: PoolUsage,
    published_posts: DispatchSnapshot,
}

#[derive(Serialize)]
pub struct DatabaseProbe {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct PoolUsage {
    size: u32,
    idle: usize,
    max: u32,
}

async fn probe_database(state: &AppState) -> DatabaseProbe {
    let probe = sqlx::query("SELECT 1").execute(&state.db_pool);
    let error = match tokio::time::timeout(DB_PROBE_TIMEOUT, probe).await {
        Ok(Ok(_)) => None,
        Ok(Err(e)) => Some(format!("query failed: {}", e)),
        Err(_) => Some(format!("no answer within {:?}", DB_PROBE_TIMEOUT)),
    };

    DatabaseProbe {
        ok: error.is_none(),
        error,
    }
}

/// Liveness of the post store plus the published-post dispatcher counters.
///
/// Only the database decides the status code. Dropped events are reported
/// but do not make the service unhealthy.
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let database = probe_database(&state).await;
    let pool = PoolUsage {
        size: state.db_pool.size(),
        idle: state.db_pool.num_idle(),
        max: state.db_pool.options().get_max_connections(),
    };

    let (code, status) = if database.ok {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            pool,
            published_posts: state.dispatch_stats.snapshot(),
        }),
    )
}
