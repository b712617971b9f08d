//! Health check endpoint

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, http::StatusCode, Json};
use foodbank_shared::db::pool::{health_check as db_health_check, pool_stats, PoolStats};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: &'static str,

    pub version: &'static str,

    /// "connected" or "disconnected"
    pub database: &'static str,

    pub pool: PoolStats,

    /// Live parcel list streams currently subscribed to table changes
    pub live_subscribers: usize,
}

/// `GET /health`
///
/// Returns 200 when the database answers and 503 otherwise.
pub async fn health_check(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<HealthResponse>)> {
    let connected = match db_health_check(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            false
        }
    };

    let status = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok((
        status,
        Json(HealthResponse {
            status: if connected { "healthy" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            database: if connected { "connected" } else { "disconnected" },
            pool: pool_stats(&state.db),
            live_subscribers: state.hub.subscriber_count(),
        }),
    ))
}
