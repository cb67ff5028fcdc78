//! Health, readiness and liveness endpoints.

use axum::{extract::State, Json};
use persistence::{db, metrics::PoolUsage};
use serde::Serialize;
use tracing::warn;

use crate::app::AppState;
use crate::error::ApiError;

/// Body of `GET /api/health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub database: DatabaseReport,
    pub email: EmailReport,
}

#[derive(Debug, Serialize)]
pub struct DatabaseReport {
    pub latency_ms: u64,
    pub open_connections: u32,
    pub idle_connections: u32,
}

impl DatabaseReport {
    fn new(latency: std::time::Duration, usage: PoolUsage) -> Self {
        Self {
            latency_ms: latency.as_millis() as u64,
            open_connections: usage.open,
            idle_connections: usage.idle,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmailReport {
    pub enabled: bool,
    pub provider: String,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

async fn database_latency(state: &AppState) -> Result<std::time::Duration, ApiError> {
    db::ping(&state.pool).await.map_err(|e| {
        warn!(error = %e, "Database ping failed");
        ApiError::ServiceUnavailable("Database unavailable".to_string())
    })
}

/// Database round trip, pool usage and mail provider. 503 when the
/// database does not answer.
///
/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthReport>, ApiError> {
    let latency = database_latency(&state).await?;

    Ok(Json(HealthReport {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.app.environment.clone(),
        database: DatabaseReport::new(latency, PoolUsage::of(&state.pool)),
        email: EmailReport {
            enabled: state.email.is_enabled(),
            provider: state.config.email.provider.clone(),
        },
    }))
}

/// GET /api/health/live
pub async fn live() -> Json<HealthStatus> {
    Json(HealthStatus { status: "alive" })
}

/// GET /api/health/ready
pub async fn ready(State(state): State<AppState>) -> Result<Json<HealthStatus>, ApiError> {
    database_latency(&state).await?;
    Ok(Json(HealthStatus { status: "ready" }))
}
