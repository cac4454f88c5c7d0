use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::services::api::{with_timeout, ForensicApi};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub forensic_api: ComponentHealth,
    pub watched_jobs: usize,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

/// GET /health — liveness plus reachability of the forensic API.
pub async fn health_check<A: ForensicApi>(
    State(state): State<AppState<A>>,
) -> (StatusCode, Json<HealthResponse>) {
    let start = std::time::Instant::now();
    let probe = with_timeout(
        state.config.request_timeout(),
        state.api.analytics(&state.config.analytics_range),
    )
    .await;

    let api_check = match probe {
        Ok(_) => ComponentHealth {
            status: "ok".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => ComponentHealth {
            status: "error".to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    };

    let healthy = api_check.status == "ok";
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            forensic_api: api_check,
            watched_jobs: state.jobs.len(),
        },
    };

    (status_code, Json(response))
}
