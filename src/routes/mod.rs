use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;

use crate::app_state::AppState;
use crate::error::ForensicError;
use crate::services::api::ForensicApi;

pub mod dashboard;
pub mod evidence;
pub mod health;
pub mod metrics;
pub mod settings;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ForensicError,
}

/// Handler error carrying the forensic error taxonomy to HTTP.
#[derive(Debug)]
pub struct ApiError(pub ForensicError);

impl From<ForensicError> for ApiError {
    fn from(err: ForensicError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ForensicError::NotFound(_) => StatusCode::NOT_FOUND,
            ForensicError::PreconditionViolation { .. } => StatusCode::CONFLICT,
            ForensicError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ForensicError::Network(_) | ForensicError::Decode(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody { error: self.0 })).into_response()
    }
}

/// Presentation API routes.
pub fn api_router<A: ForensicApi>(state: AppState<A>) -> Router {
    Router::new()
        .route("/health", get(health::health_check::<A>))
        .route("/api/v1/dashboard", get(dashboard::get_dashboard::<A>))
        .route("/api/v1/settings", get(settings::get_settings::<A>))
        .route("/api/v1/evidence/{job_id}", get(evidence::get_detail::<A>))
        .route(
            "/api/v1/evidence/{job_id}/events",
            get(evidence::stream_detail::<A>),
        )
        .route(
            "/api/v1/evidence/{job_id}/refresh",
            post(evidence::refresh::<A>),
        )
        .route(
            "/api/v1/evidence/{job_id}/verify",
            post(evidence::verify_integrity::<A>),
        )
        .route(
            "/api/v1/evidence/{job_id}/report",
            get(evidence::download_report::<A>),
        )
        .with_state(state)
}

/// Full application router including the Prometheus scrape endpoint.
pub fn router<A: ForensicApi>(state: AppState<A>, prometheus: Arc<PrometheusHandle>) -> Router {
    api_router(state).route(
        "/metrics",
        get(metrics::prometheus_metrics).with_state(prometheus),
    )
}
