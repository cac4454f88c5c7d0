use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use forensic_console::app_state::AppState;
use forensic_console::config::AppConfig;
use forensic_console::routes;
use forensic_console::services::api::HttpForensicApi;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!(api = %config.forensic_api_url, "Initializing forensic-console");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!(
        "forensic_api_requests_total",
        "Requests sent to the forensic API, by endpoint"
    );
    metrics::describe_counter!(
        "job_fetch_failures_total",
        "Job snapshot fetches that failed, by error kind"
    );
    metrics::describe_counter!(
        "job_stale_responses_discarded_total",
        "Job fetch results dropped because a newer fetch was already applied"
    );
    metrics::describe_gauge!("job_cache_entries", "Jobs currently watched");
    metrics::describe_counter!(
        "integrity_verifications_total",
        "Integrity verification requests issued"
    );
    metrics::describe_counter!(
        "integrity_mismatches_total",
        "Integrity verifications that reported a hash mismatch"
    );
    metrics::describe_counter!(
        "dashboard_refresh_failures_total",
        "Failed refreshes of the aggregate dashboard statistics"
    );

    let api = HttpForensicApi::new(&config.forensic_api_url, config.request_timeout())
        .expect("Failed to initialize forensic API client");

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, api);

    let app = routes::router(state, prometheus_handle)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
