use forensic_console::{
    config::AppConfig,
    models::job::{JobId, JobStatus},
    services::{
        api::HttpForensicApi,
        integrity::{IntegrityVerifier, VerifyAttempt},
        poller::{CacheState, JobCache, Subscription, JOB_DETAIL_REFRESH},
    },
};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: watch [--verify] <job_id>...";

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let mut verify = false;
    let mut job_ids = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--verify" => verify = true,
            _ => job_ids.push(JobId::new(arg)),
        }
    }
    if job_ids.is_empty() {
        eprintln!("{USAGE}");
        std::process::exit(2);
    }

    let config = AppConfig::from_env().expect("Failed to load configuration");
    let api = Arc::new(
        HttpForensicApi::new(&config.forensic_api_url, config.request_timeout())
            .expect("Failed to initialize forensic API client"),
    );
    let cache = JobCache::new(Arc::clone(&api), config.request_timeout());
    let verifier = Arc::new(IntegrityVerifier::new(api, config.request_timeout()));

    tracing::info!(jobs = job_ids.len(), "Watching evidence jobs");

    let mut watchers = JoinSet::new();
    for job_id in job_ids {
        let subscription = cache.subscribe(job_id, Some(JOB_DETAIL_REFRESH));
        watchers.spawn(watch_job(subscription, Arc::clone(&verifier), verify));
    }

    tokio::select! {
        _ = async { while watchers.join_next().await.is_some() {} } => {
            tracing::info!("All watched jobs reached a final status");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, releasing subscriptions");
        }
    }
}

/// Log every observed change of one job until it completes or fails.
async fn watch_job(
    mut subscription: Subscription,
    verifier: Arc<IntegrityVerifier<HttpForensicApi>>,
    verify: bool,
) {
    let mut last_status: Option<JobStatus> = None;
    let mut last_error: Option<String> = None;

    while let Some(state) = subscription.next().await {
        let job_id = subscription.job_id().clone();
        report_error(&job_id, &state, &mut last_error);

        let Some(snapshot) = state.data else {
            continue;
        };
        if last_status == Some(snapshot.status) {
            continue;
        }
        last_status = Some(snapshot.status);

        tracing::info!(
            job_id = %job_id,
            status = %snapshot.status,
            custody_events = snapshot.custody_event_count(),
            anomaly = ?snapshot.anomaly(),
            "Job status changed"
        );

        match snapshot.status {
            JobStatus::Completed => {
                tracing::info!(
                    job_id = %job_id,
                    sha256 = snapshot.trusted_hash().unwrap_or("-"),
                    "Evidence acquisition completed"
                );
                if verify {
                    match verifier.verify(&snapshot).await {
                        Ok(VerifyAttempt::Completed { outcome }) => tracing::info!(
                            job_id = %job_id,
                            severity = %outcome.severity(),
                            "{}",
                            outcome.headline()
                        ),
                        Ok(VerifyAttempt::AlreadyInFlight) => {}
                        Err(e) => tracing::error!(job_id = %job_id, error = %e, "Verification rejected"),
                    }
                }
                return;
            }
            JobStatus::Failed => {
                tracing::warn!(job_id = %job_id, "Evidence acquisition failed");
                return;
            }
            JobStatus::Pending | JobStatus::Processing => {}
        }
    }
}

fn report_error(job_id: &JobId, state: &CacheState, last_error: &mut Option<String>) {
    let current = state.error.as_ref().map(|e| e.to_string());
    if current != *last_error {
        if let Some(message) = &current {
            tracing::warn!(job_id = %job_id, error = %message, stale = state.data.is_some(), "Refresh failed");
        }
        *last_error = current;
    }
}
