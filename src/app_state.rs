use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::api::ForensicApi;
use crate::services::dashboard::AnalyticsPoller;
use crate::services::integrity::IntegrityVerifier;
use crate::services::poller::{JobCache, DASHBOARD_REFRESH};

/// Shared application state passed to all route handlers.
pub struct AppState<A> {
    pub config: Arc<AppConfig>,
    pub api: Arc<A>,
    pub jobs: JobCache<A>,
    pub dashboard: Arc<AnalyticsPoller>,
    pub integrity: Arc<IntegrityVerifier<A>>,
}

impl<A> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            api: Arc::clone(&self.api),
            jobs: self.jobs.clone(),
            dashboard: Arc::clone(&self.dashboard),
            integrity: Arc::clone(&self.integrity),
        }
    }
}

impl<A: ForensicApi> AppState<A> {
    /// Build the state and start the dashboard poller. Needs a tokio runtime.
    pub fn new(config: AppConfig, api: A) -> Self {
        let api = Arc::new(api);
        let timeout = config.request_timeout();
        let dashboard = AnalyticsPoller::spawn(
            Arc::clone(&api),
            config.analytics_range.clone(),
            DASHBOARD_REFRESH,
            timeout,
        );

        Self {
            jobs: JobCache::new(Arc::clone(&api), timeout),
            integrity: Arc::new(IntegrityVerifier::new(Arc::clone(&api), timeout)),
            dashboard: Arc::new(dashboard),
            config: Arc::new(config),
            api,
        }
    }
}
