use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::ForensicError;
use crate::models::analytics::{AnalyticsSummary, DashboardView};
use crate::services::api::{with_timeout, ForensicApi};

/// Background refresher for the dashboard counters.
///
/// Best effort: a failed refresh keeps the last good counters and marks the
/// view degraded instead of failing the page. Counters are zero only until
/// the first successful load.
pub struct AnalyticsPoller {
    view: watch::Receiver<DashboardView>,
    task: JoinHandle<()>,
}

impl AnalyticsPoller {
    /// Start polling `GET /analytics?range=<range>` every `interval`.
    pub fn spawn<A: ForensicApi>(
        api: Arc<A>,
        range: String,
        interval: Duration,
        request_timeout: Duration,
    ) -> Self {
        let (tx, view) = watch::channel(DashboardView {
            is_loading: true,
            ..Default::default()
        });

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let result = with_timeout(request_timeout, api.analytics(&range)).await;
                apply_refresh(&tx, result);
            }
        });

        Self { view, task }
    }

    pub fn current(&self) -> DashboardView {
        self.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<DashboardView> {
        self.view.clone()
    }
}

impl Drop for AnalyticsPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Fold one refresh result into the dashboard view.
pub fn apply_refresh(
    tx: &watch::Sender<DashboardView>,
    result: Result<AnalyticsSummary, ForensicError>,
) {
    match result {
        Ok(stats) => {
            debug!(total = stats.total_jobs, "Dashboard statistics refreshed");
            tx.send_modify(|view| {
                view.stats = stats;
                view.degraded = false;
                view.last_error = None;
                view.refreshed_at = Some(Utc::now());
                view.is_loading = false;
            });
        }
        Err(err) => {
            metrics::counter!("dashboard_refresh_failures_total").increment(1);
            warn!(error = %err, "Dashboard statistics refresh failed, keeping last values");
            tx.send_modify(|view| {
                view.degraded = true;
                view.last_error = Some(err.to_string());
                view.is_loading = false;
            });
        }
    }
}
