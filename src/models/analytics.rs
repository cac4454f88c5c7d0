use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate job counters from `GET /analytics?range=<period>`.
///
/// Counters missing from the payload read as zero, and `Default` is the
/// all-zero summary shown before the first successful load.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalyticsSummary {
    #[serde(default)]
    pub total_jobs: u64,
    #[serde(default)]
    pub completed_jobs: u64,
    #[serde(default)]
    pub pending_jobs: u64,
    #[serde(default)]
    pub failed_jobs: u64,
}

/// Dashboard statistics as presented to the browser.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DashboardView {
    pub stats: AnalyticsSummary,
    /// Set when the most recent refresh failed; `stats` then holds the last
    /// good values (or zeros if nothing was ever loaded).
    pub degraded: bool,
    pub last_error: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub is_loading: bool,
}
