use garde::Validate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::services::poller::{DASHBOARD_REFRESH, JOB_DETAIL_REFRESH};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    #[garde(length(min = 1))]
    pub bind_addr: String,

    /// Base URL of the forensic API, including the version prefix.
    #[serde(default = "default_api_url")]
    #[garde(url)]
    pub forensic_api_url: String,

    /// Upper bound for any single request to the forensic API.
    #[serde(default = "default_request_timeout_secs")]
    #[garde(range(min = 1, max = 120))]
    pub request_timeout_secs: u64,

    /// Period passed to `GET /analytics?range=`.
    #[serde(default = "default_analytics_range")]
    #[garde(length(min = 1, max = 16))]
    pub analytics_range: String,

    /// When false, job views fetch once and never poll.
    #[serde(default = "default_auto_refresh")]
    #[garde(skip)]
    pub auto_refresh: bool,

    /// Local evidence retention window. Displayed only, not enforced here.
    #[serde(default = "default_retention_days")]
    #[garde(range(min = 1, max = 365))]
    pub retention_days: u32,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_api_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_analytics_range() -> String {
    "7d".to_string()
}

fn default_auto_refresh() -> bool {
    true
}

fn default_retention_days() -> u32 {
    30
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] garde::Report),
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: AppConfig = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Poll interval for job detail views, `None` when auto-refresh is off.
    pub fn detail_interval(&self) -> Option<Duration> {
        self.auto_refresh.then_some(JOB_DETAIL_REFRESH)
    }

    pub fn settings_view(&self) -> SettingsView {
        SettingsView {
            forensic_api_url: self.forensic_api_url.clone(),
            auto_refresh: self.auto_refresh,
            retention_days: self.retention_days,
            dashboard_refresh_secs: DASHBOARD_REFRESH.as_secs(),
            job_detail_refresh_secs: JOB_DETAIL_REFRESH.as_secs(),
            request_timeout_secs: self.request_timeout_secs,
        }
    }
}

/// Read-only settings page.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SettingsView {
    pub forensic_api_url: String,
    pub auto_refresh: bool,
    pub retention_days: u32,
    pub dashboard_refresh_secs: u64,
    pub job_detail_refresh_secs: u64,
    pub request_timeout_secs: u64,
}
