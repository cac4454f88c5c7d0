//! Which user actions a job currently allows.
//!
//! Everything here is derived from `JobStatus` alone and recomputed on every
//! view build. Nothing is cached, so a status flip after a refresh is
//! reflected immediately.

use serde::Serialize;
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::error::ForensicError;
use crate::models::job::JobStatus;

/// User-triggered operations on an evidence job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    DownloadReport,
    VerifyIntegrity,
}

/// Allowed action set for one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobActions {
    pub can_download_report: bool,
    pub can_verify_integrity: bool,
}

impl JobActions {
    pub fn for_status(status: JobStatus) -> Self {
        Self {
            can_download_report: permits(status, Action::DownloadReport),
            can_verify_integrity: permits(status, Action::VerifyIntegrity),
        }
    }
}

/// Fail-closed: only the listed combinations are allowed.
pub fn permits(status: JobStatus, action: Action) -> bool {
    matches!(
        (status, action),
        (JobStatus::Completed, Action::DownloadReport)
            | (JobStatus::Completed, Action::VerifyIntegrity)
    )
}

/// Guard for code paths that must not run on an ineligible job.
pub fn require(status: JobStatus, action: Action) -> Result<(), ForensicError> {
    if permits(status, action) {
        Ok(())
    } else {
        Err(ForensicError::PreconditionViolation { action, status })
    }
}

/// Every action permitted for `status`.
pub fn allowed(status: JobStatus) -> Vec<Action> {
    Action::iter().filter(|a| permits(status, *a)).collect()
}
