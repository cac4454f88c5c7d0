use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::ForensicError;
use crate::models::job::JobId;

/// Server verdict from `POST /jobs/{job_id}/verify`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HashComparison {
    Match,
    Mismatch,
}

/// Body returned by the verify endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationReport {
    pub job_id: JobId,
    pub result: HashComparison,
    #[serde(default)]
    pub expected_hash: Option<String>,
    #[serde(default)]
    pub computed_hash: Option<String>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
}

/// How loudly an outcome must be presented.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Result of one integrity check.
///
/// `Compromised` comes from a request that succeeded and reported a
/// mismatch. `Unknown` means the request itself failed and nothing is known
/// about the evidence.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VerificationState {
    Verified { report: VerificationReport },
    Compromised { report: VerificationReport },
    Unknown { error: ForensicError },
}

impl VerificationState {
    pub fn from_report(report: VerificationReport) -> Self {
        match report.result {
            HashComparison::Match => Self::Verified { report },
            HashComparison::Mismatch => Self::Compromised { report },
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Verified { .. } => Severity::Info,
            Self::Unknown { .. } => Severity::Warning,
            Self::Compromised { .. } => Severity::Critical,
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            Self::Verified { .. } => "Integrity verified",
            Self::Compromised { .. } => "INTEGRITY MISMATCH: evidence may be compromised",
            Self::Unknown { .. } => "Integrity unknown: verification request failed",
        }
    }
}
