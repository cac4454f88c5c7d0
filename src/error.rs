use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::time::Duration;

use crate::models::job::{JobId, JobStatus};
use crate::services::actions::Action;

/// Failures seen while talking to the forensic API or acting on a job.
///
/// `Clone` so the last error can sit in a cache entry next to stale data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForensicError {
    #[error("Forensic API request failed: {0}")]
    Network(String),

    #[error("Forensic API did not answer within {0:?}")]
    Timeout(Duration),

    #[error("No evidence job with id {0}")]
    NotFound(JobId),

    #[error("Unexpected response from forensic API: {0}")]
    Decode(String),

    #[error("{action} is not permitted while job is {status}")]
    PreconditionViolation { action: Action, status: JobStatus },
}

impl ForensicError {
    /// Stable machine-readable tag for presentation.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::NotFound(_) => "not_found",
            Self::Decode(_) => "decode",
            Self::PreconditionViolation { .. } => "precondition_violation",
        }
    }

    /// True when the failure says nothing about the job itself.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_) | Self::Decode(_))
    }
}

impl From<reqwest::Error> for ForensicError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl Serialize for ForensicError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ForensicError", 2)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}
