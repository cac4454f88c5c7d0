use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ForensicError;
use crate::models::job::{CustodyEvent, JobId, JobSnapshot, JobStatus, SnapshotAnomaly};
use crate::models::verification::{Severity, VerificationState};
use crate::services::actions::JobActions;
use crate::services::poller::CacheState;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const NOT_COMPLETED: &str = "Processing...";

/// File information card.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileInfo {
    pub file_name: Option<String>,
    /// Size in MiB with two decimals, e.g. `"1.50 MB"`.
    pub size: Option<String>,
    pub mime_type: Option<String>,
    pub source: String,
}

/// Timeline card.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Timeline {
    pub acquired: String,
    pub completed: String,
    pub chain_events: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VerificationPanel {
    pub severity: Severity,
    pub headline: &'static str,
    pub in_flight: bool,
    #[serde(flatten)]
    pub state: Option<VerificationState>,
}

/// Everything the evidence detail page renders for one job.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EvidenceDetailView {
    pub job_id: JobId,
    pub status: Option<JobStatus>,
    pub is_loading: bool,
    pub sha256_hash: Option<String>,
    /// False until the job is completed; the hash is provisional before that.
    pub hash_authoritative: bool,
    pub file: Option<FileInfo>,
    pub timeline: Option<Timeline>,
    pub chain_of_custody: Vec<CustodyEvent>,
    pub actions: JobActions,
    pub anomaly: Option<SnapshotAnomaly>,
    pub verification: Option<VerificationPanel>,
    /// Set together with stale data when the latest refresh failed.
    pub error: Option<ForensicError>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_size_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

impl EvidenceDetailView {
    pub fn from_cache(
        job_id: &JobId,
        state: &CacheState,
        verification: Option<VerificationState>,
        verification_in_flight: bool,
    ) -> Self {
        let snapshot = state.data.as_ref();
        // Actions follow the latest status only; no data means nothing is allowed.
        let actions = match snapshot {
            Some(s) => JobActions::for_status(s.status),
            None => JobActions::for_status(JobStatus::Pending),
        };

        let verification = match (verification, verification_in_flight) {
            (None, false) => None,
            (outcome, in_flight) => Some(VerificationPanel {
                severity: outcome.as_ref().map_or(Severity::Info, |s| s.severity()),
                headline: match &outcome {
                    Some(s) if !in_flight => s.headline(),
                    _ => "Verifying integrity...",
                },
                in_flight,
                state: outcome,
            }),
        };

        Self {
            job_id: job_id.clone(),
            status: snapshot.map(|s| s.status),
            is_loading: state.is_loading,
            sha256_hash: snapshot
                .and_then(|s| s.metadata.as_ref())
                .and_then(|m| m.sha256_hash.clone()),
            hash_authoritative: snapshot.is_some_and(|s| s.trusted_hash().is_some()),
            file: snapshot.map(file_info),
            timeline: snapshot.map(timeline),
            chain_of_custody: snapshot
                .map(|s| s.chain_of_custody.clone())
                .unwrap_or_default(),
            actions,
            anomaly: snapshot.and_then(JobSnapshot::anomaly),
            verification,
            error: state.error.clone(),
            updated_at: state.updated_at,
        }
    }

    /// View for a one-off fetch outside the cache.
    pub fn from_snapshot(
        snapshot: JobSnapshot,
        verification: Option<VerificationState>,
        verification_in_flight: bool,
    ) -> Self {
        let job_id = snapshot.job_id.clone();
        let state = CacheState {
            data: Some(snapshot),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };
        Self::from_cache(&job_id, &state, verification, verification_in_flight)
    }
}

fn file_info(snapshot: &JobSnapshot) -> FileInfo {
    let meta = snapshot.metadata.clone().unwrap_or_default();
    FileInfo {
        file_name: meta.file_name,
        size: meta.file_size.map(format_size_mb),
        mime_type: meta.mime_type,
        source: snapshot.source.to_string(),
    }
}

fn timeline(snapshot: &JobSnapshot) -> Timeline {
    Timeline {
        acquired: format_timestamp(&snapshot.created_at),
        completed: snapshot
            .completed_at
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_else(|| NOT_COMPLETED.to_string()),
        chain_events: snapshot.custody_event_count(),
    }
}
