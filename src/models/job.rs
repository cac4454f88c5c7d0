use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Server-assigned identifier of an evidence job. Opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Processing status of an evidence job as reported by the forensic API.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// How the evidence entered the system.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    #[strum(serialize = "URL")]
    Url,
    #[strum(serialize = "Upload")]
    Upload,
}

/// File metadata collected during acquisition. Any field may be missing
/// while the job is still running.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvidenceMetadata {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub sha256_hash: Option<String>,
}

/// One entry of the chain-of-custody log. Read-only on the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustodyEvent {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

/// Point-in-time copy of a job as served by `GET /jobs/{job_id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub source: EvidenceSource,
    #[serde(default)]
    pub metadata: Option<EvidenceMetadata>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub chain_of_custody: Vec<CustodyEvent>,
}

/// Inconsistency between `status` and `completed_at`. Rendered, never fatal.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotAnomaly {
    /// `status == completed` but the server sent no completion time.
    #[strum(serialize = "completed job has no completion timestamp")]
    CompletedWithoutTimestamp,
    /// A completion time is present on a job that is not completed.
    #[strum(serialize = "completion timestamp present before completion")]
    TimestampBeforeCompletion,
}

impl JobSnapshot {
    /// Checks that `completed_at` is present iff the job is completed.
    pub fn anomaly(&self) -> Option<SnapshotAnomaly> {
        match (self.status, self.completed_at.is_some()) {
            (JobStatus::Completed, false) => Some(SnapshotAnomaly::CompletedWithoutTimestamp),
            (JobStatus::Completed, true) => None,
            (_, true) => Some(SnapshotAnomaly::TimestampBeforeCompletion),
            (_, false) => None,
        }
    }

    /// The recorded hash, only when it is authoritative.
    pub fn trusted_hash(&self) -> Option<&str> {
        if self.status != JobStatus::Completed {
            return None;
        }
        self.metadata.as_ref()?.sha256_hash.as_deref()
    }

    pub fn custody_event_count(&self) -> usize {
        self.chain_of_custody.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot(status: JobStatus, completed: bool) -> JobSnapshot {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        JobSnapshot {
            job_id: JobId::new("job-1"),
            status,
            source: EvidenceSource::Upload,
            metadata: Some(EvidenceMetadata {
                sha256_hash: Some("ab".repeat(32)),
                ..Default::default()
            }),
            created_at: created,
            completed_at: completed.then(|| created + chrono::Duration::minutes(5)),
            chain_of_custody: Vec::new(),
        }
    }

    #[test]
    fn test_deserialize_api_payload() {
        let json = r#"{
            "job_id": "7f3c",
            "status": "processing",
            "source": "url",
            "metadata": {"file_name": "disk.img", "file_size": 1048576},
            "created_at": "2024-03-01T09:30:00Z",
            "chain_of_custody": [
                {"timestamp": "2024-03-01T09:30:01Z", "action": "acquired", "actor": "api"}
            ]
        }"#;
        let snap: JobSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.job_id.as_str(), "7f3c");
        assert_eq!(snap.status, JobStatus::Processing);
        assert_eq!(snap.source, EvidenceSource::Url);
        assert_eq!(snap.completed_at, None);
        let meta = snap.metadata.as_ref().unwrap();
        assert_eq!(meta.file_size, Some(1_048_576));
        assert_eq!(meta.sha256_hash, None);
        assert_eq!(snap.custody_event_count(), 1);
    }

    #[test]
    fn test_consistent_snapshots_have_no_anomaly() {
        assert_eq!(snapshot(JobStatus::Completed, true).anomaly(), None);
        assert_eq!(snapshot(JobStatus::Pending, false).anomaly(), None);
        assert_eq!(snapshot(JobStatus::Failed, false).anomaly(), None);
    }

    #[test]
    fn test_completed_without_timestamp_is_flagged() {
        assert_eq!(
            snapshot(JobStatus::Completed, false).anomaly(),
            Some(SnapshotAnomaly::CompletedWithoutTimestamp)
        );
    }

    #[test]
    fn test_timestamp_on_running_job_is_flagged() {
        assert_eq!(
            snapshot(JobStatus::Processing, true).anomaly(),
            Some(SnapshotAnomaly::TimestampBeforeCompletion)
        );
    }

    #[test]
    fn test_hash_untrusted_until_completed() {
        assert!(snapshot(JobStatus::Processing, false).trusted_hash().is_none());
        assert_eq!(
            snapshot(JobStatus::Completed, true).trusted_hash(),
            Some("ab".repeat(32).as_str())
        );
    }

    #[test]
    fn test_status_display_matches_wire_format() {
        assert_eq!(JobStatus::Completed.to_string(), "completed");
        assert_eq!("failed".parse::<JobStatus>().unwrap(), JobStatus::Failed);
        assert_eq!(EvidenceSource::Url.to_string(), "URL");
    }
}
