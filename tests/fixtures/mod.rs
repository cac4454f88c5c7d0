//! Snapshot and analytics fixtures shared by the integration tests.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use forensic_console::models::analytics::AnalyticsSummary;
use forensic_console::models::job::{
    CustodyEvent, EvidenceMetadata, EvidenceSource, JobId, JobSnapshot, JobStatus,
};
use forensic_console::models::verification::{HashComparison, VerificationReport};

pub const EVIDENCE_HASH: &str =
    "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

pub fn acquired_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 14, 8, 0, 0).unwrap()
}

/// A consistent snapshot for `status`: `completed_at` only when completed.
pub fn snapshot(job_id: &str, status: JobStatus) -> JobSnapshot {
    let completed = status == JobStatus::Completed;
    JobSnapshot {
        job_id: JobId::new(job_id),
        status,
        source: EvidenceSource::Upload,
        metadata: Some(EvidenceMetadata {
            file_name: Some("suspect-laptop.E01".to_string()),
            file_size: Some(4 * 1024 * 1024),
            mime_type: Some("application/octet-stream".to_string()),
            sha256_hash: completed.then(|| EVIDENCE_HASH.to_string()),
        }),
        created_at: acquired_at(),
        completed_at: completed.then(|| acquired_at() + chrono::Duration::minutes(12)),
        chain_of_custody: vec![CustodyEvent {
            timestamp: acquired_at(),
            action: "evidence_received".to_string(),
            actor: Some("intake".to_string()),
            details: None,
        }],
    }
}

pub fn report(job_id: &str, result: HashComparison) -> VerificationReport {
    VerificationReport {
        job_id: JobId::new(job_id),
        result,
        expected_hash: Some(EVIDENCE_HASH.to_string()),
        computed_hash: Some(match result {
            HashComparison::Match => EVIDENCE_HASH.to_string(),
            HashComparison::Mismatch => "0".repeat(64),
        }),
        verified_at: Some(acquired_at() + chrono::Duration::days(1)),
    }
}

pub fn summary(total: u64, completed: u64, pending: u64, failed: u64) -> AnalyticsSummary {
    AnalyticsSummary {
        total_jobs: total,
        completed_jobs: completed,
        pending_jobs: pending,
        failed_jobs: failed,
    }
}
