//! User-triggered integrity re-verification of completed evidence.
//!
//! Independent from the polling cache: a verification never rewrites the
//! cached snapshot, it only records a verdict next to it.

use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::ForensicError;
use crate::models::job::{JobId, JobSnapshot};
use crate::models::verification::VerificationState;
use crate::services::actions::{self, Action};
use crate::services::api::{with_timeout, ForensicApi};

/// What happened when the user asked for a verification.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "attempt", rename_all = "snake_case")]
pub enum VerifyAttempt {
    /// The request ran and produced a verdict (or failed to).
    Completed { outcome: VerificationState },
    /// Another verification of the same job is still running.
    AlreadyInFlight,
}

/// Verdicts kept for display before the oldest one is forgotten.
pub const RETAINED_OUTCOMES: usize = 256;

pub struct IntegrityVerifier<A> {
    api: Arc<A>,
    request_timeout: Duration,
    in_flight: Mutex<HashSet<JobId>>,
    outcomes: Mutex<Outcomes>,
    changes: watch::Sender<u64>,
}

/// Last verdict per job, bounded, oldest evicted first.
struct Outcomes {
    by_job: HashMap<JobId, VerificationState>,
    order: VecDeque<JobId>,
    capacity: usize,
}

impl Outcomes {
    fn new(capacity: usize) -> Self {
        Self {
            by_job: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn insert(&mut self, job_id: JobId, outcome: VerificationState) {
        if self.by_job.insert(job_id.clone(), outcome).is_some() {
            self.order.retain(|id| id != &job_id);
        }
        self.order.push_back(job_id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.by_job.remove(&oldest);
            }
        }
    }
}

/// Clears the in-flight mark even if the caller is cancelled mid-request.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<JobId>>,
    changes: &'a watch::Sender<u64>,
    job_id: JobId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        lock(self.set).remove(&self.job_id);
        bump(self.changes);
    }
}

fn bump(changes: &watch::Sender<u64>) {
    changes.send_modify(|version| *version = version.wrapping_add(1));
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<A: ForensicApi> IntegrityVerifier<A> {
    pub fn new(api: Arc<A>, request_timeout: Duration) -> Self {
        Self {
            api,
            request_timeout,
            in_flight: Mutex::new(HashSet::new()),
            outcomes: Mutex::new(Outcomes::new(RETAINED_OUTCOMES)),
            changes: watch::Sender::new(0),
        }
    }

    /// Keep at most `capacity` verdicts (at least one).
    pub fn with_retention(self, capacity: usize) -> Self {
        lock(&self.outcomes).capacity = capacity.max(1);
        self
    }

    /// Ask the API to recompute and compare the evidence hash.
    ///
    /// Rejects jobs that are not completed without touching the network.
    /// A request failure is returned as `VerificationState::Unknown`, not as
    /// `Err`, so it stays distinguishable from a mismatch.
    pub async fn verify(&self, snapshot: &JobSnapshot) -> Result<VerifyAttempt, ForensicError> {
        let job_id = &snapshot.job_id;
        if let Err(err) = actions::require(snapshot.status, Action::VerifyIntegrity) {
            warn!(job_id = %job_id, status = %snapshot.status, "Rejected verification of ineligible job");
            return Err(err);
        }

        let Some(_guard) = self.try_claim(job_id) else {
            info!(job_id = %job_id, "Verification already running, ignoring request");
            return Ok(VerifyAttempt::AlreadyInFlight);
        };

        metrics::counter!("integrity_verifications_total").increment(1);
        let outcome = match with_timeout(self.request_timeout, self.api.verify(job_id)).await {
            Ok(report) if &report.job_id != job_id => VerificationState::Unknown {
                error: ForensicError::Decode(format!(
                    "verification answered for job {} instead of {}",
                    report.job_id, job_id
                )),
            },
            Ok(report) => VerificationState::from_report(report),
            Err(err) => VerificationState::Unknown { error: err },
        };

        match &outcome {
            VerificationState::Verified { .. } => {
                info!(job_id = %job_id, "Evidence integrity verified")
            }
            VerificationState::Compromised { report } => {
                metrics::counter!("integrity_mismatches_total").increment(1);
                error!(
                    job_id = %job_id,
                    expected = report.expected_hash.as_deref().unwrap_or("-"),
                    computed = report.computed_hash.as_deref().unwrap_or("-"),
                    "EVIDENCE HASH MISMATCH"
                );
            }
            VerificationState::Unknown { error } => {
                warn!(job_id = %job_id, error = %error, "Verification request failed")
            }
        }

        // The guard drop after this publishes the verdict to watchers.
        lock(&self.outcomes).insert(job_id.clone(), outcome.clone());
        Ok(VerifyAttempt::Completed { outcome })
    }

    /// Most recent verdict for `job_id`, if any verification ran.
    pub fn last_outcome(&self, job_id: &JobId) -> Option<VerificationState> {
        lock(&self.outcomes).by_job.get(job_id).cloned()
    }

    /// Ticks whenever a verification starts or finishes, for any job.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn is_in_flight(&self, job_id: &JobId) -> bool {
        lock(&self.in_flight).contains(job_id)
    }

    fn try_claim(&self, job_id: &JobId) -> Option<InFlightGuard<'_>> {
        if !lock(&self.in_flight).insert(job_id.clone()) {
            return None;
        }
        bump(&self.changes);
        Some(InFlightGuard {
            set: &self.in_flight,
            changes: &self.changes,
            job_id: job_id.clone(),
        })
    }
}
