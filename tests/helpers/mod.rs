//! Scripted in-memory forensic API for driving the cache and workflows.
#![allow(dead_code)]

use async_trait::async_trait;
use forensic_console::error::ForensicError;
use forensic_console::models::analytics::AnalyticsSummary;
use forensic_console::models::job::{JobId, JobSnapshot};
use forensic_console::models::verification::VerificationReport;
use forensic_console::services::api::ForensicApi;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;

/// One scripted answer: wait `delay`, then return `result`.
struct Step<T> {
    delay: Duration,
    result: Result<T, ForensicError>,
}

/// Answers are consumed in call order. When a script runs dry the
/// `repeat` answer (if set) is returned forever, otherwise a network error.
struct Script<T> {
    steps: VecDeque<Step<T>>,
    repeat: Option<Step<T>>,
}

impl<T: Clone> Script<T> {
    fn new() -> Self {
        Self {
            steps: VecDeque::new(),
            repeat: None,
        }
    }

    fn next(&mut self) -> (Duration, Result<T, ForensicError>) {
        if let Some(step) = self.steps.pop_front() {
            return (step.delay, step.result);
        }
        match &self.repeat {
            Some(step) => (step.delay, step.result.clone()),
            None => (
                Duration::ZERO,
                Err(ForensicError::Network("no scripted response".to_string())),
            ),
        }
    }
}

pub struct FakeApi {
    jobs: Mutex<Script<JobSnapshot>>,
    analytics: Mutex<Script<AnalyticsSummary>>,
    verifications: Mutex<Script<VerificationReport>>,
    pdf: Vec<u8>,
    job_calls: AtomicUsize,
    analytics_calls: AtomicUsize,
    verify_calls: AtomicUsize,
    pdf_calls: AtomicUsize,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(Script::new()),
            analytics: Mutex::new(Script::new()),
            verifications: Mutex::new(Script::new()),
            pdf: b"%PDF-1.7 forensic report".to_vec(),
            job_calls: AtomicUsize::new(0),
            analytics_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            pdf_calls: AtomicUsize::new(0),
        }
    }

    pub fn push_job(self, delay_ms: u64, result: Result<JobSnapshot, ForensicError>) -> Self {
        self.jobs.lock().unwrap().steps.push_back(Step {
            delay: Duration::from_millis(delay_ms),
            result,
        });
        self
    }

    pub fn repeat_job(self, delay_ms: u64, result: Result<JobSnapshot, ForensicError>) -> Self {
        self.jobs.lock().unwrap().repeat = Some(Step {
            delay: Duration::from_millis(delay_ms),
            result,
        });
        self
    }

    pub fn push_analytics(self, result: Result<AnalyticsSummary, ForensicError>) -> Self {
        self.analytics.lock().unwrap().steps.push_back(Step {
            delay: Duration::ZERO,
            result,
        });
        self
    }

    pub fn push_verify(
        self,
        delay_ms: u64,
        result: Result<VerificationReport, ForensicError>,
    ) -> Self {
        self.verifications.lock().unwrap().steps.push_back(Step {
            delay: Duration::from_millis(delay_ms),
            result,
        });
        self
    }

    pub fn job_calls(&self) -> usize {
        self.job_calls.load(Ordering::SeqCst)
    }

    pub fn analytics_calls(&self) -> usize {
        self.analytics_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn pdf_calls(&self) -> usize {
        self.pdf_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForensicApi for FakeApi {
    async fn analytics(&self, _range: &str) -> Result<AnalyticsSummary, ForensicError> {
        self.analytics_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, result) = self.analytics.lock().unwrap().next();
        sleep(delay).await;
        result
    }

    async fn job(&self, _job_id: &JobId) -> Result<JobSnapshot, ForensicError> {
        self.job_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, result) = self.jobs.lock().unwrap().next();
        sleep(delay).await;
        result
    }

    async fn report_pdf(&self, _job_id: &JobId) -> Result<Vec<u8>, ForensicError> {
        self.pdf_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.pdf.clone())
    }

    async fn verify(&self, _job_id: &JobId) -> Result<VerificationReport, ForensicError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, result) = self.verifications.lock().unwrap().next();
        sleep(delay).await;
        result
    }
}
