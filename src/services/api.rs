use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::future::Future;
use std::time::Duration;

use crate::error::ForensicError;
use crate::models::analytics::AnalyticsSummary;
use crate::models::job::{JobId, JobSnapshot};
use crate::models::verification::VerificationReport;

/// Operations this service consumes from the remote forensic API.
#[async_trait]
pub trait ForensicApi: Send + Sync + 'static {
    async fn analytics(&self, range: &str) -> Result<AnalyticsSummary, ForensicError>;

    async fn job(&self, job_id: &JobId) -> Result<JobSnapshot, ForensicError>;

    async fn report_pdf(&self, job_id: &JobId) -> Result<Vec<u8>, ForensicError>;

    async fn verify(&self, job_id: &JobId) -> Result<VerificationReport, ForensicError>;
}

/// Bound a request so a hung connection surfaces as an error.
pub async fn with_timeout<T, F>(limit: Duration, request: F) -> Result<T, ForensicError>
where
    F: Future<Output = Result<T, ForensicError>>,
{
    tokio::time::timeout(limit, request)
        .await
        .map_err(|_| ForensicError::Timeout(limit))?
}

/// Fetch one job, bounded by `limit`, rejecting payloads for a different id.
pub async fn fetch_job<A: ForensicApi + ?Sized>(
    api: &A,
    job_id: &JobId,
    limit: Duration,
) -> Result<JobSnapshot, ForensicError> {
    let snapshot = with_timeout(limit, api.job(job_id)).await?;
    if &snapshot.job_id != job_id {
        return Err(ForensicError::Decode(format!(
            "requested job {} but API answered with job {}",
            job_id, snapshot.job_id
        )));
    }
    Ok(snapshot)
}

/// reqwest client for the forensic API.
pub struct HttpForensicApi {
    http: Client,
    base: Url,
}

impl HttpForensicApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ForensicError> {
        let http = Client::builder()
            .user_agent(concat!("forensic-console/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        let base = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ForensicError::Network(format!("invalid forensic API URL: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(ForensicError::Network(format!(
                "forensic API URL {} cannot carry a path",
                base
            )));
        }

        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Base URL plus `segments`, each percent-encoded as a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn job_url(&self, job_id: &JobId, suffix: Option<&str>) -> Url {
        let mut segments = vec!["jobs", job_id.as_str()];
        segments.extend(suffix);
        self.endpoint(&segments)
    }

    /// Map HTTP status to the error taxonomy. 404 on a job path is `NotFound`.
    fn check_status(
        response: reqwest::Response,
        job_id: Option<&JobId>,
    ) -> Result<reqwest::Response, ForensicError> {
        let status = response.status();
        match (status, job_id) {
            (s, _) if s.is_success() => Ok(response),
            (StatusCode::NOT_FOUND, Some(id)) => Err(ForensicError::NotFound(id.clone())),
            (s, _) => Err(ForensicError::Network(format!(
                "forensic API returned HTTP {}",
                s
            ))),
        }
    }
}

#[async_trait]
impl ForensicApi for HttpForensicApi {
    async fn analytics(&self, range: &str) -> Result<AnalyticsSummary, ForensicError> {
        metrics::counter!("forensic_api_requests_total", "endpoint" => "analytics").increment(1);

        let response = self
            .http
            .get(self.endpoint(&["analytics"]))
            .query(&[("range", range)])
            .send()
            .await?;

        let summary = Self::check_status(response, None)?.json().await?;
        Ok(summary)
    }

    async fn job(&self, job_id: &JobId) -> Result<JobSnapshot, ForensicError> {
        metrics::counter!("forensic_api_requests_total", "endpoint" => "job").increment(1);

        let response = self.http.get(self.job_url(job_id, None)).send().await?;
        let snapshot = Self::check_status(response, Some(job_id))?.json().await?;
        Ok(snapshot)
    }

    async fn report_pdf(&self, job_id: &JobId) -> Result<Vec<u8>, ForensicError> {
        metrics::counter!("forensic_api_requests_total", "endpoint" => "pdf").increment(1);

        let response = self.http.get(self.job_url(job_id, Some("pdf"))).send().await?;
        let bytes = Self::check_status(response, Some(job_id))?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn verify(&self, job_id: &JobId) -> Result<VerificationReport, ForensicError> {
        metrics::counter!("forensic_api_requests_total", "endpoint" => "verify").increment(1);

        let response = self.http.post(self.job_url(job_id, Some("verify"))).send().await?;
        let report = Self::check_status(response, Some(job_id))?.json().await?;
        Ok(report)
    }
}
