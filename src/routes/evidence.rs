use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::{self, Stream};
use tokio::sync::watch;

use crate::app_state::AppState;
use crate::models::job::{JobId, JobSnapshot};
use crate::models::view::EvidenceDetailView;
use crate::routes::ApiError;
use crate::services::actions::{self, Action};
use crate::services::api::{fetch_job, with_timeout, ForensicApi};
use crate::services::integrity::VerifyAttempt;
use crate::services::poller::{CacheState, Subscription};

fn build_view<A: ForensicApi>(
    state: &AppState<A>,
    job_id: &JobId,
    cache: &CacheState,
) -> EvidenceDetailView {
    EvidenceDetailView::from_cache(
        job_id,
        cache,
        state.integrity.last_outcome(job_id),
        state.integrity.is_in_flight(job_id),
    )
}

/// Latest known snapshot: the cached one if the job is watched, else a fresh fetch.
async fn current_snapshot<A: ForensicApi>(
    state: &AppState<A>,
    job_id: &JobId,
) -> Result<JobSnapshot, ApiError> {
    if let Some(snapshot) = state.jobs.peek(job_id).and_then(|c| c.data) {
        return Ok(snapshot);
    }
    let snapshot = fetch_job(state.api.as_ref(), job_id, state.config.request_timeout()).await?;
    Ok(snapshot)
}

/// GET /api/v1/evidence/{job_id} — one-shot evidence detail view.
pub async fn get_detail<A: ForensicApi>(
    State(state): State<AppState<A>>,
    Path(job_id): Path<String>,
) -> Result<Json<EvidenceDetailView>, ApiError> {
    let job_id = JobId::new(job_id);

    if let Some(cache) = state.jobs.peek(&job_id) {
        // Watched but never loaded: surface the error instead of an empty page.
        if let (None, Some(err)) = (&cache.data, &cache.error) {
            return Err(err.clone().into());
        }
        return Ok(Json(build_view(&state, &job_id, &cache)));
    }

    let snapshot = fetch_job(state.api.as_ref(), &job_id, state.config.request_timeout()).await?;
    Ok(Json(EvidenceDetailView::from_snapshot(
        snapshot,
        state.integrity.last_outcome(&job_id),
        state.integrity.is_in_flight(&job_id),
    )))
}

/// What one connected SSE client has seen so far.
struct LiveView<A> {
    subscription: Subscription,
    verdicts: watch::Receiver<u64>,
    state: AppState<A>,
    last: Option<EvidenceDetailView>,
}

impl<A: ForensicApi> LiveView<A> {
    /// Next view that differs from the last one sent. `None` once the entry is gone.
    async fn next_view(&mut self) -> Option<EvidenceDetailView> {
        loop {
            if self.last.is_some() {
                tokio::select! {
                    changed = self.subscription.next() => {
                        changed?;
                    }
                    changed = self.verdicts.changed() => {
                        changed.ok()?;
                    }
                }
            }
            let view = build_view(
                &self.state,
                self.subscription.job_id(),
                &self.subscription.current(),
            );
            if self.last.as_ref() != Some(&view) {
                return Some(view);
            }
        }
    }
}

/// GET /api/v1/evidence/{job_id}/events — live detail view over SSE.
///
/// Pushes a new view on every cache change and every verification start or
/// verdict. The subscription lives as long as the client stays connected.
pub async fn stream_detail<A: ForensicApi>(
    State(state): State<AppState<A>>,
    Path(job_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let job_id = JobId::new(job_id);
    let live = LiveView {
        subscription: state.jobs.subscribe(job_id, state.config.detail_interval()),
        verdicts: state.integrity.changes(),
        state,
        last: None,
    };

    let events = stream::unfold(live, |mut live| async move {
        let view = live.next_view().await?;
        let event = Event::default().event("snapshot").json_data(&view);
        live.last = Some(view);
        Some((event, live))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// POST /api/v1/evidence/{job_id}/refresh — retry affordance for a watched job.
pub async fn refresh<A: ForensicApi>(
    State(state): State<AppState<A>>,
    Path(job_id): Path<String>,
) -> StatusCode {
    if state.jobs.refresh(&JobId::new(job_id)) {
        StatusCode::ACCEPTED
    } else {
        StatusCode::NOT_FOUND
    }
}

/// POST /api/v1/evidence/{job_id}/verify — user-triggered integrity check.
pub async fn verify_integrity<A: ForensicApi>(
    State(state): State<AppState<A>>,
    Path(job_id): Path<String>,
) -> Result<Json<VerifyAttempt>, ApiError> {
    let job_id = JobId::new(job_id);
    if state.integrity.is_in_flight(&job_id) {
        return Ok(Json(VerifyAttempt::AlreadyInFlight));
    }
    let snapshot = current_snapshot(&state, &job_id).await?;
    let attempt = state.integrity.verify(&snapshot).await?;
    Ok(Json(attempt))
}

/// GET /api/v1/evidence/{job_id}/report — forensic PDF, completed jobs only.
pub async fn download_report<A: ForensicApi>(
    State(state): State<AppState<A>>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = JobId::new(job_id);
    let snapshot = current_snapshot(&state, &job_id).await?;
    actions::require(snapshot.status, Action::DownloadReport)?;

    let pdf = with_timeout(state.config.request_timeout(), state.api.report_pdf(&job_id)).await?;
    tracing::info!(job_id = %job_id, bytes = pdf.len(), "Serving forensic report");

    let disposition = format!("attachment; filename=\"{}\"", report_filename(&job_id));
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    ))
}

/// Attachment name keeping only the filename-safe characters of the id.
fn report_filename(job_id: &JobId) -> String {
    let stem: String = job_id
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    if stem.is_empty() {
        "forensic-report.pdf".to_string()
    } else {
        format!("forensic-report-{stem}.pdf")
    }
}
