//! Polling cache behaviour against a scripted API on a paused clock.

mod fixtures;
mod helpers;

use fixtures::*;
use forensic_console::error::ForensicError;
use forensic_console::models::job::{JobId, JobStatus};
use forensic_console::services::poller::JobCache;
use helpers::FakeApi;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const TIMEOUT: Duration = Duration::from_secs(15);

fn cache(api: &Arc<FakeApi>) -> JobCache<FakeApi> {
    JobCache::new(Arc::clone(api), TIMEOUT)
}

#[tokio::test(start_paused = true)]
async fn test_newer_request_wins_over_late_older_response() {
    // t=0 issue -> t=200 processing; t=50 issue -> t=100 completed.
    let api = Arc::new(
        FakeApi::new()
            .push_job(200, Ok(snapshot("job-1", JobStatus::Processing)))
            .push_job(50, Ok(snapshot("job-1", JobStatus::Completed))),
    );
    let cache = cache(&api);
    let job_id = JobId::new("job-1");

    let sub = cache.subscribe(job_id.clone(), Some(Duration::from_secs(10)));
    sleep(Duration::from_millis(50)).await;
    assert!(cache.refresh(&job_id));

    sleep(Duration::from_millis(120)).await;
    assert_eq!(sub.current().data.unwrap().status, JobStatus::Completed);

    sleep(Duration::from_millis(200)).await;
    let state = sub.current();
    assert_eq!(state.data.unwrap().status, JobStatus::Completed);
    assert!(state.error.is_none());
    assert!(!state.is_fetching);
    assert_eq!(api.job_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_first_fetch_is_immediate_then_periodic() {
    let api = Arc::new(FakeApi::new().repeat_job(0, Ok(snapshot("job-1", JobStatus::Pending))));
    let cache = cache(&api);

    let mut sub = cache.subscribe(JobId::new("job-1"), Some(Duration::from_millis(100)));
    let state = sub.wait_for(|s| s.data.is_some()).await.unwrap();
    assert_eq!(state.data.unwrap().status, JobStatus::Pending);
    assert_eq!(api.job_calls(), 1);

    sleep(Duration::from_millis(350)).await;
    assert_eq!(api.job_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_stops_network_calls() {
    let api = Arc::new(FakeApi::new().repeat_job(0, Ok(snapshot("job-1", JobStatus::Processing))));
    let cache = cache(&api);

    let sub = cache.subscribe(JobId::new("job-1"), Some(Duration::from_millis(100)));
    sleep(Duration::from_millis(250)).await;
    let calls = api.job_calls();
    assert!(calls >= 2);

    cache.unsubscribe(sub);
    assert!(cache.is_empty());

    sleep(Duration::from_secs(5)).await;
    assert_eq!(api.job_calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_cancels_in_flight_fetch() {
    let api = Arc::new(FakeApi::new().repeat_job(500, Ok(snapshot("job-1", JobStatus::Completed))));
    let cache = cache(&api);
    let job_id = JobId::new("job-1");

    let sub = cache.subscribe(job_id.clone(), Some(Duration::from_millis(200)));
    sleep(Duration::from_millis(100)).await;
    assert_eq!(api.job_calls(), 1);
    drop(sub);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(api.job_calls(), 1);
    assert!(cache.peek(&job_id).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_tick_skipped_while_fetch_outstanding() {
    let api = Arc::new(FakeApi::new().repeat_job(350, Ok(snapshot("job-1", JobStatus::Processing))));
    let cache = cache(&api);

    let _sub = cache.subscribe(JobId::new("job-1"), Some(Duration::from_millis(100)));
    // Ticks at 100, 200 and 300 fall inside the first fetch; the one at 400 fires.
    sleep(Duration::from_millis(450)).await;
    assert_eq!(api.job_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_error_keeps_last_good_snapshot() {
    let api = Arc::new(
        FakeApi::new()
            .push_job(0, Ok(snapshot("job-1", JobStatus::Processing)))
            .repeat_job(0, Err(ForensicError::Network("connection refused".into()))),
    );
    let cache = cache(&api);

    let mut sub = cache.subscribe(JobId::new("job-1"), Some(Duration::from_millis(100)));
    sub.wait_for(|s| s.data.is_some()).await.unwrap();
    let state = sub.wait_for(|s| s.error.is_some()).await.unwrap();

    assert_eq!(state.data.unwrap().status, JobStatus::Processing);
    assert_eq!(
        state.error,
        Some(ForensicError::Network("connection refused".into()))
    );
    assert!(!state.is_loading);
}

#[tokio::test(start_paused = true)]
async fn test_hung_fetch_times_out() {
    let api = Arc::new(FakeApi::new().repeat_job(60_000, Ok(snapshot("job-1", JobStatus::Pending))));
    let cache = JobCache::new(Arc::clone(&api), Duration::from_secs(1));

    let mut sub = cache.subscribe(JobId::new("job-1"), None);
    assert!(sub.current().is_loading);

    let state = sub.wait_for(|s| s.error.is_some()).await.unwrap();
    assert_eq!(state.error, Some(ForensicError::Timeout(Duration::from_secs(1))));
    assert!(state.data.is_none());
    assert!(!state.is_loading);
}

#[tokio::test(start_paused = true)]
async fn test_not_found_surfaces() {
    let api = Arc::new(
        FakeApi::new().push_job(0, Err(ForensicError::NotFound(JobId::new("missing")))),
    );
    let cache = cache(&api);

    let mut sub = cache.subscribe(JobId::new("missing"), None);
    let state = sub.wait_for(|s| s.error.is_some()).await.unwrap();
    assert_eq!(state.error.unwrap().kind(), "not_found");
}

#[tokio::test(start_paused = true)]
async fn test_payload_for_other_job_is_rejected() {
    let api = Arc::new(FakeApi::new().push_job(0, Ok(snapshot("job-2", JobStatus::Completed))));
    let cache = cache(&api);

    let mut sub = cache.subscribe(JobId::new("job-1"), None);
    let state = sub.wait_for(|s| s.error.is_some()).await.unwrap();
    assert!(matches!(state.error, Some(ForensicError::Decode(_))));
    assert!(state.data.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_inconsistent_snapshot_is_kept_and_flagged() {
    let mut odd = snapshot("job-1", JobStatus::Completed);
    odd.completed_at = None;
    let api = Arc::new(FakeApi::new().push_job(0, Ok(odd)));
    let cache = cache(&api);

    let mut sub = cache.subscribe(JobId::new("job-1"), None);
    let state = sub.wait_for(|s| s.data.is_some()).await.unwrap();
    let data = state.data.unwrap();
    assert_eq!(data.status, JobStatus::Completed);
    assert!(data.anomaly().is_some());
    assert!(state.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_share_one_entry() {
    let api = Arc::new(FakeApi::new().repeat_job(0, Ok(snapshot("job-1", JobStatus::Pending))));
    let cache = cache(&api);
    let job_id = JobId::new("job-1");

    let first = cache.subscribe(job_id.clone(), Some(Duration::from_secs(10)));
    let mut second = cache.subscribe(job_id.clone(), Some(Duration::from_secs(10)));
    second.wait_for(|s| s.data.is_some()).await.unwrap();

    assert_eq!(cache.len(), 1);
    assert_eq!(api.job_calls(), 1);
    assert!(first.current().data.is_some());

    drop(first);
    assert_eq!(cache.len(), 1);
    sleep(Duration::from_millis(10_500)).await;
    assert_eq!(api.job_calls(), 2);

    drop(second);
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_no_interval_fetches_once() {
    let api = Arc::new(FakeApi::new().repeat_job(0, Ok(snapshot("job-1", JobStatus::Pending))));
    let cache = cache(&api);
    let job_id = JobId::new("job-1");

    let _sub = cache.subscribe(job_id.clone(), None);
    sleep(Duration::from_secs(120)).await;
    assert_eq!(api.job_calls(), 1);

    assert!(cache.refresh(&job_id));
    sleep(Duration::from_millis(1)).await;
    assert_eq!(api.job_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_unknown_job_is_rejected() {
    let api = Arc::new(FakeApi::new());
    let cache = cache(&api);
    assert!(!cache.refresh(&JobId::new("nobody")));
    assert_eq!(api.job_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_status_flip_is_observed() {
    let api = Arc::new(
        FakeApi::new()
            .push_job(0, Ok(snapshot("job-1", JobStatus::Processing)))
            .repeat_job(0, Ok(snapshot("job-1", JobStatus::Completed))),
    );
    let cache = cache(&api);

    let mut sub = cache.subscribe(JobId::new("job-1"), Some(Duration::from_secs(10)));
    sub.wait_for(|s| s.data.is_some()).await.unwrap();
    let state = sub
        .wait_for(|s| s.data.as_ref().is_some_and(|d| d.status == JobStatus::Completed))
        .await
        .unwrap();
    assert!(state.data.unwrap().completed_at.is_some());
}
