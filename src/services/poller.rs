//! Per-job snapshot cache kept fresh by interval polling.
//!
//! One poll task runs per cached job and is shared by every subscriber of
//! that job. Each fetch is numbered when it is issued and a result is only
//! applied if no newer fetch has been applied already, so a slow response
//! can never overwrite a fresher one. Releasing the last subscriber closes
//! the entry and aborts the poll task together with its in-flight fetches.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::ForensicError;
use crate::models::job::{JobId, JobSnapshot};
use crate::services::api::{fetch_job, ForensicApi};

/// Refresh period for the aggregate dashboard statistics.
pub const DASHBOARD_REFRESH: Duration = Duration::from_secs(30);

/// Refresh period for a single job detail view.
pub const JOB_DETAIL_REFRESH: Duration = Duration::from_secs(10);

/// What a subscriber sees for one job.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CacheState {
    /// Last accepted snapshot. Kept when a later fetch fails.
    pub data: Option<JobSnapshot>,
    /// No data yet and a fetch is outstanding.
    pub is_loading: bool,
    /// Any fetch is outstanding.
    pub is_fetching: bool,
    /// Error of the most recent applied fetch, cleared on the next success.
    pub error: Option<ForensicError>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Outcome of handing a fetch result to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Accepted,
    /// A newer fetch was already applied; the result was dropped.
    Stale,
    /// The entry was evicted while the fetch was running.
    Closed,
}

#[derive(Debug, Default)]
struct Ledger {
    issued: u64,
    applied: u64,
    outstanding: usize,
    closed: bool,
}

/// Issue-ordered state holder for one job.
pub struct Slot {
    job_id: JobId,
    ledger: Mutex<Ledger>,
    state: watch::Sender<CacheState>,
}

impl Slot {
    pub fn new(job_id: JobId) -> Self {
        let (state, _) = watch::channel(CacheState {
            is_loading: true,
            is_fetching: true,
            ..Default::default()
        });
        Self {
            job_id,
            ledger: Mutex::new(Ledger::default()),
            state,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new fetch and return its sequence number.
    /// `None` once the slot is closed.
    pub fn begin(&self) -> Option<u64> {
        let mut ledger = self.ledger();
        if ledger.closed {
            return None;
        }
        ledger.issued += 1;
        ledger.outstanding += 1;
        self.state.send_modify(|s| {
            s.is_fetching = true;
            s.is_loading = s.data.is_none();
        });
        Some(ledger.issued)
    }

    /// Apply the result of fetch `seq` unless a newer one already landed.
    pub fn complete(&self, seq: u64, result: Result<JobSnapshot, ForensicError>) -> Applied {
        let mut ledger = self.ledger();
        if ledger.closed {
            return Applied::Closed;
        }
        ledger.outstanding = ledger.outstanding.saturating_sub(1);
        let fresh = seq > ledger.applied;
        if fresh {
            ledger.applied = seq;
        }
        let fetching = ledger.outstanding > 0;

        if let (true, Ok(snapshot)) = (fresh, &result) {
            if let Some(anomaly) = snapshot.anomaly() {
                warn!(job_id = %self.job_id, status = %snapshot.status, %anomaly, "Accepted inconsistent snapshot");
            }
        }

        self.state.send_modify(|s| {
            if fresh {
                match result {
                    Ok(snapshot) => {
                        s.data = Some(snapshot);
                        s.error = None;
                        s.updated_at = Some(Utc::now());
                    }
                    Err(err) => s.error = Some(err),
                }
            }
            s.is_fetching = fetching;
            s.is_loading = fetching && s.data.is_none();
        });

        if fresh {
            Applied::Accepted
        } else {
            Applied::Stale
        }
    }

    /// Stop accepting results. Nothing is written to the state afterwards.
    pub fn close(&self) {
        self.ledger().closed = true;
    }

    pub fn outstanding(&self) -> usize {
        self.ledger().outstanding
    }

    pub fn current(&self) -> CacheState {
        self.state.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<CacheState> {
        self.state.subscribe()
    }
}

trait Release: Send + Sync {
    fn release(&self, job_id: &JobId);
}

struct Entry {
    slot: Arc<Slot>,
    subscribers: usize,
    refresh: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

struct Inner<A> {
    api: Arc<A>,
    request_timeout: Duration,
    entries: Mutex<HashMap<JobId, Entry>>,
}

impl<A> Inner<A> {
    fn entries(&self) -> MutexGuard<'_, HashMap<JobId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A: ForensicApi> Release for Inner<A> {
    fn release(&self, job_id: &JobId) {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(job_id) else {
            return;
        };
        entry.subscribers = entry.subscribers.saturating_sub(1);
        if entry.subscribers > 0 {
            debug!(job_id = %job_id, remaining = entry.subscribers, "Subscriber released");
            return;
        }

        if let Some(entry) = entries.remove(job_id) {
            entry.slot.close();
            entry.task.abort();
            info!(job_id = %job_id, "Evicted job from cache");
        }
        metrics::gauge!("job_cache_entries").set(entries.len() as f64);
    }
}

/// Shared cache of job snapshots, one entry per watched job.
pub struct JobCache<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for JobCache<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: ForensicApi> JobCache<A> {
    pub fn new(api: Arc<A>, request_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                request_timeout,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Start watching `job_id`. The first subscriber triggers an immediate
    /// fetch and, with `Some(interval)`, periodic refetches. Later
    /// subscribers share the existing entry and its timer.
    ///
    /// Must be called inside a tokio runtime.
    pub fn subscribe(&self, job_id: JobId, interval: Option<Duration>) -> Subscription {
        let mut entries = self.inner.entries();
        let entry = entries.entry(job_id.clone()).or_insert_with(|| {
            info!(job_id = %job_id, interval_ms = interval.map(|d| d.as_millis() as u64), "Watching job");
            self.spawn_entry(&job_id, interval)
        });
        entry.subscribers += 1;
        let rx = entry.slot.watch();
        metrics::gauge!("job_cache_entries").set(entries.len() as f64);

        let releaser: Arc<dyn Release> = self.inner.clone();
        Subscription {
            job_id,
            rx,
            releaser: Some(releaser),
        }
    }

    /// Release one subscriber. Same as dropping the subscription.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Fetch `job_id` now, even if a timer fetch is in flight.
    /// Returns false if the job is not being watched.
    pub fn refresh(&self, job_id: &JobId) -> bool {
        self.inner
            .entries()
            .get(job_id)
            .map(|entry| entry.refresh.send(()).is_ok())
            .unwrap_or(false)
    }

    /// Current state of a watched job without subscribing.
    pub fn peek(&self, job_id: &JobId) -> Option<CacheState> {
        self.inner.entries().get(job_id).map(|e| e.slot.current())
    }

    pub fn len(&self) -> usize {
        self.inner.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn spawn_entry(&self, job_id: &JobId, interval: Option<Duration>) -> Entry {
        let slot = Arc::new(Slot::new(job_id.clone()));
        let (refresh, refresh_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(poll_loop(
            Arc::clone(&self.inner.api),
            Arc::clone(&slot),
            interval,
            self.inner.request_timeout,
            refresh_rx,
        ));
        Entry {
            slot,
            subscribers: 0,
            refresh,
            task,
        }
    }
}

/// A subscriber's handle on one cached job. Dropping it unsubscribes.
pub struct Subscription {
    job_id: JobId,
    rx: watch::Receiver<CacheState>,
    releaser: Option<Arc<dyn Release>>,
}

impl Subscription {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn current(&self) -> CacheState {
        self.rx.borrow().clone()
    }

    /// Wait for the next state change. `None` once the entry is gone.
    pub async fn next(&mut self) -> Option<CacheState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the state satisfies `predicate`.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&CacheState) -> bool,
    ) -> Option<CacheState> {
        let state = self.rx.wait_for(|s| predicate(s)).await.ok()?;
        Some((*state).clone())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(releaser) = self.releaser.take() {
            releaser.release(&self.job_id);
        }
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn poll_loop<A: ForensicApi>(
    api: Arc<A>,
    slot: Arc<Slot>,
    interval: Option<Duration>,
    request_timeout: Duration,
    mut refresh_rx: mpsc::UnboundedReceiver<()>,
) {
    // Dropping the set on abort cancels every in-flight fetch.
    let mut fetches = JoinSet::new();
    let mut timer = interval.map(|period| {
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        timer
    });

    spawn_fetch(&mut fetches, &api, &slot, request_timeout);

    loop {
        tokio::select! {
            _ = next_tick(&mut timer) => {
                if slot.outstanding() == 0 {
                    spawn_fetch(&mut fetches, &api, &slot, request_timeout);
                } else {
                    debug!(job_id = %slot.job_id(), "Fetch still outstanding, skipping tick");
                }
            }
            msg = refresh_rx.recv() => match msg {
                Some(()) => spawn_fetch(&mut fetches, &api, &slot, request_timeout),
                None => break,
            },
            Some(_) = fetches.join_next(), if !fetches.is_empty() => {}
        }
    }
}

fn spawn_fetch<A: ForensicApi>(
    fetches: &mut JoinSet<()>,
    api: &Arc<A>,
    slot: &Arc<Slot>,
    request_timeout: Duration,
) {
    let Some(seq) = slot.begin() else {
        return;
    };
    let api = Arc::clone(api);
    let slot = Arc::clone(slot);

    fetches.spawn(async move {
        let result = fetch_job(api.as_ref(), slot.job_id(), request_timeout).await;
        if let Err(err) = &result {
            metrics::counter!("job_fetch_failures_total", "kind" => err.kind()).increment(1);
            warn!(job_id = %slot.job_id(), seq, error = %err, "Job fetch failed");
        }

        match slot.complete(seq, result) {
            Applied::Accepted => debug!(job_id = %slot.job_id(), seq, "Applied job fetch"),
            Applied::Stale => {
                metrics::counter!("job_stale_responses_discarded_total").increment(1);
                debug!(job_id = %slot.job_id(), seq, "Discarded superseded job fetch");
            }
            Applied::Closed => {}
        }
    });
}
