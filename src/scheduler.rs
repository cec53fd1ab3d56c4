// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Work queue that drives reconciliation.
//!
//! Watch events, resync ticks and retries all become [`Scheduler::enqueue`] calls. The
//! scheduler guarantees:
//!
//! - **Per-key serialization** - at most one reconciliation runs for a given `Queue` at a time
//! - **Coalescing** - events for a key that is already waiting merge into one request; the
//!   merged reason keeps the highest priority (`Delete` > `Create` > `Update` > `Resync`)
//! - **Rerun** - an event that arrives while its key is running schedules exactly one more run
//!   after the current one finishes
//! - **Backoff** - transient failures are retried after a full-jitter exponential delay;
//!   terminal failures are not retried
//!
//! Different keys run in parallel, up to the configured number of workers.

use crate::backoff::BackoffPolicy;
use crate::crd::Queue;
use crate::errors::{ReconcileError, StoreError};
use crate::metrics;
use crate::store::QueueStore;
use kube::ResourceExt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Identity of a `Queue` object: `namespace/name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueKey {
    pub namespace: String,
    pub name: String,
}

impl QueueKey {
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Key of an existing object.
    #[must_use]
    pub fn from_queue(queue: &Queue) -> Self {
        Self {
            namespace: queue.namespace().unwrap_or_default(),
            name: queue.name_any(),
        }
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Why a key was enqueued. Ordered by priority, lowest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReconcileReason {
    /// Periodic resync; checks for drift.
    Resync,
    /// Spec changed.
    Update,
    /// Object seen for the first time.
    Create,
    /// Object is being deleted.
    Delete,
}

impl ReconcileReason {
    /// Combine two reasons for the same key, keeping the higher priority one.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        self.max(other)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resync => "Resync",
            Self::Update => "Update",
            Self::Create => "Create",
            Self::Delete => "Delete",
        }
    }
}

impl fmt::Display for ReconcileReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work handed to the reconcile handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconciliationRequest {
    pub key: QueueKey,
    pub reason: ReconcileReason,
}

/// Successful result of a reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Converged; nothing more to do until the next event.
    Done,
    /// Not yet converged; run again after the given delay.
    RequeueAfter(Duration),
}

#[derive(Debug, Default)]
struct State {
    /// Keys ready to run, in arrival order. Every entry also has a `pending` reason.
    ready: VecDeque<QueueKey>,
    /// Merged reason for every key waiting to run, including in-flight keys marked for rerun.
    pending: HashMap<QueueKey, ReconcileReason>,
    in_flight: HashSet<QueueKey>,
    /// Consecutive transient failures per key.
    failures: HashMap<QueueKey, u32>,
    /// Delayed requeues that have not fired yet.
    timers: usize,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    /// One permit per entry in `ready`.
    ready_permits: Semaphore,
    backoff: BackoffPolicy,
}

/// Keyed work queue with per-key serialization.
#[derive(Clone, Debug)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    #[must_use]
    pub fn new(backoff: BackoffPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                ready_permits: Semaphore::new(0),
                backoff,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Request a reconciliation of `key`.
    ///
    /// Never blocks. If the key is already waiting, the request is merged into the
    /// waiting one. If the key is running, it is marked to run once more afterwards.
    pub fn enqueue(&self, key: QueueKey, reason: ReconcileReason) {
        let mut state = self.state();

        if let Some(existing) = state.pending.get_mut(&key) {
            *existing = existing.merge(reason);
            metrics::record_coalesced_event();
            debug!(queue = %key, reason = %*existing, "Coalesced reconcile request");
            return;
        }

        state.pending.insert(key.clone(), reason);
        if !state.in_flight.contains(&key) {
            state.ready.push_back(key);
            self.inner.ready_permits.add_permits(1);
        }
        metrics::set_scheduler_pending(state.pending.len());
    }

    /// Whether nothing is waiting, running or scheduled for later.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let state = self.state();
        state.pending.is_empty() && state.in_flight.is_empty() && state.timers == 0
    }

    /// Whether `key` is currently being reconciled.
    #[must_use]
    pub fn is_running(&self, key: &QueueKey) -> bool {
        self.state().in_flight.contains(key)
    }

    /// Stop handing out work. Running reconciliations finish; [`Scheduler::run`] then returns.
    pub fn shutdown(&self) {
        self.inner.ready_permits.close();
    }

    /// Run `workers` reconcile loops until [`Scheduler::shutdown`] is called.
    ///
    /// # Arguments
    ///
    /// * `workers` - Maximum number of keys reconciled in parallel
    /// * `handler` - Reconciles one request
    pub async fn run<F, Fut>(&self, workers: usize, handler: F)
    where
        F: Fn(ReconciliationRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ReconcileOutcome, ReconcileError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let mut tasks = JoinSet::new();
        for worker in 0..workers.max(1) {
            let scheduler = self.clone();
            let handler = Arc::clone(&handler);
            tasks.spawn(async move { scheduler.worker_loop(worker, handler).await });
        }

        info!("Started {} reconcile workers", workers.max(1));
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Reconcile worker exited abnormally: {e}");
            }
        }
        info!("All reconcile workers stopped");
    }

    async fn worker_loop<F, Fut>(&self, worker: usize, handler: Arc<F>)
    where
        F: Fn(ReconciliationRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ReconcileOutcome, ReconcileError>> + Send + 'static,
    {
        loop {
            let Ok(permit) = self.inner.ready_permits.acquire().await else {
                debug!(worker, "Reconcile worker stopping");
                return;
            };
            permit.forget();

            let Some(request) = self.take_next() else {
                continue;
            };

            let key = request.key.clone();
            let reason = request.reason;
            let started = Instant::now();
            debug!(worker, queue = %key, %reason, "Reconciling");

            // A panicking handler must not leave the key marked in flight forever.
            let result = match tokio::spawn(handler(request)).await {
                Ok(result) => result,
                Err(e) => Err(ReconcileError::Transient {
                    reason: crate::status_reasons::REASON_RECONCILE_FAILED,
                    message: format!("reconcile task failed: {e}"),
                }),
            };

            self.complete(&key, reason, &result, started.elapsed());
        }
    }

    fn take_next(&self) -> Option<ReconciliationRequest> {
        let mut state = self.state();
        while let Some(key) = state.ready.pop_front() {
            if let Some(reason) = state.pending.remove(&key) {
                state.in_flight.insert(key.clone());
                metrics::set_scheduler_pending(state.pending.len());
                return Some(ReconciliationRequest { key, reason });
            }
        }
        None
    }

    fn complete(
        &self,
        key: &QueueKey,
        reason: ReconcileReason,
        result: &Result<ReconcileOutcome, ReconcileError>,
        elapsed: Duration,
    ) {
        let retry_after = {
            let mut state = self.state();
            state.in_flight.remove(key);

            let retry_after = match result {
                Ok(ReconcileOutcome::Done) => {
                    state.failures.remove(key);
                    None
                }
                Ok(ReconcileOutcome::RequeueAfter(delay)) => {
                    state.failures.remove(key);
                    Some(*delay)
                }
                Err(e) if e.is_transient() => {
                    let attempt = state.failures.entry(key.clone()).or_insert(0);
                    let delay = self.inner.backoff.delay(*attempt);
                    *attempt = attempt.saturating_add(1);
                    Some(delay)
                }
                Err(_) => {
                    state.failures.remove(key);
                    None
                }
            };

            if state.pending.contains_key(key) {
                state.ready.push_back(key.clone());
                self.inner.ready_permits.add_permits(1);
            }
            if retry_after.is_some() {
                state.timers += 1;
            }
            retry_after
        };

        match result {
            Ok(ReconcileOutcome::Done) => {
                metrics::record_reconciliation_success(reason.as_str(), elapsed);
                debug!(queue = %key, %reason, "Reconciled in {:?}", elapsed);
            }
            Ok(ReconcileOutcome::RequeueAfter(delay)) => {
                metrics::record_reconciliation_success(reason.as_str(), elapsed);
                metrics::record_reconciliation_requeue(reason.as_str(), "not_converged");
                debug!(queue = %key, %reason, "Not converged yet, requeueing in {:?}", delay);
            }
            Err(e) if e.is_transient() => {
                metrics::record_reconciliation_error(
                    reason.as_str(),
                    elapsed,
                    e.status_reason(),
                    true,
                );
                metrics::record_reconciliation_requeue(reason.as_str(), "backoff");
                warn!(
                    queue = %key,
                    %reason,
                    "Reconciliation failed, retrying in {:?}: {e}",
                    retry_after.unwrap_or_default()
                );
            }
            Err(e) => {
                metrics::record_reconciliation_error(
                    reason.as_str(),
                    elapsed,
                    e.status_reason(),
                    false,
                );
                error!(queue = %key, %reason, "Reconciliation failed permanently: {e}");
            }
        }

        if let Some(delay) = retry_after {
            let scheduler = self.clone();
            let key = key.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                scheduler.enqueue(key, reason);
                scheduler.state().timers -= 1;
            });
        }
    }

    /// Enqueue every `Queue` in `store` for a resync.
    ///
    /// # Errors
    ///
    /// Returns the store error if listing fails.
    pub async fn enqueue_all<S>(&self, store: &S) -> Result<usize, StoreError>
    where
        S: QueueStore + ?Sized,
    {
        let queues = store.list().await?;
        for queue in &queues {
            self.enqueue(QueueKey::from_queue(queue), ReconcileReason::Resync);
        }
        Ok(queues.len())
    }

    /// Periodically enqueue every `Queue` for a resync, starting one `interval` from now.
    pub fn spawn_resync(&self, store: Arc<dyn QueueStore>, interval: Duration) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the initial list comes from the watcher.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match scheduler.enqueue_all(store.as_ref()).await {
                    Ok(count) => info!("Resync enqueued {count} queues"),
                    Err(e) => warn!("Resync failed to list queues: {e}"),
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod scheduler_tests;
