// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `scheduler.rs`

#[cfg(test)]
mod tests {
    use crate::backoff::BackoffPolicy;
    use crate::crd::QueueSpec;
    use crate::errors::ReconcileError;
    use crate::scheduler::*;
    use crate::status_reasons::{REASON_INVALID_SPEC, REASON_SERVICE_UNAVAILABLE};
    use crate::store::MemoryQueueStore;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn fast_backoff() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_millis(5), Duration::from_millis(20))
    }

    async fn wait_until(what: &str, check: impl Fn() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !check() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {what}"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Records every request a handler receives.
    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<ReconciliationRequest>>>,
    }

    impl Recorder {
        fn record(&self, request: ReconciliationRequest) {
            self.calls.lock().unwrap().push(request);
        }

        fn len(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn reasons(&self) -> Vec<ReconcileReason> {
            self.calls.lock().unwrap().iter().map(|r| r.reason).collect()
        }
    }

    #[test]
    fn test_queue_key_display() {
        assert_eq!(QueueKey::new("default", "orders").to_string(), "default/orders");
    }

    #[test]
    fn test_reason_priority() {
        use ReconcileReason::*;
        assert_eq!(Resync.merge(Update), Update);
        assert_eq!(Update.merge(Create), Create);
        assert_eq!(Create.merge(Delete), Delete);
        assert_eq!(Delete.merge(Resync), Delete);
    }

    #[tokio::test]
    async fn test_coalesces_waiting_requests() {
        let scheduler = Scheduler::new(fast_backoff());
        let key = QueueKey::new("default", "orders");

        scheduler.enqueue(key.clone(), ReconcileReason::Update);
        scheduler.enqueue(key.clone(), ReconcileReason::Delete);
        scheduler.enqueue(key.clone(), ReconcileReason::Resync);

        let recorder = Recorder::default();
        let handler_recorder = recorder.clone();
        let runner = scheduler.clone();
        let run = tokio::spawn(async move {
            runner
                .run(4, move |request| {
                    let recorder = handler_recorder.clone();
                    async move {
                        recorder.record(request);
                        Ok(ReconcileOutcome::Done)
                    }
                })
                .await;
        });

        wait_until("idle", || recorder.len() == 1 && scheduler.is_idle()).await;
        assert_eq!(recorder.reasons(), vec![ReconcileReason::Delete]);

        scheduler.shutdown();
        run.await.unwrap();
    }

    #[tokio::test]
    async fn test_at_most_one_run_per_key() {
        let scheduler = Scheduler::new(fast_backoff());
        let key = QueueKey::new("default", "orders");

        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));

        let (a, m, r) = (active.clone(), max_active.clone(), runs.clone());
        let runner = scheduler.clone();
        let run = tokio::spawn(async move {
            runner
                .run(8, move |_request| {
                    let (active, max_active, runs) = (a.clone(), m.clone(), r.clone());
                    async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_active.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok(ReconcileOutcome::Done)
                    }
                })
                .await;
        });

        let mut producers = Vec::new();
        for i in 0..100 {
            let scheduler = scheduler.clone();
            let key = key.clone();
            producers.push(tokio::spawn(async move {
                let reason = if i % 2 == 0 {
                    ReconcileReason::Update
                } else {
                    ReconcileReason::Resync
                };
                scheduler.enqueue(key, reason);
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }

        wait_until("idle", || scheduler.is_idle()).await;
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        let runs = runs.load(Ordering::SeqCst);
        assert!((1..=100).contains(&runs), "ran {runs} times");

        scheduler.shutdown();
        run.await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_run_in_parallel() {
        let scheduler = Scheduler::new(fast_backoff());
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        let b = barrier.clone();
        let runner = scheduler.clone();
        let run = tokio::spawn(async move {
            runner
                .run(2, move |_request| {
                    let barrier = b.clone();
                    async move {
                        // Both keys must be in flight at once to get past the barrier.
                        barrier.wait().await;
                        Ok(ReconcileOutcome::Done)
                    }
                })
                .await;
        });

        scheduler.enqueue(QueueKey::new("default", "a"), ReconcileReason::Create);
        scheduler.enqueue(QueueKey::new("default", "b"), ReconcileReason::Create);

        wait_until("both keys done", || scheduler.is_idle()).await;
        scheduler.shutdown();
        run.await.unwrap();
    }

    #[tokio::test]
    async fn test_event_during_run_triggers_one_rerun() {
        let scheduler = Scheduler::new(fast_backoff());
        let key = QueueKey::new("default", "orders");
        let release = Arc::new(tokio::sync::Notify::new());
        let recorder = Recorder::default();

        let (rel, rec) = (release.clone(), recorder.clone());
        let runner = scheduler.clone();
        let run = tokio::spawn(async move {
            runner
                .run(4, move |request| {
                    let (release, recorder) = (rel.clone(), rec.clone());
                    async move {
                        let first = recorder.len() == 0;
                        recorder.record(request);
                        if first {
                            release.notified().await;
                        }
                        Ok(ReconcileOutcome::Done)
                    }
                })
                .await;
        });

        scheduler.enqueue(key.clone(), ReconcileReason::Create);
        wait_until("first run", || scheduler.is_running(&key)).await;

        scheduler.enqueue(key.clone(), ReconcileReason::Update);
        scheduler.enqueue(key.clone(), ReconcileReason::Resync);
        release.notify_one();

        wait_until("idle", || scheduler.is_idle()).await;
        assert_eq!(
            recorder.reasons(),
            vec![ReconcileReason::Create, ReconcileReason::Update]
        );

        scheduler.shutdown();
        run.await.unwrap();
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let scheduler = Scheduler::new(fast_backoff());
        let attempts = Arc::new(AtomicUsize::new(0));

        let a = attempts.clone();
        let runner = scheduler.clone();
        let run = tokio::spawn(async move {
            runner
                .run(1, move |_request| {
                    let attempts = a.clone();
                    async move {
                        if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(ReconcileError::Transient {
                                reason: REASON_SERVICE_UNAVAILABLE,
                                message: "connection refused".to_string(),
                            })
                        } else {
                            Ok(ReconcileOutcome::Done)
                        }
                    }
                })
                .await;
        });

        scheduler.enqueue(QueueKey::new("default", "orders"), ReconcileReason::Create);
        wait_until("third attempt", || attempts.load(Ordering::SeqCst) == 3).await;
        wait_until("idle", || scheduler.is_idle()).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        scheduler.shutdown();
        run.await.unwrap();
    }

    #[tokio::test]
    async fn test_terminal_failure_is_not_retried() {
        let scheduler = Scheduler::new(fast_backoff());
        let attempts = Arc::new(AtomicUsize::new(0));

        let a = attempts.clone();
        let runner = scheduler.clone();
        let run = tokio::spawn(async move {
            runner
                .run(1, move |_request| {
                    let attempts = a.clone();
                    async move {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        Err(ReconcileError::Terminal {
                            reason: REASON_INVALID_SPEC,
                            message: "bad name".to_string(),
                        })
                    }
                })
                .await;
        });

        scheduler.enqueue(QueueKey::new("default", "orders"), ReconcileReason::Create);
        wait_until("idle", || {
            attempts.load(Ordering::SeqCst) == 1 && scheduler.is_idle()
        })
        .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        scheduler.shutdown();
        run.await.unwrap();
    }

    #[tokio::test]
    async fn test_requeue_after_runs_again() {
        let scheduler = Scheduler::new(fast_backoff());
        let recorder = Recorder::default();

        let rec = recorder.clone();
        let runner = scheduler.clone();
        let run = tokio::spawn(async move {
            runner
                .run(1, move |request| {
                    let recorder = rec.clone();
                    async move {
                        recorder.record(request);
                        if recorder.len() == 1 {
                            Ok(ReconcileOutcome::RequeueAfter(Duration::from_millis(10)))
                        } else {
                            Ok(ReconcileOutcome::Done)
                        }
                    }
                })
                .await;
        });

        scheduler.enqueue(QueueKey::new("default", "orders"), ReconcileReason::Create);
        wait_until("second run", || recorder.len() == 2 && scheduler.is_idle()).await;
        assert_eq!(
            recorder.reasons(),
            vec![ReconcileReason::Create, ReconcileReason::Create]
        );

        scheduler.shutdown();
        run.await.unwrap();
    }

    #[tokio::test]
    async fn test_enqueue_all_resyncs_every_queue() {
        let store = MemoryQueueStore::new();
        for name in ["a", "b", "c"] {
            store.apply("default", name, QueueSpec::default());
        }

        let scheduler = Scheduler::new(fast_backoff());
        assert_eq!(scheduler.enqueue_all(&store).await.unwrap(), 3);

        let seen = Arc::new(Mutex::new(HashMap::new()));
        let s = seen.clone();
        let runner = scheduler.clone();
        let run = tokio::spawn(async move {
            runner
                .run(2, move |request| {
                    let seen = s.clone();
                    async move {
                        seen.lock().unwrap().insert(request.key, request.reason);
                        Ok(ReconcileOutcome::Done)
                    }
                })
                .await;
        });

        wait_until("resync", || seen.lock().unwrap().len() == 3).await;
        assert!(seen
            .lock()
            .unwrap()
            .values()
            .all(|reason| *reason == ReconcileReason::Resync));

        scheduler.shutdown();
        run.await.unwrap();
    }
}
