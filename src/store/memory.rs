// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`QueueStore`] with API-server-like bookkeeping.
//!
//! - `metadata.generation` starts at 1 and increments on every spec change
//! - `metadata.resourceVersion` changes on every write, status included
//! - deleting an object with finalizers only sets `deletionTimestamp`; the object is
//!   removed once its last finalizer is cleared

use super::{QueueStore, StoreResult};
use crate::crd::{Queue, QueueSpec, QueueStatus};
use crate::errors::StoreError;
use crate::scheduler::QueueKey;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct StoreState {
    objects: BTreeMap<QueueKey, Queue>,
    next_resource_version: u64,
    pending_conflicts: usize,
    status_writes: usize,
}

impl StoreState {
    fn bump(&mut self, queue: &mut Queue) {
        self.next_resource_version += 1;
        queue.metadata.resource_version = Some(self.next_resource_version.to_string());
    }
}

/// In-memory `Queue` store.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    state: Mutex<StoreState>,
}

impl MemoryQueueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a `Queue` or update its spec, like `kubectl apply`.
    ///
    /// Returns the stored object. Generation increments only when the spec changes.
    pub fn apply(&self, namespace: &str, name: &str, spec: QueueSpec) -> Queue {
        let key = QueueKey::new(namespace, name);
        let mut state = self.state();

        let mut queue = match state.objects.get(&key) {
            Some(existing) if existing.spec == spec => return existing.clone(),
            Some(existing) => {
                let mut updated = existing.clone();
                updated.spec = spec;
                updated.metadata.generation = Some(updated.metadata.generation.unwrap_or(0) + 1);
                updated
            }
            None => {
                let mut created = Queue::new(name, spec);
                created.metadata.namespace = Some(namespace.to_string());
                created.metadata.generation = Some(1);
                created
            }
        };

        state.bump(&mut queue);
        state.objects.insert(key, queue.clone());
        queue
    }

    /// Request deletion, like `kubectl delete`.
    ///
    /// Objects with finalizers get a deletion timestamp and stay until the finalizers are
    /// cleared. Returns `true` if the object is still present.
    pub fn request_delete(&self, key: &QueueKey) -> bool {
        let mut state = self.state();
        let Some(mut queue) = state.objects.remove(key) else {
            return false;
        };

        if queue.metadata.finalizers.as_ref().is_none_or(Vec::is_empty) {
            return false;
        }

        if queue.metadata.deletion_timestamp.is_none() {
            queue.metadata.deletion_timestamp = Some(Time(k8s_openapi::jiff::Timestamp::now()));
            state.bump(&mut queue);
        }
        state.objects.insert(key.clone(), queue);
        true
    }

    /// Make the next `count` status writes fail with a conflict.
    pub fn inject_status_conflicts(&self, count: usize) {
        self.state().pending_conflicts = count;
    }

    /// Simulate another writer touching the object.
    pub fn touch(&self, key: &QueueKey) {
        let mut state = self.state();
        if let Some(mut queue) = state.objects.remove(key) {
            state.bump(&mut queue);
            state.objects.insert(key.clone(), queue);
        }
    }

    /// Number of successful status writes so far.
    #[must_use]
    pub fn status_writes(&self) -> usize {
        self.state().status_writes
    }

    /// Snapshot of an object, without going through the trait.
    #[must_use]
    pub fn snapshot(&self, key: &QueueKey) -> Option<Queue> {
        self.state().objects.get(key).cloned()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn get(&self, key: &QueueKey) -> StoreResult<Option<Queue>> {
        Ok(self.snapshot(key))
    }

    async fn list(&self) -> StoreResult<Vec<Queue>> {
        Ok(self.state().objects.values().cloned().collect())
    }

    async fn set_finalizers(&self, queue: &Queue, finalizers: Vec<String>) -> StoreResult<Queue> {
        let key = QueueKey::from_queue(queue);
        let mut state = self.state();
        let mut stored = state
            .objects
            .remove(&key)
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })?;

        stored.metadata.finalizers = Some(finalizers);
        state.bump(&mut stored);

        let released = stored.metadata.deletion_timestamp.is_some()
            && stored.metadata.finalizers.as_ref().is_none_or(Vec::is_empty);
        if !released {
            state.objects.insert(key, stored.clone());
        }
        Ok(stored)
    }

    async fn replace_status(&self, queue: &Queue, status: &QueueStatus) -> StoreResult<Queue> {
        let key = QueueKey::from_queue(queue);
        let mut state = self.state();

        if state.pending_conflicts > 0 {
            state.pending_conflicts -= 1;
            return Err(StoreError::Conflict {
                key: key.to_string(),
            });
        }

        let mut stored = state
            .objects
            .remove(&key)
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })?;

        if stored.metadata.resource_version != queue.metadata.resource_version {
            state.objects.insert(key.clone(), stored);
            return Err(StoreError::Conflict {
                key: key.to_string(),
            });
        }

        stored.status = Some(status.clone());
        state.bump(&mut stored);
        state.status_writes += 1;
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
