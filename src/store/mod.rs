// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Access to `Queue` custom resources.
//!
//! The reconciler never talks to the Kubernetes API directly. It goes through the
//! [`QueueStore`] trait, which has two implementations:
//!
//! - [`KubeQueueStore`] reads and patches `Queue` objects through `kube::Api`
//! - [`MemoryQueueStore`] keeps objects in memory with the same generation, resource
//!   version and finalizer semantics as the API server, for tests and local runs
//!
//! Status writes are optimistic: [`QueueStore::replace_status`] fails with
//! [`StoreError::Conflict`] if the object changed since it was read.

pub mod k8s;
pub mod memory;

pub use k8s::KubeQueueStore;
pub use memory::MemoryQueueStore;

use crate::crd::{Queue, QueueStatus};
use crate::errors::StoreError;
use crate::scheduler::QueueKey;
use async_trait::async_trait;

/// Result type for store calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Read and write access to `Queue` objects.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Fetch the current version of a `Queue`, or `None` if it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] or [`StoreError::Rejected`] if the read fails.
    async fn get(&self, key: &QueueKey) -> StoreResult<Option<Queue>>;

    /// List every `Queue` the operator is responsible for.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] or [`StoreError::Rejected`] if the list fails.
    async fn list(&self) -> StoreResult<Vec<Queue>>;

    /// Replace `metadata.finalizers`, returning the updated object.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the object is gone.
    async fn set_finalizers(&self, queue: &Queue, finalizers: Vec<String>) -> StoreResult<Queue>;

    /// Replace `status`, provided the object still has `queue`'s resource version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the object was modified since `queue` was read.
    async fn replace_status(&self, queue: &Queue, status: &QueueStatus) -> StoreResult<Queue>;
}
