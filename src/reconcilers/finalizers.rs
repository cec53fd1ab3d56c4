// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management for `Queue` resources.
//!
//! The queue finalizer keeps a `Queue` object around until its remote queue has been
//! deleted. Both functions are idempotent.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqs_queue_operator::constants::QUEUE_FINALIZER;
//! use sqs_queue_operator::reconcilers::finalizers::{ensure_finalizer, remove_finalizer};
//!
//! let queue = ensure_finalizer(store.as_ref(), &queue, QUEUE_FINALIZER).await?;
//!
//! if queue.metadata.deletion_timestamp.is_some() {
//!     // delete the remote queue first...
//!     remove_finalizer(store.as_ref(), &queue, QUEUE_FINALIZER).await?;
//! }
//! ```

use crate::crd::Queue;
use crate::errors::StoreError;
use crate::scheduler::QueueKey;
use crate::store::QueueStore;
use tracing::info;

/// Returns `true` if `finalizer` is set on `queue`.
#[must_use]
pub fn has_finalizer(queue: &Queue, finalizer: &str) -> bool {
    queue
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|x| x == finalizer))
}

/// Add a finalizer to a `Queue` if not already present.
///
/// # Returns
///
/// The object as stored after the call. When the finalizer is already present no write
/// is made and a clone of `queue` is returned.
///
/// # Errors
///
/// Returns the store error if the patch fails.
pub async fn ensure_finalizer<S>(
    store: &S,
    queue: &Queue,
    finalizer: &str,
) -> Result<Queue, StoreError>
where
    S: QueueStore + ?Sized,
{
    if has_finalizer(queue, finalizer) {
        return Ok(queue.clone());
    }

    let key = QueueKey::from_queue(queue);
    info!("Adding finalizer {} to Queue {}", finalizer, key);

    let mut finalizers = queue.metadata.finalizers.clone().unwrap_or_default();
    finalizers.push(finalizer.to_string());
    store.set_finalizers(queue, finalizers).await
}

/// Remove a finalizer from a `Queue`.
///
/// A `Queue` that is already gone counts as success, since that is the state removal
/// is driving towards.
///
/// # Errors
///
/// Returns any store error other than `NotFound`.
pub async fn remove_finalizer<S>(store: &S, queue: &Queue, finalizer: &str) -> Result<(), StoreError>
where
    S: QueueStore + ?Sized,
{
    if !has_finalizer(queue, finalizer) {
        return Ok(());
    }

    let key = QueueKey::from_queue(queue);
    info!("Removing finalizer {} from Queue {}", finalizer, key);

    let finalizers: Vec<String> = queue
        .metadata
        .finalizers
        .iter()
        .flatten()
        .filter(|f| *f != finalizer)
        .cloned()
        .collect();

    match store.set_finalizers(queue, finalizers).await {
        Ok(_) | Err(StoreError::NotFound { .. }) => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
