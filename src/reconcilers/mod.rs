// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation for `Queue` resources.
//!
//! This module contains the reconciliation logic that keeps an Amazon SQS queue in sync
//! with its `Queue` custom resource.
//!
//! # Reconciliation Architecture
//!
//! The operator follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Monitor `Queue` changes via the Kubernetes API and enqueue them
//! 2. **Reconcile** - Compare desired state (spec) with the remote queue
//! 3. **Update** - Apply the minimal set of SQS calls to converge
//! 4. **Status** - Report the outcome through `ResourceSynced` and `Terminal` conditions
//!
//! # Modules
//!
//! - [`queue`] - The [`QueueReconciler`] state machine
//! - [`status`] - Condition helpers and the optimistic-locked status publisher
//! - [`finalizers`] - Finalizer management protecting the remote queue
//!
//! # Example: Using the Reconciler
//!
//! ```rust,no_run
//! use sqs_queue_operator::reconcilers::QueueReconciler;
//! use sqs_queue_operator::scheduler::{QueueKey, ReconcileReason, ReconciliationRequest};
//! use sqs_queue_operator::sqs::MemoryQueueService;
//! use sqs_queue_operator::store::MemoryQueueStore;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let reconciler = QueueReconciler::new(
//!     Arc::new(MemoryQueueStore::new()),
//!     Arc::new(MemoryQueueService::new("us-east-1")),
//! );
//! let request = ReconciliationRequest {
//!     key: QueueKey::new("default", "orders"),
//!     reason: ReconcileReason::Create,
//! };
//! let _ = reconciler.reconcile(request).await;
//! # }
//! ```

pub mod finalizers;
pub mod queue;
pub mod status;

pub use queue::QueueReconciler;

use crate::crd::Queue;
use crate::scheduler::ReconcileReason;

/// Check if a resource's spec has changed by comparing generation with `observed_generation`.
///
/// This is the standard Kubernetes pattern for determining if reconciliation is needed.
/// The `metadata.generation` field is incremented by Kubernetes only when the spec changes,
/// while `status.observed_generation` is set by the controller after processing a spec.
///
/// # Arguments
///
/// * `current_generation` - The resource's current `metadata.generation`
/// * `observed_generation` - The controller's last `status.observed_generation`
///
/// # Returns
///
/// * `true` - Reconciliation is needed (spec changed or first reconciliation)
/// * `false` - No reconciliation needed (spec unchanged, status-only update)
///
/// # Kubernetes Generation Semantics
///
/// - **`metadata.generation`**: Incremented by Kubernetes API server when spec changes
/// - **`status.observed_generation`**: Set by controller to match `metadata.generation` after reconciliation
/// - When they match: spec hasn't changed since last reconciliation → skip work
/// - When they differ: spec has changed → reconcile
/// - When `observed_generation` is None: first reconciliation → reconcile
#[must_use]
pub fn should_reconcile(current_generation: Option<i64>, observed_generation: Option<i64>) -> bool {
    match (current_generation, observed_generation) {
        (Some(current), Some(observed)) => current != observed,
        (Some(_), None) => true, // First reconciliation
        _ => false,              // No generation tracking available
    }
}

/// Decide whether a watch event for `queue` needs a reconciliation, and why.
///
/// Status writes made by the operator itself come back as watch events. Those leave
/// `metadata.generation` unchanged and are filtered out here, so the operator does not
/// reconcile in a loop. Drift is picked up by the periodic resync instead.
///
/// # Returns
///
/// * `Some(Delete)` - Deletion was requested
/// * `Some(Create)` - The operator has never written status for this object
/// * `Some(Update)` - The spec changed since it was last processed
/// * `None` - Nothing to do
#[must_use]
pub fn reason_for_event(queue: &Queue) -> Option<ReconcileReason> {
    if queue.metadata.deletion_timestamp.is_some() {
        return Some(ReconcileReason::Delete);
    }

    let Some(status) = queue.status.as_ref() else {
        return Some(ReconcileReason::Create);
    };

    should_reconcile(queue.metadata.generation, status.observed_generation)
        .then_some(ReconcileReason::Update)
}

/// Reason for reconciling `queue` when the watcher (re)lists every object.
///
/// A relist happens at startup and whenever the watch has to restart. Retries that were
/// waiting in backoff, and queues still waiting to become visible, only lived in the
/// previous work queue, so every listed object is reconciled again. Objects with no
/// pending change run as a resync.
#[must_use]
pub fn reason_for_relist(queue: &Queue) -> ReconcileReason {
    reason_for_event(queue).unwrap_or(ReconcileReason::Resync)
}
