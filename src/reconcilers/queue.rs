// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Queue` reconciliation logic.
//!
//! [`QueueReconciler::reconcile`] drives one `Queue` towards its spec:
//!
//! - **Deleting** - delete the remote queue (looking it up by name if no URL was recorded),
//!   then release the finalizer
//! - **Not created** - create the queue; if a queue with the same name already exists, adopt
//!   it and converge its attributes
//! - **Spec changed** - push only the attributes that differ from what was last observed
//! - **Spec unchanged** - read the remote attributes and revert any drift
//!
//! A queue that disappears out of band is recreated. Transient failures are returned to
//! the scheduler for backoff; terminal failures are reported through the `Terminal`
//! condition and not retried until the spec changes.

use crate::constants::{NOT_CONVERGED_REQUEUE_SECS, QUEUE_FINALIZER};
use crate::crd::Queue;
use crate::desired::{
    check_immutable, diff_attributes, diff_tags, managed_attributes, resource_metadata,
    DesiredQueueSpec, ObservedQueueState,
};
use crate::errors::{QueueServiceError, ReconcileError, SpecError, StoreError};
use crate::metrics;
use crate::reconcilers::finalizers::{ensure_finalizer, has_finalizer, remove_finalizer};
use crate::reconcilers::status::{find_condition, QueueStatusUpdater};
use crate::scheduler::{QueueKey, ReconcileOutcome, ReconcileReason, ReconciliationRequest};
use crate::sqs::QueueService;
use crate::status_reasons::{
    CONDITION_RESOURCE_SYNCED, CONDITION_TERMINAL, REASON_CREATED, REASON_DRIFT_CORRECTED,
    REASON_RECREATED, REASON_SYNCED, REASON_UPDATED, STATUS_FALSE, STATUS_TRUE,
};
use crate::store::QueueStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a successful sync did to the remote queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SyncAction {
    Created,
    /// Created again after disappearing out of band.
    Recreated,
    Updated,
    DriftCorrected,
    InSync,
    /// Created, but the service does not report it yet.
    AwaitingVisibility,
}

impl SyncAction {
    fn reason(self) -> &'static str {
        match self {
            Self::Created | Self::AwaitingVisibility => REASON_CREATED,
            Self::Recreated => REASON_RECREATED,
            Self::Updated => REASON_UPDATED,
            Self::DriftCorrected => REASON_DRIFT_CORRECTED,
            Self::InSync => REASON_SYNCED,
        }
    }
}

/// Failure inside a sync step. `NotFound` stays visible so callers can recreate.
#[derive(Debug)]
enum SyncError {
    Spec(SpecError),
    Remote(QueueServiceError),
}

impl From<SpecError> for SyncError {
    fn from(err: SpecError) -> Self {
        Self::Spec(err)
    }
}

impl From<QueueServiceError> for SyncError {
    fn from(err: QueueServiceError) -> Self {
        Self::Remote(err)
    }
}

impl From<SyncError> for ReconcileError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Spec(e) => e.into(),
            SyncError::Remote(e) => remote_error(e),
        }
    }
}

/// Classify an adapter error that reached the reconciler unhandled.
///
/// A `NotFound` nobody handled is a read racing the service's eventual consistency,
/// so it is retried.
fn remote_error(err: QueueServiceError) -> ReconcileError {
    match err {
        QueueServiceError::NotFound { .. } => ReconcileError::Transient {
            reason: err.status_reason(),
            message: err.to_string(),
        },
        other => other.into(),
    }
}

/// SQS omits `FifoQueue` for standard queues.
fn with_implicit_attributes(attributes: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut attributes = attributes.clone();
    attributes
        .entry("FifoQueue".to_string())
        .or_insert_with(|| "false".to_string());
    attributes
}

/// Whether `queue` already failed terminally at `generation`.
fn is_terminal_at(queue: &Queue, generation: i64) -> bool {
    let Some(status) = queue.status.as_ref() else {
        return false;
    };
    status.observed_generation == Some(generation)
        && find_condition(&status.conditions, CONDITION_TERMINAL)
            .is_some_and(|c| c.status == STATUS_TRUE)
}

/// Reconciles `Queue` objects against the remote queue service.
#[derive(Clone)]
pub struct QueueReconciler {
    store: Arc<dyn QueueStore>,
    service: Arc<dyn QueueService>,
}

impl QueueReconciler {
    #[must_use]
    pub fn new(store: Arc<dyn QueueStore>, service: Arc<dyn QueueService>) -> Self {
        Self { store, service }
    }

    /// Reconcile one `Queue`.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Transient`] when the scheduler should retry with backoff,
    /// and [`ReconcileError::Terminal`] when it should not.
    pub async fn reconcile(
        &self,
        request: ReconciliationRequest,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(queue) = self.store.get(&request.key).await? else {
            debug!(queue = %request.key, "Queue no longer exists, nothing to reconcile");
            return Ok(ReconcileOutcome::Done);
        };

        if queue.metadata.deletion_timestamp.is_some() {
            return self.reconcile_delete(&queue).await;
        }

        self.reconcile_apply(&queue, request.reason).await
    }

    async fn reconcile_apply(
        &self,
        queue: &Queue,
        reason: ReconcileReason,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let key = QueueKey::from_queue(queue);
        let generation = queue.metadata.generation.unwrap_or_default();
        let observed = ObservedQueueState::from_status(queue.status.as_ref());

        if observed
            .last_synced_generation
            .is_some_and(|synced| synced > generation)
        {
            debug!(
                queue = %key,
                generation,
                synced = ?observed.last_synced_generation,
                "Generation already superseded, skipping"
            );
            return Ok(ReconcileOutcome::Done);
        }

        if is_terminal_at(queue, generation) {
            debug!(queue = %key, generation, "Terminal failure at this generation, waiting for a spec change");
            return Ok(ReconcileOutcome::Done);
        }

        info!(queue = %key, %reason, generation, "Reconciling Queue");

        let desired = match DesiredQueueSpec::from_queue(queue) {
            Ok(desired) => desired,
            Err(e) => {
                let updater = QueueStatusUpdater::new(queue);
                return self.report_failure(updater, generation, e.into()).await;
            }
        };

        let queue = match ensure_finalizer(self.store.as_ref(), queue, QUEUE_FINALIZER).await {
            Ok(queue) => queue,
            Err(StoreError::NotFound { .. }) => return Ok(ReconcileOutcome::Done),
            Err(e) => return Err(e.into()),
        };

        let mut updater = QueueStatusUpdater::new(&queue);
        let action = match self.sync(&desired, &observed, &mut updater).await {
            Ok(action) => action,
            Err(e) => return self.report_failure(updater, generation, e.into()).await,
        };

        updater.set_observed_generation(generation);
        updater.set_condition(CONDITION_TERMINAL, STATUS_FALSE, action.reason(), "");

        if action == SyncAction::AwaitingVisibility {
            updater.set_condition(
                CONDITION_RESOURCE_SYNCED,
                STATUS_FALSE,
                action.reason(),
                &format!("Queue {} was created and is not visible yet", desired.name),
            );
            updater.publish(self.store.as_ref()).await?;
            return Ok(ReconcileOutcome::RequeueAfter(Duration::from_secs(
                NOT_CONVERGED_REQUEUE_SECS,
            )));
        }

        updater.mark_synced(generation);
        updater.set_condition(
            CONDITION_RESOURCE_SYNCED,
            STATUS_TRUE,
            action.reason(),
            &format!(
                "Queue {} is in sync with generation {}",
                desired.name, generation
            ),
        );

        let updated = updater.publish(self.store.as_ref()).await?;
        info!(queue = %key, generation, action = ?action, "Queue reconciled");

        // Deletion requested while we were syncing.
        if let Some(updated) = updated {
            if updated.metadata.deletion_timestamp.is_some() {
                return self.reconcile_delete(&updated).await;
            }
        }

        Ok(ReconcileOutcome::Done)
    }

    /// Bring the remote queue in line with `desired`, recording what was observed.
    async fn sync(
        &self,
        desired: &DesiredQueueSpec,
        observed: &ObservedQueueState,
        updater: &mut QueueStatusUpdater,
    ) -> Result<SyncAction, SyncError> {
        if !observed.exists {
            return self.create_queue(desired, updater).await;
        }

        let queue_url = observed.queue_url.as_str();
        let result = if observed.last_synced_generation.is_none() {
            // Created but never confirmed: nothing recorded is a reliable baseline.
            self.correct_drift(desired, queue_url, updater)
                .await
                .map(|action| match action {
                    SyncAction::InSync => SyncAction::Created,
                    SyncAction::DriftCorrected => SyncAction::Updated,
                    other => other,
                })
        } else if observed.is_synced_at(desired.generation) {
            self.correct_drift(desired, queue_url, updater).await
        } else {
            self.update_queue(desired, queue_url, &observed.attributes, updater)
                .await
        };

        match result {
            Err(SyncError::Remote(QueueServiceError::NotFound { .. })) => {
                warn!(
                    "Queue {} no longer exists at {}, recreating",
                    desired.name, queue_url
                );
                updater.clear_remote_state();
                let action = self.create_queue(desired, updater).await?;
                Ok(match action {
                    SyncAction::Created => SyncAction::Recreated,
                    other => other,
                })
            }
            other => other,
        }
    }

    async fn create_queue(
        &self,
        desired: &DesiredQueueSpec,
        updater: &mut QueueStatusUpdater,
    ) -> Result<SyncAction, SyncError> {
        let queue_url = match self.service.create(desired).await {
            Ok(queue_url) => queue_url,
            Err(QueueServiceError::AlreadyExists { .. }) => {
                info!("Queue {} already exists, adopting it", desired.name);
                let queue_url = self.service.lookup_url_by_name(&desired.name).await?;
                updater.set_queue_url(&queue_url);
                self.correct_drift(desired, &queue_url, updater).await?;
                return Ok(SyncAction::Updated);
            }
            Err(e) => return Err(e.into()),
        };

        metrics::record_queue_created();
        info!("Created queue {} at {}", desired.name, queue_url);
        updater.set_queue_url(&queue_url);

        let remote = match self.service.get_attributes(&queue_url).await {
            Ok(remote) => remote,
            Err(QueueServiceError::NotFound { .. }) => {
                updater.set_observed_attributes(desired.attributes.clone());
                return Ok(SyncAction::AwaitingVisibility);
            }
            Err(e) => return Err(e.into()),
        };
        let remote = with_implicit_attributes(&remote);
        updater.set_observed_attributes(managed_attributes(&desired.attributes, &remote));
        updater.set_resource_metadata(resource_metadata(&remote));

        // CreateQueue returns an existing queue with identical attributes without touching its tags.
        self.sync_tags(desired, &queue_url).await?;

        Ok(SyncAction::Created)
    }

    /// Push attributes that changed since the last observation, without reading them first.
    async fn update_queue(
        &self,
        desired: &DesiredQueueSpec,
        queue_url: &str,
        last_observed: &BTreeMap<String, String>,
        updater: &mut QueueStatusUpdater,
    ) -> Result<SyncAction, SyncError> {
        let baseline = with_implicit_attributes(last_observed);
        let changed = diff_attributes(&desired.attributes, &baseline);
        check_immutable(desired, queue_url, &changed)?;

        if !changed.is_empty() {
            debug!(
                "Updating attributes {:?} on queue {}",
                changed.keys().collect::<Vec<_>>(),
                desired.name
            );
            self.service.set_attributes(queue_url, &changed).await?;
        }

        let mut observed = managed_attributes(&desired.attributes, &baseline);
        observed.extend(changed.clone());
        updater.set_queue_url(queue_url);
        updater.set_observed_attributes(observed);

        let tags_changed = self.sync_tags(desired, queue_url).await?;

        if changed.is_empty() && !tags_changed {
            Ok(SyncAction::InSync)
        } else {
            metrics::record_queue_updated();
            info!("Updated queue {}", desired.name);
            Ok(SyncAction::Updated)
        }
    }

    /// Read the remote attributes and revert anything changed out of band.
    async fn correct_drift(
        &self,
        desired: &DesiredQueueSpec,
        queue_url: &str,
        updater: &mut QueueStatusUpdater,
    ) -> Result<SyncAction, SyncError> {
        let remote = with_implicit_attributes(&self.service.get_attributes(queue_url).await?);
        let drifted = diff_attributes(&desired.attributes, &remote);
        check_immutable(desired, queue_url, &drifted)?;

        if !drifted.is_empty() {
            warn!(
                "Queue {} drifted on {:?}, restoring desired values",
                desired.name,
                drifted.keys().collect::<Vec<_>>()
            );
            self.service.set_attributes(queue_url, &drifted).await?;
        }

        let mut observed = managed_attributes(&desired.attributes, &remote);
        observed.extend(drifted.clone());
        updater.set_queue_url(queue_url);
        updater.set_observed_attributes(observed);
        updater.set_resource_metadata(resource_metadata(&remote));

        let tags_drifted = self.sync_tags(desired, queue_url).await?;

        if drifted.is_empty() && !tags_drifted {
            Ok(SyncAction::InSync)
        } else {
            metrics::record_drift_corrected();
            Ok(SyncAction::DriftCorrected)
        }
    }

    /// Make the remote tags equal the desired tags. Returns `true` if anything changed.
    async fn sync_tags(
        &self,
        desired: &DesiredQueueSpec,
        queue_url: &str,
    ) -> Result<bool, QueueServiceError> {
        let actual = self.service.list_tags(queue_url).await?;
        let diff = diff_tags(&desired.tags, &actual);
        if diff.is_empty() {
            return Ok(false);
        }

        if !diff.to_set.is_empty() {
            self.service.tag(queue_url, &diff.to_set).await?;
        }
        if !diff.to_remove.is_empty() {
            self.service.untag(queue_url, &diff.to_remove).await?;
        }
        debug!(
            "Synced tags on queue {}: set {:?}, removed {:?}",
            desired.name,
            diff.to_set.keys().collect::<Vec<_>>(),
            diff.to_remove
        );
        Ok(true)
    }

    /// Delete the remote queue, then release the finalizer.
    async fn reconcile_delete(&self, queue: &Queue) -> Result<ReconcileOutcome, ReconcileError> {
        let key = QueueKey::from_queue(queue);
        if !has_finalizer(queue, QUEUE_FINALIZER) {
            debug!(queue = %key, "Queue is being deleted and holds no finalizer");
            return Ok(ReconcileOutcome::Done);
        }

        info!(queue = %key, "Deleting Queue");
        let generation = queue.metadata.generation.unwrap_or_default();
        let observed = ObservedQueueState::from_status(queue.status.as_ref());

        let queue_url = if observed.queue_url.is_empty() {
            self.find_unrecorded_queue(queue).await
        } else {
            Ok(Some(observed.queue_url.clone()))
        };

        let deleted = match queue_url {
            Ok(Some(queue_url)) => self.service.delete(&queue_url).await.map(|()| Some(queue_url)),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };

        match deleted {
            Ok(Some(queue_url)) => {
                metrics::record_queue_deleted();
                info!(queue = %key, "Deleted queue at {}", queue_url);
            }
            Ok(None) => debug!(queue = %key, "No remote queue was ever created"),
            Err(e) => {
                let updater = QueueStatusUpdater::new(queue);
                return self
                    .report_failure(updater, generation, remote_error(e))
                    .await;
            }
        }

        let mut updater = QueueStatusUpdater::new(queue);
        updater.clear_remote_state();
        let queue = updater
            .publish(self.store.as_ref())
            .await?
            .unwrap_or_else(|| queue.clone());

        remove_finalizer(self.store.as_ref(), &queue, QUEUE_FINALIZER).await?;
        info!(queue = %key, "Released finalizer");
        Ok(ReconcileOutcome::Done)
    }

    /// Resolve the queue URL when deletion starts before any URL was recorded.
    ///
    /// Only `NotFound` proves the queue was never created.
    async fn find_unrecorded_queue(
        &self,
        queue: &Queue,
    ) -> Result<Option<String>, QueueServiceError> {
        let Ok(desired) = DesiredQueueSpec::from_queue(queue) else {
            // An invalid spec never reaches the service.
            return Ok(None);
        };
        match self.service.lookup_url_by_name(&desired.name).await {
            Ok(queue_url) => Ok(Some(queue_url)),
            Err(QueueServiceError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Publish a failed `ResourceSynced` condition and hand the error to the scheduler.
    async fn report_failure(
        &self,
        mut updater: QueueStatusUpdater,
        generation: i64,
        err: ReconcileError,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let reason = err.status_reason();
        let message = err.to_string();

        updater.set_observed_generation(generation);
        updater.set_condition(CONDITION_RESOURCE_SYNCED, STATUS_FALSE, reason, &message);
        if err.is_transient() {
            updater.set_condition(CONDITION_TERMINAL, STATUS_FALSE, reason, "");
        } else {
            updater.set_condition(CONDITION_TERMINAL, STATUS_TRUE, reason, &message);
        }

        if let Err(e) = updater.publish(self.store.as_ref()).await {
            warn!("Failed to record failure status: {e}");
        }
        Err(err)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod queue_tests;
