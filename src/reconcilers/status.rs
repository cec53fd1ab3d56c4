// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers and the `Queue` status publisher.
//!
//! This module provides utility functions for creating and managing Kubernetes
//! status conditions following the standard conventions, and [`QueueStatusUpdater`],
//! which collects every status change made during one reconciliation and writes them in
//! a single optimistic-locked update.
//!
//! # Condition Format
//!
//! Kubernetes conditions follow a standard format:
//! - `type`: The aspect of the resource being reported (`ResourceSynced`, `Terminal`)
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the condition changed
//!
//! # Example
//!
//! ```rust,no_run
//! use sqs_queue_operator::reconcilers::status::create_condition;
//!
//! let condition = create_condition(
//!     "ResourceSynced",
//!     "True",
//!     "Synced",
//!     "Queue matches spec"
//! );
//! ```

use crate::crd::{AckResourceMetadata, Condition, Queue, QueueStatus};
use crate::errors::StoreError;
use crate::metrics;
use crate::scheduler::QueueKey;
use crate::store::QueueStore;
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Create a new Kubernetes condition with the current timestamp.
///
/// # Arguments
///
/// * `condition_type` - The type of condition (e.g., "ResourceSynced")
/// * `status` - The status: "True", "False", or "Unknown"
/// * `reason` - A programmatic identifier in `CamelCase` (e.g., "`Synced`")
/// * `message` - A human-readable explanation
///
/// # Returns
///
/// A new `Condition` with the current timestamp.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type in a list of conditions.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in a mutable conditions list (in-memory, no API call).
///
/// Preserves `lastTransitionTime` if the status hasn't changed, or sets a new timestamp
/// if it has.
///
/// # Arguments
///
/// * `conditions` - Mutable reference to the conditions list
/// * `condition_type` - The type of condition
/// * `status` - The status: "True", "False", or "Unknown"
/// * `reason` - A programmatic identifier in `CamelCase`
/// * `message` - A human-readable explanation
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        // Preserve lastTransitionTime if status hasn't changed
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Compare two condition lists, ignoring `lastTransitionTime`.
///
/// # Returns
///
/// * `true` - The conditions are semantically equal (no update needed)
/// * `false` - The conditions differ (update needed)
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    if current.len() != new.len() {
        return false;
    }

    for new_cond in new {
        match current.iter().find(|c| c.r#type == new_cond.r#type) {
            None => return false,
            Some(curr_cond) => {
                if curr_cond.status != new_cond.status
                    || curr_cond.reason != new_cond.reason
                    || curr_cond.message != new_cond.message
                {
                    return false;
                }
            }
        }
    }

    true
}

/// A condition change recorded by [`QueueStatusUpdater`], replayed on conflict.
#[derive(Clone, Debug)]
struct ConditionChange {
    condition_type: String,
    status: String,
    reason: String,
    message: String,
}

impl ConditionChange {
    fn apply(&self, conditions: &mut Vec<Condition>) {
        update_condition_in_memory(
            conditions,
            &self.condition_type,
            &self.status,
            &self.reason,
            &self.message,
        );
    }
}

/// Collects status changes for a `Queue` and publishes them in one write.
///
/// Writes are optimistic. If the object changed since it was read, the updater reloads
/// it, replays its changes on top of the latest status and tries once more. A second
/// conflict is returned to the caller as a transient [`StoreError::Conflict`].
///
/// `lastSyncedGeneration` never moves backwards, whichever copy of the status wins.
///
/// # Example
///
/// ```rust,ignore
/// let mut updater = QueueStatusUpdater::new(&queue);
/// updater.set_condition("ResourceSynced", "True", "Synced", "Queue matches spec");
/// updater.mark_synced(generation);
/// updater.publish(store.as_ref()).await?;
/// ```
pub struct QueueStatusUpdater {
    queue: Queue,
    current_status: Option<QueueStatus>,
    new_status: QueueStatus,
    condition_changes: Vec<ConditionChange>,
    remote_state_changed: bool,
}

impl QueueStatusUpdater {
    /// Create a new status updater for a `Queue`.
    #[must_use]
    pub fn new(queue: &Queue) -> Self {
        let current_status = queue.status.clone();
        let new_status = current_status.clone().unwrap_or_default();

        Self {
            queue: queue.clone(),
            current_status,
            new_status,
            condition_changes: Vec::new(),
            remote_state_changed: false,
        }
    }

    /// Update or add a condition (in-memory only, no API call).
    pub fn set_condition(
        &mut self,
        condition_type: &str,
        status: &str,
        reason: &str,
        message: &str,
    ) {
        let change = ConditionChange {
            condition_type: condition_type.to_string(),
            status: status.to_string(),
            reason: reason.to_string(),
            message: message.to_string(),
        };
        change.apply(&mut self.new_status.conditions);
        self.condition_changes.push(change);
    }

    /// Record that the remote queue exists at `queue_url`.
    pub fn set_queue_url(&mut self, queue_url: &str) {
        self.new_status.queue_url = Some(queue_url.to_string());
        self.new_status.exists = true;
        self.remote_state_changed = true;
    }

    /// Record the remote attributes for the keys the spec manages.
    pub fn set_observed_attributes(&mut self, attributes: BTreeMap<String, String>) {
        self.new_status.observed_attributes = attributes;
        self.remote_state_changed = true;
    }

    /// Record the queue ARN and owner account.
    pub fn set_resource_metadata(&mut self, metadata: Option<AckResourceMetadata>) {
        if metadata.is_some() {
            self.new_status.ack_resource_metadata = metadata;
            self.remote_state_changed = true;
        }
    }

    /// Forget everything known about the remote queue.
    pub fn clear_remote_state(&mut self) {
        self.new_status.queue_url = None;
        self.new_status.exists = false;
        self.new_status.observed_attributes.clear();
        self.new_status.ack_resource_metadata = None;
        self.remote_state_changed = true;
    }

    /// Record a successful sync of `generation`. Lower generations are ignored.
    pub fn mark_synced(&mut self, generation: i64) {
        self.new_status.last_synced_generation = Some(
            self.new_status
                .last_synced_generation
                .map_or(generation, |g| g.max(generation)),
        );
    }

    /// Set the generation this reconciliation processed.
    pub fn set_observed_generation(&mut self, generation: i64) {
        self.new_status.observed_generation = Some(generation);
    }

    /// The conditions as they will be published.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.new_status.conditions
    }

    /// The status as it will be published.
    #[must_use]
    pub fn status(&self) -> &QueueStatus {
        &self.new_status
    }

    /// Check if the status differs from what is stored, ignoring condition timestamps.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        let Some(current) = &self.current_status else {
            return true;
        };
        let new = &self.new_status;
        current.queue_url != new.queue_url
            || current.exists != new.exists
            || current.observed_attributes != new.observed_attributes
            || current.ack_resource_metadata != new.ack_resource_metadata
            || current.last_synced_generation != new.last_synced_generation
            || current.observed_generation != new.observed_generation
            || !conditions_equal(&current.conditions, &new.conditions)
    }

    /// Replay this updater's changes on top of `latest`.
    fn merged_onto(&self, latest: Option<&QueueStatus>) -> QueueStatus {
        let mut merged = latest.cloned().unwrap_or_default();

        if self.remote_state_changed {
            merged.queue_url.clone_from(&self.new_status.queue_url);
            merged.exists = self.new_status.exists;
            merged
                .observed_attributes
                .clone_from(&self.new_status.observed_attributes);
            merged
                .ack_resource_metadata
                .clone_from(&self.new_status.ack_resource_metadata);
        }

        for change in &self.condition_changes {
            change.apply(&mut merged.conditions);
        }

        merged.last_synced_generation = match (
            merged.last_synced_generation,
            self.new_status.last_synced_generation,
        ) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        merged.observed_generation = match (
            merged.observed_generation,
            self.new_status.observed_generation,
        ) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        merged
    }

    /// Write the collected status, retrying once on conflict.
    ///
    /// # Returns
    ///
    /// The updated object, or `None` if nothing changed or the object is gone.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the write conflicts twice, or any other store
    /// error unchanged.
    pub async fn publish<S>(&self, store: &S) -> Result<Option<Queue>, StoreError>
    where
        S: QueueStore + ?Sized,
    {
        if !self.has_changes() {
            debug!(queue = %QueueKey::from_queue(&self.queue), "Status unchanged, skipping update");
            return Ok(None);
        }

        match store.replace_status(&self.queue, &self.new_status).await {
            Ok(updated) => return Ok(Some(updated)),
            Err(StoreError::NotFound { .. }) => return Ok(None),
            Err(StoreError::Conflict { .. }) => {}
            Err(e) => return Err(e),
        }

        let key = QueueKey::from_queue(&self.queue);
        metrics::record_status_conflict();
        warn!(queue = %key, "Status update conflicted, reloading and retrying once");

        let Some(latest) = store.get(&key).await? else {
            return Ok(None);
        };
        let merged = self.merged_onto(latest.status.as_ref());

        match store.replace_status(&latest, &merged).await {
            Ok(updated) => Ok(Some(updated)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(StoreError::Conflict { .. }) => {
                metrics::record_status_conflict();
                Err(StoreError::Conflict {
                    key: key.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
