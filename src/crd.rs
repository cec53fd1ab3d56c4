// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definition for SQS queues.
//!
//! This module defines the `Queue` custom resource used to manage an Amazon SQS queue
//! declaratively. The operator watches `Queue` objects and keeps a remote queue in sync
//! with `spec`, reporting progress and failures through `status`.
//!
//! # Example: Creating a Queue
//!
//! ```rust,no_run
//! use sqs_queue_operator::crd::{Queue, QueueSpec};
//! use std::collections::BTreeMap;
//!
//! let spec = QueueSpec {
//!     name: "orders".to_string(),
//!     attributes: BTreeMap::from([
//!         ("VisibilityTimeout".to_string(), "30".to_string()),
//!         ("MessageRetentionPeriod".to_string(), "345600".to_string()),
//!     ]),
//!     tags: BTreeMap::from([("team".to_string(), "payments".to_string())]),
//! };
//!
//! let queue = Queue::new("orders", spec);
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition: `ResourceSynced` or `Terminal`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Identifiers of the remote queue as reported by AWS.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct AckResourceMetadata {
    /// Amazon Resource Name of the queue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,

    /// AWS account that owns the queue.
    #[serde(rename = "ownerAccountID", skip_serializing_if = "Option::is_none")]
    pub owner_account_id: Option<String>,
}

/// `Queue` status
///
/// Written only by the operator. `queueURL`, `exists`, `observedAttributes` and
/// `lastSyncedGeneration` together form the observed state of the remote queue.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// URL of the remote queue. Empty until creation succeeds.
    #[serde(rename = "queueURL", default)]
    pub queue_url: Option<String>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default)]
    pub ack_resource_metadata: Option<AckResourceMetadata>,

    /// Last known attributes of the remote queue, restricted to keys the spec manages.
    #[serde(default)]
    pub observed_attributes: BTreeMap<String, String>,

    /// `metadata.generation` at the last successful sync. Only moves forward.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_generation: Option<i64>,

    /// `metadata.generation` last processed, successfully or not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Whether the remote queue at `queueURL` is known to be present.
    #[serde(default)]
    pub exists: bool,
}

/// `Queue` manages a single Amazon SQS queue.
///
/// Creating a `Queue` provisions the remote queue; editing it pushes changed attributes
/// and tags; deleting it removes the remote queue before the object leaves the cluster.
///
/// # Example
///
/// ```yaml
/// apiVersion: sqs.services.k8s.aws/v1alpha1
/// kind: Queue
/// metadata:
///   name: sqs-queue-abc
///   namespace: default
/// spec:
///   name: sqs-queue-abc
///   attributes:
///     VisibilityTimeout: "30"
///     MessageRetentionPeriod: "345600"
///   tags:
///     team: payments
/// ```
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[kube(
    group = "sqs.services.k8s.aws",
    version = "v1alpha1",
    kind = "Queue",
    plural = "queues",
    namespaced,
    doc = "Queue represents an Amazon SQS queue. The operator creates the queue, keeps its attributes and tags in sync with spec, and deletes it when the Queue is deleted.",
    printcolumn = r#"{"name":"Queue","type":"string","jsonPath":".spec.name"}"#,
    printcolumn = r#"{"name":"Synced","type":"string","jsonPath":".status.conditions[?(@.type==\"ResourceSynced\")].status"}"#,
    printcolumn = r#"{"name":"URL","type":"string","jsonPath":".status.queueURL","priority":1}"#
)]
#[kube(status = "QueueStatus")]
#[serde(rename_all = "camelCase")]
pub struct QueueSpec {
    /// SQS queue name. Defaults to `metadata.name` when empty.
    ///
    /// Up to 80 alphanumeric characters, hyphens and underscores. FIFO queue names
    /// end in `.fifo`. Immutable once the queue exists.
    #[serde(default)]
    pub name: String,

    /// SQS queue attributes, e.g. `VisibilityTimeout`, `MessageRetentionPeriod`,
    /// `DelaySeconds`, `Policy`, `RedrivePolicy`.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Cost allocation tags applied to the queue.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}
