// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard Kubernetes status condition types and reasons for `Queue` resources.
//!
//! Reasons are programmatic identifiers in CamelCase that explain why a condition has
//! a particular status.
//!
//! # Condition Types
//!
//! - `ResourceSynced` - `True` once the remote queue matches the desired spec for the
//!   current generation, `False` while converging or after a failure.
//! - `Terminal` - `True` when reconciliation hit an error that will not be retried until
//!   the spec changes.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   queueURL: https://sqs.us-west-2.amazonaws.com/123456789012/sqs-queue-abc
//!   conditions:
//!     - type: ResourceSynced
//!       status: "True"
//!       reason: Synced
//!       message: "Queue sqs-queue-abc is in sync with generation 3"
//!     - type: Terminal
//!       status: "False"
//!       reason: Synced
//!       message: ""
//! ```

// ============================================================================
// Condition Types
// ============================================================================

/// Condition type reporting whether the remote queue matches the desired spec.
pub const CONDITION_RESOURCE_SYNCED: &str = "ResourceSynced";

/// Condition type reporting a failure that is not retried automatically.
pub const CONDITION_TERMINAL: &str = "Terminal";

/// Condition status values.
pub const STATUS_TRUE: &str = "True";
pub const STATUS_FALSE: &str = "False";
pub const STATUS_UNKNOWN: &str = "Unknown";

// ============================================================================
// Progress Reasons
// ============================================================================

/// Remote queue matches the desired spec.
pub const REASON_SYNCED: &str = "Synced";

/// Remote queue was just created.
pub const REASON_CREATED: &str = "Created";

/// Changed attributes or tags were pushed to the remote queue.
pub const REASON_UPDATED: &str = "Updated";

/// Periodic resync found out-of-band changes and overwrote them.
pub const REASON_DRIFT_CORRECTED: &str = "DriftCorrected";

/// The queue was deleted outside the operator and has been recreated.
pub const REASON_RECREATED: &str = "Recreated";

// ============================================================================
// Transient Failure Reasons
// ============================================================================

/// The queue service throttled the request.
pub const REASON_THROTTLED: &str = "Throttled";

/// The queue service could not be reached or timed out.
pub const REASON_SERVICE_UNAVAILABLE: &str = "ServiceUnavailable";

/// The custom resource was modified concurrently while status was written.
pub const REASON_STATUS_CONFLICT: &str = "StatusConflict";

/// The Kubernetes API returned a retryable error.
pub const REASON_STORE_UNAVAILABLE: &str = "StoreUnavailable";

// ============================================================================
// Terminal Failure Reasons
// ============================================================================

/// The queue service rejected a parameter.
///
/// Maps to `InvalidAttributeName`, `InvalidAttributeValue` and similar service errors.
/// Not retried until the spec changes.
pub const REASON_INVALID_PARAMETER: &str = "InvalidParameter";

/// The spec failed local validation before any remote call was made.
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";

/// The spec renamed a queue that already exists. Queue names cannot change.
pub const REASON_QUEUE_NAME_IMMUTABLE: &str = "QueueNameImmutable";

/// The spec changed an attribute that SQS fixes at creation time (e.g. `FifoQueue`).
pub const REASON_ATTRIBUTE_IMMUTABLE: &str = "AttributeImmutable";

/// A queue with the same name exists with different attributes and could not be adopted.
pub const REASON_ALREADY_EXISTS: &str = "AlreadyExists";

/// The account hit an SQS quota (e.g. `OverLimit`) that retrying will not clear.
pub const REASON_QUOTA_EXCEEDED: &str = "QuotaExceeded";

/// The operator's credentials are not allowed to perform the operation.
pub const REASON_ACCESS_DENIED: &str = "AccessDenied";

/// A queue expected to exist was not found.
pub const REASON_NOT_FOUND: &str = "NotFound";

/// Any other non-retryable failure.
pub const REASON_RECONCILE_FAILED: &str = "ReconcileFailed";
