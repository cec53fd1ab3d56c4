// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for queue reconciliation.
//!
//! This module provides specialized error types for:
//! - Remote queue service operations (create, get/set attributes, delete, lookup, tags)
//! - Custom resource store operations (reads, finalizers, optimistic-locked status writes)
//! - Local spec validation
//!
//! Every error is classified as either transient (retried with backoff) or terminal
//! (reported on the resource and not retried until its spec changes). `NotFound` on the
//! delete and lookup paths is handled by callers and never surfaced as a failure.

use crate::status_reasons::{
    REASON_ACCESS_DENIED, REASON_ALREADY_EXISTS, REASON_ATTRIBUTE_IMMUTABLE,
    REASON_INVALID_PARAMETER, REASON_INVALID_SPEC, REASON_NOT_FOUND, REASON_QUEUE_NAME_IMMUTABLE,
    REASON_QUOTA_EXCEEDED, REASON_RECONCILE_FAILED, REASON_SERVICE_UNAVAILABLE,
    REASON_STATUS_CONFLICT, REASON_STORE_UNAVAILABLE, REASON_THROTTLED,
};
use thiserror::Error;

/// Errors returned by the remote queue service adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueServiceError {
    /// A queue with this name exists with different attributes.
    #[error("Queue '{name}' already exists with different attributes")]
    AlreadyExists {
        /// The queue name
        name: String,
    },

    /// The queue does not exist.
    ///
    /// Distinct from [`QueueServiceError::Unavailable`]: "does not exist" is an answer,
    /// "could not check" is not.
    #[error("Queue '{queue}' does not exist")]
    NotFound {
        /// Queue name or URL that was looked up
        queue: String,
    },

    /// The service rejected a parameter of the request.
    #[error("Invalid parameter for {operation}: {message}")]
    InvalidParameter {
        /// Operation that was rejected
        operation: String,
        /// Service-provided explanation
        message: String,
    },

    /// The account reached an SQS limit that retrying will not clear.
    #[error("Quota exceeded during {operation}: {message}")]
    QuotaExceeded {
        /// Operation that was refused
        operation: String,
        /// Service-provided explanation
        message: String,
    },

    /// The caller is not authorized for the operation or the queue's KMS key.
    #[error("Access denied during {operation}: {message}")]
    AccessDenied {
        /// Operation that was refused
        operation: String,
        /// Service-provided explanation
        message: String,
    },

    /// The service throttled the request.
    #[error("Request throttled during {operation}: {message}")]
    Throttled {
        /// Operation that was throttled
        operation: String,
        /// Service-provided explanation
        message: String,
    },

    /// The service could not be reached, failed internally, or the call exceeded its deadline.
    #[error("Queue service unavailable during {operation}: {message}")]
    Unavailable {
        /// Operation that failed
        operation: String,
        /// Transport or service explanation
        message: String,
    },
}

impl QueueServiceError {
    /// Returns `true` if the operation may succeed when retried unchanged.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Throttled { .. } | Self::Unavailable { .. })
    }

    /// Returns the condition reason reported for this error.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::AlreadyExists { .. } => REASON_ALREADY_EXISTS,
            Self::NotFound { .. } => REASON_NOT_FOUND,
            Self::InvalidParameter { .. } => REASON_INVALID_PARAMETER,
            Self::QuotaExceeded { .. } => REASON_QUOTA_EXCEEDED,
            Self::AccessDenied { .. } => REASON_ACCESS_DENIED,
            Self::Throttled { .. } => REASON_THROTTLED,
            Self::Unavailable { .. } => REASON_SERVICE_UNAVAILABLE,
        }
    }

    /// Shorthand for building an [`QueueServiceError::Unavailable`].
    pub fn unavailable(operation: &str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

/// Errors returned by the custom resource store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The object changed since it was read (optimistic lock failure, HTTP 409).
    #[error("Conflict writing {key}: object was modified concurrently")]
    Conflict {
        /// `namespace/name` of the object
        key: String,
    },

    /// The object no longer exists (HTTP 404).
    #[error("{key} not found")]
    NotFound {
        /// `namespace/name` of the object
        key: String,
    },

    /// Rate limiting, server errors, or connection failures.
    #[error("Kubernetes API unavailable: {0}")]
    Unavailable(String),

    /// Any other API failure (validation, authorization, malformed request).
    #[error("Kubernetes API request failed: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Returns `true` if the operation may succeed when retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Unavailable(_))
    }

    /// Returns the condition reason reported for this error.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::Conflict { .. } => REASON_STATUS_CONFLICT,
            Self::NotFound { .. } => REASON_NOT_FOUND,
            Self::Unavailable(_) => REASON_STORE_UNAVAILABLE,
            Self::Rejected(_) => REASON_RECONCILE_FAILED,
        }
    }

    /// Classify a Kubernetes API error for the object `key`.
    ///
    /// 409 maps to [`StoreError::Conflict`], 404 to [`StoreError::NotFound`], rate limiting,
    /// server errors and connection failures to [`StoreError::Unavailable`]. Everything else
    /// is [`StoreError::Rejected`].
    #[must_use]
    pub fn from_kube(err: kube::Error, key: &str) -> Self {
        match &err {
            kube::Error::Api(response) if response.code == 409 => Self::Conflict {
                key: key.to_string(),
            },
            kube::Error::Api(response) if response.code == 404 => Self::NotFound {
                key: key.to_string(),
            },
            // Retry on rate limiting (429) and server errors (5xx)
            kube::Error::Api(response)
                if response.code == 429 || (500..600).contains(&response.code) =>
            {
                Self::Unavailable(err.to_string())
            }
            // Network/connection errors are retryable
            kube::Error::Service(_) => Self::Unavailable(err.to_string()),
            _ => Self::Rejected(err.to_string()),
        }
    }
}

/// Errors found while validating a `Queue` spec, before any remote call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    /// Queue name is empty, too long, or contains unsupported characters.
    #[error("Invalid queue name '{name}': {reason}")]
    InvalidName {
        /// The offending name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// Attribute is not a settable SQS queue attribute.
    #[error("Unknown queue attribute '{0}'")]
    UnknownAttribute(String),

    /// Attribute value cannot be accepted.
    #[error("Invalid value '{value}' for attribute '{attribute}': {reason}")]
    InvalidAttributeValue {
        /// Attribute name
        attribute: String,
        /// Offending value
        value: String,
        /// What is wrong with it
        reason: String,
    },

    /// The spec renames an existing queue.
    #[error("Queue name is immutable: existing queue is '{existing}', spec requests '{requested}'")]
    NameImmutable {
        /// Name of the queue that exists
        existing: String,
        /// Name requested by the spec
        requested: String,
    },

    /// The spec changes an attribute fixed at creation time.
    #[error("Attribute '{attribute}' cannot be changed after creation")]
    AttributeImmutable {
        /// Attribute name
        attribute: String,
    },
}

impl SpecError {
    /// Returns the condition reason reported for this error.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::NameImmutable { .. } => REASON_QUEUE_NAME_IMMUTABLE,
            Self::AttributeImmutable { .. } => REASON_ATTRIBUTE_IMMUTABLE,
            Self::InvalidName { .. }
            | Self::UnknownAttribute(_)
            | Self::InvalidAttributeValue { .. } => REASON_INVALID_SPEC,
        }
    }
}

/// Outcome of a failed reconciliation, as seen by the scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// Retry with backoff.
    #[error("{reason}: {message}")]
    Transient {
        /// Condition reason
        reason: &'static str,
        /// Human-readable explanation
        message: String,
    },

    /// Do not retry until the spec changes.
    #[error("{reason}: {message}")]
    Terminal {
        /// Condition reason
        reason: &'static str,
        /// Human-readable explanation
        message: String,
    },
}

impl ReconcileError {
    /// Returns `true` if the scheduler should requeue with backoff.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns the condition reason for this failure.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::Transient { reason, .. } | Self::Terminal { reason, .. } => reason,
        }
    }
}

impl From<QueueServiceError> for ReconcileError {
    fn from(err: QueueServiceError) -> Self {
        let reason = err.status_reason();
        if err.is_transient() {
            Self::Transient {
                reason,
                message: err.to_string(),
            }
        } else {
            Self::Terminal {
                reason,
                message: err.to_string(),
            }
        }
    }
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        let reason = err.status_reason();
        if err.is_transient() {
            Self::Transient {
                reason,
                message: err.to_string(),
            }
        } else {
            Self::Terminal {
                reason,
                message: err.to_string(),
            }
        }
    }
}

impl From<SpecError> for ReconcileError {
    fn from(err: SpecError) -> Self {
        Self::Terminal {
            reason: err.status_reason(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
