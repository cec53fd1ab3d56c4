// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the SQS queue operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the `Queue` CRD
pub const API_GROUP: &str = "sqs.services.k8s.aws";

/// API version for the `Queue` CRD
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "sqs.services.k8s.aws/v1alpha1";

/// Kind name for `Queue` resource
pub const KIND_QUEUE: &str = "Queue";

/// Plural resource name for `Queue`
pub const QUEUE_PLURAL: &str = "queues";

/// Finalizer that blocks `Queue` removal until the remote queue is gone
pub const QUEUE_FINALIZER: &str = "finalizers.sqs.services.k8s.aws/Queue";

// ============================================================================
// SQS Constants
// ============================================================================

/// Suffix required on the name of every FIFO queue
pub const FIFO_SUFFIX: &str = ".fifo";

/// Maximum length of an SQS queue name (including the `.fifo` suffix)
pub const MAX_QUEUE_NAME_LEN: usize = 80;

/// Default region used by the in-memory backend when none is configured
pub const DEFAULT_MEMORY_REGION: &str = "us-east-1";

/// Account ID reported by the in-memory backend
pub const MEMORY_ACCOUNT_ID: &str = "000000000000";

// ============================================================================
// Reconciliation Constants
// ============================================================================

/// Default number of reconciliation workers
pub const DEFAULT_RECONCILE_WORKERS: usize = 4;

/// Default periodic resync interval (10 hours)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 36_000;

/// Default deadline for a single remote queue service call
pub const DEFAULT_REMOTE_CALL_TIMEOUT_SECS: u64 = 10;

/// Default base interval for failure backoff (1 second)
pub const DEFAULT_BACKOFF_BASE_MILLIS: u64 = 1_000;

/// Default ceiling for failure backoff (5 minutes)
pub const DEFAULT_BACKOFF_CAP_SECS: u64 = 300;

/// Requeue delay used when a reconcile made progress but has not converged yet
pub const NOT_CONVERGED_REQUEUE_SECS: u64 = 1;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Path for the liveness endpoint
pub const HEALTH_SERVER_PATH: &str = "/healthz";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
