// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the SQS queue operator.
//!
//! This module provides metrics collection with the namespace prefix
//! `sqs_services_k8s_aws_` (prometheus-safe version of "sqs.services.k8s.aws").
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Track reconciliation runs, their outcomes and requeues
//! - **Queue Lifecycle Metrics** - Track remote queue creation, updates, drift and deletion
//! - **Error Metrics** - Track failures by condition reason
//! - **Scheduler Metrics** - Track pending work and coalesced events
//!
//! # Example
//!
//! ```rust,no_run
//! use sqs_queue_operator::metrics::record_reconciliation_success;
//!
//! // Record a successful reconciliation
//! record_reconciliation_success("Create", std::time::Duration::from_secs(1));
//! ```

use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all operator metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "sqs_services_k8s_aws";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn register_counter(name: &str, help: &str) -> Counter {
    let opts = Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help);
    let counter = Counter::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
}

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by trigger and status
///
/// Labels:
/// - `reason`: What triggered the run (`Create`, `Update`, `Delete`, `Resync`)
/// - `status`: Outcome (`success`, `error`, `requeue`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by trigger and status",
    );
    let counter = CounterVec::new(opts, &["reason", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `reason`: What triggered the run
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by trigger",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of requeue operations
///
/// Labels:
/// - `reason`: Why the key was requeued (`backoff`, `not_converged`)
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_requeues_total"),
        "Total number of requeue operations by reason",
    );
    let counter = CounterVec::new(opts, &["reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Queue Lifecycle Metrics
// ============================================================================

/// Total number of remote queues created
pub static QUEUES_CREATED_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    register_counter("queues_created_total", "Total number of SQS queues created")
});

/// Total number of attribute or tag updates pushed to remote queues
pub static QUEUES_UPDATED_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    register_counter(
        "queues_updated_total",
        "Total number of SQS queue attribute or tag updates",
    )
});

/// Total number of remote queues deleted
pub static QUEUES_DELETED_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    register_counter("queues_deleted_total", "Total number of SQS queues deleted")
});

/// Total number of out-of-band changes reverted during resync
pub static DRIFT_CORRECTIONS_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    register_counter(
        "drift_corrections_total",
        "Total number of out-of-band queue changes reverted",
    )
});

/// Total number of calls to the remote queue service
///
/// Labels:
/// - `operation`: SQS API operation (e.g., `CreateQueue`)
/// - `outcome`: `success`, or the condition reason of the failure
pub static REMOTE_CALLS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_remote_calls_total"),
        "Total number of SQS API calls by operation and outcome",
    );
    let counter = CounterVec::new(opts, &["operation", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of failed reconciliations by condition reason
///
/// Labels:
/// - `error_type`: Condition reason (e.g., `Throttled`, `InvalidParameter`)
/// - `class`: `transient` or `terminal`
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of reconciliation errors by reason and class",
    );
    let counter = CounterVec::new(opts, &["error_type", "class"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of status writes rejected by the optimistic lock
pub static STATUS_CONFLICTS_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    register_counter(
        "status_conflicts_total",
        "Total number of status writes that hit a resource version conflict",
    )
});

// ============================================================================
// Scheduler Metrics
// ============================================================================

/// Keys waiting to be reconciled, including keys marked for a rerun
pub static SCHEDULER_PENDING: LazyLock<IntGauge> = LazyLock::new(|| {
    let gauge = IntGauge::with_opts(Opts::new(
        format!("{METRICS_NAMESPACE}_scheduler_pending"),
        "Number of keys waiting to be reconciled",
    ))
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(gauge.clone()))
        .unwrap();
    gauge
});

/// Events merged into an already pending request for the same key
pub static COALESCED_EVENTS_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    register_counter(
        "coalesced_events_total",
        "Total number of events merged into a pending request",
    )
});

// ============================================================================
// Recording helpers
// ============================================================================

/// Record a successful reconciliation
///
/// # Arguments
/// * `reason` - What triggered the run (e.g., `Create`)
/// * `duration` - Duration of the reconciliation
pub fn record_reconciliation_success(reason: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[reason, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[reason])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
///
/// # Arguments
/// * `reason` - What triggered the run
/// * `duration` - Duration of the reconciliation before failure
/// * `error_type` - Condition reason of the failure
/// * `transient` - Whether the failure will be retried
pub fn record_reconciliation_error(
    reason: &str,
    duration: Duration,
    error_type: &str,
    transient: bool,
) {
    RECONCILIATION_TOTAL
        .with_label_values(&[reason, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[reason])
        .observe(duration.as_secs_f64());
    let class = if transient { "transient" } else { "terminal" };
    ERRORS_TOTAL.with_label_values(&[error_type, class]).inc();
}

/// Record a reconciliation requeue
///
/// # Arguments
/// * `reason` - What triggered the run
/// * `requeue_reason` - Why it was requeued (`backoff`, `not_converged`)
pub fn record_reconciliation_requeue(reason: &str, requeue_reason: &str) {
    RECONCILIATION_TOTAL
        .with_label_values(&[reason, "requeue"])
        .inc();
    REQUEUE_TOTAL.with_label_values(&[requeue_reason]).inc();
}

/// Record a remote queue creation
pub fn record_queue_created() {
    QUEUES_CREATED_TOTAL.inc();
}

/// Record a remote attribute or tag update
pub fn record_queue_updated() {
    QUEUES_UPDATED_TOTAL.inc();
}

/// Record a remote queue deletion
pub fn record_queue_deleted() {
    QUEUES_DELETED_TOTAL.inc();
}

/// Record a drift correction
pub fn record_drift_corrected() {
    DRIFT_CORRECTIONS_TOTAL.inc();
}

/// Record a call to the remote queue service
///
/// # Arguments
/// * `operation` - SQS API operation
/// * `outcome` - `success`, or the condition reason of the failure
pub fn record_remote_call(operation: &str, outcome: &str) {
    REMOTE_CALLS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

/// Record an optimistic lock conflict on a status write
pub fn record_status_conflict() {
    STATUS_CONFLICTS_TOTAL.inc();
}

/// Record the number of pending keys
#[allow(clippy::cast_possible_wrap)]
pub fn set_scheduler_pending(pending: usize) {
    SCHEDULER_PENDING.set(pending as i64);
}

/// Record an event coalesced into a pending request
pub fn record_coalesced_event() {
    COALESCED_EVENTS_TOTAL.inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
