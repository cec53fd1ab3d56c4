// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration.
//!
//! Every setting is a command-line flag that can also be provided through an environment
//! variable. The parsed [`ControllerConfig`] is passed explicitly to the components that
//! need it.
//!
//! # Example
//!
//! ```rust,no_run
//! use clap::Parser;
//! use sqs_queue_operator::config::ControllerConfig;
//!
//! let config = ControllerConfig::parse_from(["sqs-queue-operator", "--workers", "8"]);
//! assert_eq!(config.workers, 8);
//! ```

use crate::backoff::BackoffPolicy;
use crate::constants::{
    DEFAULT_BACKOFF_BASE_MILLIS, DEFAULT_BACKOFF_CAP_SECS, DEFAULT_MEMORY_REGION,
    DEFAULT_RECONCILE_WORKERS, DEFAULT_REMOTE_CALL_TIMEOUT_SECS, DEFAULT_RESYNC_INTERVAL_SECS,
    METRICS_SERVER_PORT,
};
use clap::builder::TypedValueParser;
use clap::{Parser, ValueEnum};
use std::time::Duration;

/// Which remote queue service implementation to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum QueueBackend {
    /// Amazon SQS or an SQS-compatible endpoint
    Sqs,
    /// In-process queues, for local development
    Memory,
}

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// SQS queue operator - reconciles `Queue` custom resources against Amazon SQS
#[derive(Parser, Clone, Debug)]
#[command(name = "sqs-queue-operator", version, about, long_about = None)]
pub struct ControllerConfig {
    /// AWS region for the SQS client (defaults to the SDK's provider chain)
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Override the SQS endpoint, e.g. for localstack
    #[arg(long, env = "SQS_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// Remote queue service implementation
    #[arg(long, env = "QUEUE_BACKEND", value_enum, default_value_t = QueueBackend::Sqs)]
    pub queue_backend: QueueBackend,

    /// Number of queues reconciled in parallel
    #[arg(
        long,
        env = "RECONCILE_WORKERS",
        default_value_t = DEFAULT_RECONCILE_WORKERS,
        value_parser = clap::value_parser!(u16).range(1..).map(usize::from)
    )]
    pub workers: usize,

    /// Interval between full resyncs, in seconds
    #[arg(long, env = "RESYNC_INTERVAL_SECS", default_value_t = DEFAULT_RESYNC_INTERVAL_SECS)]
    pub resync_interval_secs: u64,

    /// Deadline for each SQS call, in seconds
    #[arg(long, env = "REMOTE_CALL_TIMEOUT_SECS", default_value_t = DEFAULT_REMOTE_CALL_TIMEOUT_SECS)]
    pub remote_timeout_secs: u64,

    /// Base delay for retrying transient failures, in milliseconds
    #[arg(long, env = "BACKOFF_BASE_MILLIS", default_value_t = DEFAULT_BACKOFF_BASE_MILLIS)]
    pub backoff_base_millis: u64,

    /// Maximum delay for retrying transient failures, in seconds
    #[arg(long, env = "BACKOFF_CAP_SECS", default_value_t = DEFAULT_BACKOFF_CAP_SECS)]
    pub backoff_cap_secs: u64,

    /// Only watch `Queue` objects in this namespace (defaults to all namespaces)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Port for the `/metrics` and `/healthz` endpoints
    #[arg(long, env = "METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    pub metrics_port: u16,

    /// Log output format
    #[arg(long, env = "RUST_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text, ignore_case = true)]
    pub log_format: LogFormat,
}

impl ControllerConfig {
    /// Backoff policy for transient failures.
    #[must_use]
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.backoff_base_millis),
            Duration::from_secs(self.backoff_cap_secs),
        )
    }

    #[must_use]
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs.max(1))
    }

    #[must_use]
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs.max(1))
    }

    /// Region reported by the in-memory backend.
    #[must_use]
    pub fn memory_region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_MEMORY_REGION)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
