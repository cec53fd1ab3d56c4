// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # SQS Queue Operator for Kubernetes
//!
//! A Kubernetes operator written in Rust that manages Amazon SQS queues through the
//! `Queue` custom resource (`sqs.services.k8s.aws/v1alpha1`).
//!
//! ## Overview
//!
//! This library provides the core functionality of the operator:
//!
//! - The `Queue` Custom Resource Definition
//! - Loading and validating desired queue state from a `Queue` spec
//! - A remote queue adapter over `aws-sdk-sqs`, with an in-memory implementation for tests
//! - The reconciliation state machine, status reporting and finalizer handling
//! - A keyed work queue with per-key serialization, coalescing, backoff and periodic resync
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`desired`] - Desired and observed queue state, attribute and tag diffing
//! - [`sqs`] - Remote queue service adapter
//! - [`store`] - Access to `Queue` objects in the Kubernetes API
//! - [`reconcilers`] - Reconciliation logic
//! - [`scheduler`] - Reconciliation work queue
//! - [`config`] - Command-line and environment configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqs_queue_operator::crd::{Queue, QueueSpec};
//! use std::collections::BTreeMap;
//!
//! let queue = Queue::new(
//!     "orders",
//!     QueueSpec {
//!         name: "orders".to_string(),
//!         attributes: BTreeMap::from([("VisibilityTimeout".to_string(), "30".to_string())]),
//!         tags: BTreeMap::new(),
//!     },
//! );
//! ```
//!
//! ## Features
//!
//! - **Idempotent** - Create and delete can be repeated safely
//! - **Drift Correction** - Out-of-band attribute and tag changes are reverted on resync
//! - **Status Tracking** - `ResourceSynced` and `Terminal` conditions on the status subresource

pub mod backoff;
pub mod config;
pub mod constants;
pub mod crd;
pub mod desired;
pub mod errors;
pub mod metrics;
pub mod reconcilers;
pub mod scheduler;
pub mod sqs;
pub mod status_reasons;
pub mod store;

#[cfg(test)]
mod crd_tests;
