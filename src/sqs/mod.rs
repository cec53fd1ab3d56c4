// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Remote queue service adapter.
//!
//! The reconciler talks to SQS only through the [`QueueService`] trait. Two implementations
//! are provided:
//!
//! - [`SqsQueueService`] calls Amazon SQS (or any SQS-compatible endpoint) through `aws-sdk-sqs`
//! - [`MemoryQueueService`] keeps queues in process memory, for tests and local runs
//!
//! Either one is wrapped in a [`DeadlineQueueService`], which bounds every call with a
//! deadline. A call that does not finish in time fails with
//! [`QueueServiceError::Unavailable`] and is retried by the scheduler like any other
//! transient failure.
//!
//! # Example
//!
//! ```rust,no_run
//! use sqs_queue_operator::sqs::{MemoryQueueService, QueueService};
//! use sqs_queue_operator::desired::DesiredQueueSpec;
//! use std::collections::BTreeMap;
//!
//! # async fn example() -> Result<(), sqs_queue_operator::errors::QueueServiceError> {
//! let service = MemoryQueueService::new("us-east-1");
//! let spec = DesiredQueueSpec {
//!     name: "orders".to_string(),
//!     attributes: BTreeMap::new(),
//!     tags: BTreeMap::new(),
//!     generation: 1,
//! };
//! let url = service.create(&spec).await?;
//! service.delete(&url).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod memory;

pub use client::SqsQueueService;
pub use memory::MemoryQueueService;

use crate::desired::DesiredQueueSpec;
use crate::errors::QueueServiceError;
use crate::metrics;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

/// Result type for queue service calls.
pub type QueueServiceResult<T> = Result<T, QueueServiceError>;

/// Operations the reconciler needs from the remote queue service.
///
/// Implementations must make [`QueueService::create`] and [`QueueService::delete`]
/// idempotent: creating a queue that already exists with identical attributes returns its
/// URL, and deleting a queue that does not exist succeeds.
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Create the queue described by `spec`, returning its URL.
    ///
    /// # Errors
    ///
    /// - [`QueueServiceError::AlreadyExists`] if a queue with the same name exists with
    ///   different attributes
    /// - [`QueueServiceError::InvalidParameter`] if the service rejects an attribute
    /// - [`QueueServiceError::Throttled`] / [`QueueServiceError::Unavailable`] on transient failures
    async fn create(&self, spec: &DesiredQueueSpec) -> QueueServiceResult<String>;

    /// Fetch all attributes of the queue at `queue_url`.
    ///
    /// # Errors
    ///
    /// [`QueueServiceError::NotFound`] if the queue no longer exists.
    async fn get_attributes(&self, queue_url: &str)
        -> QueueServiceResult<BTreeMap<String, String>>;

    /// Apply `attributes` to the queue at `queue_url`. Keys not listed are left unchanged.
    ///
    /// # Errors
    ///
    /// [`QueueServiceError::NotFound`] if the queue no longer exists, or
    /// [`QueueServiceError::InvalidParameter`] if the service rejects a value.
    async fn set_attributes(
        &self,
        queue_url: &str,
        attributes: &BTreeMap<String, String>,
    ) -> QueueServiceResult<()>;

    /// Delete the queue at `queue_url`. Deleting a missing queue succeeds.
    ///
    /// # Errors
    ///
    /// Transient failures only.
    async fn delete(&self, queue_url: &str) -> QueueServiceResult<()>;

    /// Resolve a queue name to its URL.
    ///
    /// # Errors
    ///
    /// [`QueueServiceError::NotFound`] if no queue has that name.
    async fn lookup_url_by_name(&self, name: &str) -> QueueServiceResult<String>;

    /// List the tags on the queue at `queue_url`.
    ///
    /// # Errors
    ///
    /// [`QueueServiceError::NotFound`] if the queue no longer exists.
    async fn list_tags(&self, queue_url: &str) -> QueueServiceResult<BTreeMap<String, String>>;

    /// Add or overwrite `tags` on the queue at `queue_url`.
    ///
    /// # Errors
    ///
    /// [`QueueServiceError::NotFound`] if the queue no longer exists.
    async fn tag(&self, queue_url: &str, tags: &BTreeMap<String, String>)
        -> QueueServiceResult<()>;

    /// Remove the tags named in `keys` from the queue at `queue_url`.
    ///
    /// # Errors
    ///
    /// [`QueueServiceError::NotFound`] if the queue no longer exists.
    async fn untag(&self, queue_url: &str, keys: &[String]) -> QueueServiceResult<()>;
}

/// Run `call` with a deadline.
///
/// # Arguments
///
/// * `deadline` - Maximum time the call may take
/// * `operation` - Operation name, used in the error message
/// * `call` - The remote call
///
/// # Errors
///
/// Returns the call's own error, or [`QueueServiceError::Unavailable`] if the deadline
/// passes first.
pub async fn with_deadline<T, F>(
    deadline: Duration,
    operation: &str,
    call: F,
) -> QueueServiceResult<T>
where
    F: Future<Output = QueueServiceResult<T>>,
{
    let result = match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(QueueServiceError::unavailable(
            operation,
            format!("no response within {}ms", deadline.as_millis()),
        )),
    };
    let outcome = match &result {
        Ok(_) => "success",
        Err(e) => e.status_reason(),
    };
    metrics::record_remote_call(operation, outcome);
    result
}

/// Applies a deadline to every call of the wrapped service.
#[derive(Debug)]
pub struct DeadlineQueueService<S> {
    inner: S,
    deadline: Duration,
}

impl<S: QueueService> DeadlineQueueService<S> {
    /// Wrap `inner` so that no call takes longer than `deadline`.
    #[must_use]
    pub fn new(inner: S, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    /// The wrapped service.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: QueueService> QueueService for DeadlineQueueService<S> {
    async fn create(&self, spec: &DesiredQueueSpec) -> QueueServiceResult<String> {
        with_deadline(self.deadline, "CreateQueue", self.inner.create(spec)).await
    }

    async fn get_attributes(
        &self,
        queue_url: &str,
    ) -> QueueServiceResult<BTreeMap<String, String>> {
        with_deadline(
            self.deadline,
            "GetQueueAttributes",
            self.inner.get_attributes(queue_url),
        )
        .await
    }

    async fn set_attributes(
        &self,
        queue_url: &str,
        attributes: &BTreeMap<String, String>,
    ) -> QueueServiceResult<()> {
        with_deadline(
            self.deadline,
            "SetQueueAttributes",
            self.inner.set_attributes(queue_url, attributes),
        )
        .await
    }

    async fn delete(&self, queue_url: &str) -> QueueServiceResult<()> {
        with_deadline(self.deadline, "DeleteQueue", self.inner.delete(queue_url)).await
    }

    async fn lookup_url_by_name(&self, name: &str) -> QueueServiceResult<String> {
        with_deadline(
            self.deadline,
            "GetQueueUrl",
            self.inner.lookup_url_by_name(name),
        )
        .await
    }

    async fn list_tags(&self, queue_url: &str) -> QueueServiceResult<BTreeMap<String, String>> {
        with_deadline(self.deadline, "ListQueueTags", self.inner.list_tags(queue_url)).await
    }

    async fn tag(
        &self,
        queue_url: &str,
        tags: &BTreeMap<String, String>,
    ) -> QueueServiceResult<()> {
        with_deadline(self.deadline, "TagQueue", self.inner.tag(queue_url, tags)).await
    }

    async fn untag(&self, queue_url: &str, keys: &[String]) -> QueueServiceResult<()> {
        with_deadline(self.deadline, "UntagQueue", self.inner.untag(queue_url, keys)).await
    }
}
