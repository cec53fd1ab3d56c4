// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-process [`QueueService`] that behaves like SQS for the operations the reconciler uses.
//!
//! Used by the test suite and by `--queue-backend memory` for running the operator
//! without AWS. Besides the trait operations it can:
//!
//! - count calls per operation, to assert idempotence (no redundant writes)
//! - inject failures for the next call of an operation
//! - change attributes out-of-band, to simulate drift
//! - delay every call, to exercise deadlines

use super::{QueueService, QueueServiceResult};
use crate::constants::MEMORY_ACCOUNT_ID;
use crate::desired::{queue_name_from_url, DesiredQueueSpec, QUEUE_ARN_ATTRIBUTE};
use crate::errors::QueueServiceError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const OP_CREATE: &str = "create";
pub const OP_GET_ATTRIBUTES: &str = "get_attributes";
pub const OP_SET_ATTRIBUTES: &str = "set_attributes";
pub const OP_DELETE: &str = "delete";
pub const OP_LOOKUP: &str = "lookup_url_by_name";
pub const OP_LIST_TAGS: &str = "list_tags";
pub const OP_TAG: &str = "tag";
pub const OP_UNTAG: &str = "untag";

/// Service defaults for a freshly created standard queue.
const DEFAULT_ATTRIBUTES: &[(&str, &str)] = &[
    ("DelaySeconds", "0"),
    ("MaximumMessageSize", "262144"),
    ("MessageRetentionPeriod", "345600"),
    ("ReceiveMessageWaitTimeSeconds", "0"),
    ("VisibilityTimeout", "30"),
    ("SqsManagedSseEnabled", "true"),
];

/// Inclusive ranges SQS enforces for numeric attributes.
const NUMERIC_LIMITS: &[(&str, u64, u64)] = &[
    ("DelaySeconds", 0, 900),
    ("MaximumMessageSize", 1_024, 1_048_576),
    ("MessageRetentionPeriod", 60, 1_209_600),
    ("ReceiveMessageWaitTimeSeconds", 0, 20),
    ("VisibilityTimeout", 0, 43_200),
    ("KmsDataKeyReusePeriodSeconds", 60, 86_400),
];

#[derive(Clone, Debug, Default)]
struct StoredQueue {
    attributes: BTreeMap<String, String>,
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    queues: BTreeMap<String, StoredQueue>,
    faults: HashMap<&'static str, VecDeque<QueueServiceError>>,
    calls: HashMap<&'static str, usize>,
    latency: Option<Duration>,
}

/// In-memory queue service.
#[derive(Debug)]
pub struct MemoryQueueService {
    region: String,
    state: Mutex<MemoryState>,
}

impl MemoryQueueService {
    /// Create an empty service for `region`.
    #[must_use]
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// URL a queue named `name` gets in this service.
    #[must_use]
    pub fn queue_url(&self, name: &str) -> String {
        format!(
            "https://sqs.{}.amazonaws.com/{MEMORY_ACCOUNT_ID}/{name}",
            self.region
        )
    }

    fn queue_arn(&self, name: &str) -> String {
        format!("arn:aws:sqs:{}:{MEMORY_ACCOUNT_ID}:{name}", self.region)
    }

    /// Whether a queue named `name` currently exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.state().queues.contains_key(name)
    }

    /// Names of all existing queues.
    #[must_use]
    pub fn queue_names(&self) -> Vec<String> {
        self.state().queues.keys().cloned().collect()
    }

    /// Current attributes of `name`, if it exists.
    #[must_use]
    pub fn attributes(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.state().queues.get(name).map(|q| q.attributes.clone())
    }

    /// Current tags of `name`, if it exists.
    #[must_use]
    pub fn tags(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.state().queues.get(name).map(|q| q.tags.clone())
    }

    /// Change an attribute behind the operator's back.
    pub fn mutate_attribute(&self, name: &str, key: &str, value: &str) {
        if let Some(queue) = self.state().queues.get_mut(name) {
            queue.attributes.insert(key.to_string(), value.to_string());
        }
    }

    /// Delete a queue behind the operator's back.
    pub fn remove_queue(&self, name: &str) {
        self.state().queues.remove(name);
    }

    /// Fail the next call of `operation` with `error`. Faults queue up in order.
    pub fn inject_fault(&self, operation: &'static str, error: QueueServiceError) {
        self.state()
            .faults
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    /// Number of calls made to `operation` so far, including failed ones.
    #[must_use]
    pub fn call_count(&self, operation: &str) -> usize {
        self.state().calls.get(operation).copied().unwrap_or_default()
    }

    /// Number of calls that change remote state (create, set attributes, delete, tag, untag).
    #[must_use]
    pub fn write_count(&self) -> usize {
        [OP_CREATE, OP_SET_ATTRIBUTES, OP_DELETE, OP_TAG, OP_UNTAG]
            .iter()
            .map(|op| self.call_count(op))
            .sum()
    }

    /// Record the call, apply latency, and return an injected fault if one is pending.
    async fn begin(&self, operation: &'static str) -> QueueServiceResult<()> {
        let (latency, fault) = {
            let mut state = self.state();
            *state.calls.entry(operation).or_default() += 1;
            let fault = state
                .faults
                .get_mut(operation)
                .and_then(VecDeque::pop_front);
            (state.latency, fault)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        fault.map_or(Ok(()), Err)
    }

    fn name_for(queue_url: &str) -> QueueServiceResult<String> {
        queue_name_from_url(queue_url)
            .map(ToString::to_string)
            .ok_or_else(|| QueueServiceError::NotFound {
                queue: queue_url.to_string(),
            })
    }

    fn validate_attributes(
        operation: &str,
        attributes: &BTreeMap<String, String>,
    ) -> QueueServiceResult<()> {
        for (key, value) in attributes {
            let Some((_, min, max)) = NUMERIC_LIMITS.iter().find(|(name, _, _)| name == key) else {
                continue;
            };
            let in_range = value
                .parse::<u64>()
                .is_ok_and(|n| (*min..=*max).contains(&n));
            if !in_range {
                return Err(QueueServiceError::InvalidParameter {
                    operation: operation.to_string(),
                    message: format!("Invalid value for the parameter {key}: must be between {min} and {max}"),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl QueueService for MemoryQueueService {
    async fn create(&self, spec: &DesiredQueueSpec) -> QueueServiceResult<String> {
        self.begin(OP_CREATE).await?;
        Self::validate_attributes("CreateQueue", &spec.attributes)?;

        let mut state = self.state();
        if let Some(existing) = state.queues.get(&spec.name) {
            let differs = spec
                .attributes
                .iter()
                .any(|(key, value)| existing.attributes.get(key) != Some(value));
            if differs {
                return Err(QueueServiceError::AlreadyExists {
                    name: spec.name.clone(),
                });
            }
            return Ok(self.queue_url(&spec.name));
        }

        let mut attributes: BTreeMap<String, String> = DEFAULT_ATTRIBUTES
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        attributes.extend(spec.attributes.clone());
        attributes.insert(QUEUE_ARN_ATTRIBUTE.to_string(), self.queue_arn(&spec.name));

        state.queues.insert(
            spec.name.clone(),
            StoredQueue {
                attributes,
                tags: spec.tags.clone(),
            },
        );
        Ok(self.queue_url(&spec.name))
    }

    async fn get_attributes(
        &self,
        queue_url: &str,
    ) -> QueueServiceResult<BTreeMap<String, String>> {
        self.begin(OP_GET_ATTRIBUTES).await?;
        let name = Self::name_for(queue_url)?;
        self.state()
            .queues
            .get(&name)
            .map(|q| q.attributes.clone())
            .ok_or(QueueServiceError::NotFound {
                queue: queue_url.to_string(),
            })
    }

    async fn set_attributes(
        &self,
        queue_url: &str,
        attributes: &BTreeMap<String, String>,
    ) -> QueueServiceResult<()> {
        self.begin(OP_SET_ATTRIBUTES).await?;
        Self::validate_attributes("SetQueueAttributes", attributes)?;
        if attributes.contains_key("FifoQueue") {
            return Err(QueueServiceError::InvalidParameter {
                operation: "SetQueueAttributes".to_string(),
                message: "FifoQueue can only be set at creation".to_string(),
            });
        }
        let name = Self::name_for(queue_url)?;
        let mut state = self.state();
        let queue = state
            .queues
            .get_mut(&name)
            .ok_or(QueueServiceError::NotFound {
                queue: queue_url.to_string(),
            })?;
        queue.attributes.extend(attributes.clone());
        Ok(())
    }

    async fn delete(&self, queue_url: &str) -> QueueServiceResult<()> {
        self.begin(OP_DELETE).await?;
        if let Some(name) = queue_name_from_url(queue_url) {
            self.state().queues.remove(name);
        }
        Ok(())
    }

    async fn lookup_url_by_name(&self, name: &str) -> QueueServiceResult<String> {
        self.begin(OP_LOOKUP).await?;
        if self.state().queues.contains_key(name) {
            Ok(self.queue_url(name))
        } else {
            Err(QueueServiceError::NotFound {
                queue: name.to_string(),
            })
        }
    }

    async fn list_tags(&self, queue_url: &str) -> QueueServiceResult<BTreeMap<String, String>> {
        self.begin(OP_LIST_TAGS).await?;
        let name = Self::name_for(queue_url)?;
        self.state()
            .queues
            .get(&name)
            .map(|q| q.tags.clone())
            .ok_or(QueueServiceError::NotFound {
                queue: queue_url.to_string(),
            })
    }

    async fn tag(
        &self,
        queue_url: &str,
        tags: &BTreeMap<String, String>,
    ) -> QueueServiceResult<()> {
        self.begin(OP_TAG).await?;
        let name = Self::name_for(queue_url)?;
        let mut state = self.state();
        let queue = state
            .queues
            .get_mut(&name)
            .ok_or(QueueServiceError::NotFound {
                queue: queue_url.to_string(),
            })?;
        queue.tags.extend(tags.clone());
        Ok(())
    }

    async fn untag(&self, queue_url: &str, keys: &[String]) -> QueueServiceResult<()> {
        self.begin(OP_UNTAG).await?;
        let name = Self::name_for(queue_url)?;
        let mut state = self.state();
        let queue = state
            .queues
            .get_mut(&name)
            .ok_or(QueueServiceError::NotFound {
                queue: queue_url.to_string(),
            })?;
        for key in keys {
            queue.tags.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
