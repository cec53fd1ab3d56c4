// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired and observed queue state.
//!
//! [`DesiredQueueSpec`] is the normalized, validated form of a `Queue` spec. It is derived
//! fresh on every reconciliation and never written back. [`ObservedQueueState`] is what the
//! operator last learned about the remote queue, read from and written to `status`.
//!
//! The diff helpers compute the minimal set of remote changes needed to move the observed
//! state to the desired one.

use crate::constants::{FIFO_SUFFIX, MAX_QUEUE_NAME_LEN};
use crate::crd::{AckResourceMetadata, Queue, QueueStatus};
use crate::errors::SpecError;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Attributes that take a non-negative integer.
const NUMERIC_ATTRIBUTES: &[&str] = &[
    "DelaySeconds",
    "MaximumMessageSize",
    "MessageRetentionPeriod",
    "ReceiveMessageWaitTimeSeconds",
    "VisibilityTimeout",
    "KmsDataKeyReusePeriodSeconds",
];

/// Attributes that take `true` or `false`.
const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "FifoQueue",
    "ContentBasedDeduplication",
    "SqsManagedSseEnabled",
];

/// Attributes holding a JSON document. SQS may reformat these, so they compare by value.
const JSON_ATTRIBUTES: &[&str] = &["Policy", "RedrivePolicy", "RedriveAllowPolicy"];

/// Free-form string attributes.
const STRING_ATTRIBUTES: &[&str] = &["KmsMasterKeyId", "DeduplicationScope", "FifoThroughputLimit"];

/// Attributes SQS only accepts at creation time.
const IMMUTABLE_ATTRIBUTES: &[&str] = &["FifoQueue"];

/// Attribute carrying the queue ARN in `GetQueueAttributes` responses.
pub const QUEUE_ARN_ATTRIBUTE: &str = "QueueArn";

/// Normalized desired state of a queue, derived from a `Queue` spec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesiredQueueSpec {
    /// SQS queue name.
    pub name: String,
    /// Settable queue attributes, with booleans lowercased.
    pub attributes: BTreeMap<String, String>,
    /// Queue tags.
    pub tags: BTreeMap<String, String>,
    /// `metadata.generation` the spec was read at.
    pub generation: i64,
}

impl DesiredQueueSpec {
    /// Load and validate the desired state of `queue`.
    ///
    /// An empty `spec.name` falls back to `metadata.name`. A `.fifo` name implies
    /// `FifoQueue=true`.
    ///
    /// # Errors
    ///
    /// Returns a [`SpecError`] if the name is invalid, an attribute is unknown or has an
    /// unparseable value, or `FifoQueue` disagrees with the name suffix.
    pub fn from_queue(queue: &Queue) -> Result<Self, SpecError> {
        let name = if queue.spec.name.trim().is_empty() {
            queue.name_any()
        } else {
            queue.spec.name.trim().to_string()
        };
        validate_queue_name(&name)?;

        let mut attributes = BTreeMap::new();
        for (key, value) in &queue.spec.attributes {
            let key = key.trim();
            let value = normalize_attribute(key, value.trim())?;
            attributes.insert(key.to_string(), value);
        }

        let fifo_name = name.ends_with(FIFO_SUFFIX);
        match attributes.get("FifoQueue").map(String::as_str) {
            Some("true") if !fifo_name => {
                return Err(SpecError::InvalidName {
                    name,
                    reason: format!("FIFO queue names must end with '{FIFO_SUFFIX}'"),
                });
            }
            Some("false") if fifo_name => {
                return Err(SpecError::InvalidAttributeValue {
                    attribute: "FifoQueue".to_string(),
                    value: "false".to_string(),
                    reason: format!("queue names ending with '{FIFO_SUFFIX}' are FIFO queues"),
                });
            }
            None if fifo_name => {
                attributes.insert("FifoQueue".to_string(), "true".to_string());
            }
            _ => {}
        }

        Ok(Self {
            name,
            attributes,
            tags: queue.spec.tags.clone(),
            generation: queue.metadata.generation.unwrap_or_default(),
        })
    }

    /// Whether this is a FIFO queue.
    #[must_use]
    pub fn is_fifo(&self) -> bool {
        self.attributes.get("FifoQueue").is_some_and(|v| v == "true")
    }
}

/// What the operator last observed about the remote queue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObservedQueueState {
    /// Queue URL, empty until creation succeeds.
    pub queue_url: String,
    /// Last-known remote attributes for the keys the spec manages.
    pub attributes: BTreeMap<String, String>,
    /// Generation of the last successful sync.
    pub last_synced_generation: Option<i64>,
    /// Whether the queue at `queue_url` is known to exist.
    pub exists: bool,
}

impl ObservedQueueState {
    /// Read observed state from a `Queue` status.
    ///
    /// `exists` is only trusted when a URL was recorded alongside it.
    #[must_use]
    pub fn from_status(status: Option<&QueueStatus>) -> Self {
        let Some(status) = status else {
            return Self::default();
        };
        let queue_url = status.queue_url.clone().unwrap_or_default();
        Self {
            exists: status.exists && !queue_url.is_empty(),
            queue_url,
            attributes: status.observed_attributes.clone(),
            last_synced_generation: status.last_synced_generation,
        }
    }

    /// Whether the last successful sync covered `generation`.
    #[must_use]
    pub fn is_synced_at(&self, generation: i64) -> bool {
        self.last_synced_generation.is_some_and(|g| g >= generation)
    }
}

/// Check a queue name against SQS naming rules.
///
/// # Errors
///
/// Returns [`SpecError::InvalidName`] for empty, overlong, or malformed names.
pub fn validate_queue_name(name: &str) -> Result<(), SpecError> {
    let invalid = |reason: &str| SpecError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if name.len() > MAX_QUEUE_NAME_LEN {
        return Err(invalid("name must be at most 80 characters"));
    }

    let base = name.strip_suffix(FIFO_SUFFIX).unwrap_or(name);
    if base.is_empty() {
        return Err(invalid("name must not be only the FIFO suffix"));
    }
    if !base
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(invalid(
            "only alphanumeric characters, hyphens and underscores are allowed",
        ));
    }

    Ok(())
}

fn normalize_attribute(key: &str, value: &str) -> Result<String, SpecError> {
    let invalid = |reason: &str| SpecError::InvalidAttributeValue {
        attribute: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if NUMERIC_ATTRIBUTES.contains(&key) {
        value
            .parse::<u64>()
            .map(|n| n.to_string())
            .map_err(|_| invalid("expected a non-negative integer"))
    } else if BOOLEAN_ATTRIBUTES.contains(&key) {
        match value.to_ascii_lowercase().as_str() {
            "true" => Ok("true".to_string()),
            "false" => Ok("false".to_string()),
            _ => Err(invalid("expected true or false")),
        }
    } else if JSON_ATTRIBUTES.contains(&key) {
        serde_json::from_str::<serde_json::Value>(value)
            .map(|_| value.to_string())
            .map_err(|_| invalid("expected a JSON document"))
    } else if STRING_ATTRIBUTES.contains(&key) {
        Ok(value.to_string())
    } else {
        Err(SpecError::UnknownAttribute(key.to_string()))
    }
}

/// Compare two attribute values, treating JSON documents by value.
#[must_use]
pub fn attribute_values_equal(key: &str, left: &str, right: &str) -> bool {
    if left == right {
        return true;
    }
    if JSON_ATTRIBUTES.contains(&key) {
        let parse = |s: &str| serde_json::from_str::<serde_json::Value>(s).ok();
        return matches!((parse(left), parse(right)), (Some(l), Some(r)) if l == r);
    }
    if BOOLEAN_ATTRIBUTES.contains(&key) {
        return left.eq_ignore_ascii_case(right);
    }
    false
}

/// Desired attributes whose value in `actual` is missing or different.
///
/// Keys present in `actual` but not in `desired` are left alone: SQS has no "unset",
/// and unmanaged attributes keep their service defaults.
#[must_use]
pub fn diff_attributes(
    desired: &BTreeMap<String, String>,
    actual: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    desired
        .iter()
        .filter(|(key, value)| {
            actual
                .get(*key)
                .is_none_or(|current| !attribute_values_equal(key, value, current))
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Restrict remote attributes to the keys the spec manages.
#[must_use]
pub fn managed_attributes(
    desired: &BTreeMap<String, String>,
    remote: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    remote
        .iter()
        .filter(|(key, _)| desired.contains_key(*key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Reject changes SQS cannot apply to an existing queue.
///
/// # Errors
///
/// Returns [`SpecError::NameImmutable`] if `queue_url` names a different queue, or
/// [`SpecError::AttributeImmutable`] if `changed` touches a creation-only attribute.
pub fn check_immutable(
    desired: &DesiredQueueSpec,
    queue_url: &str,
    changed: &BTreeMap<String, String>,
) -> Result<(), SpecError> {
    if let Some(existing) = queue_name_from_url(queue_url) {
        if existing != desired.name {
            return Err(SpecError::NameImmutable {
                existing: existing.to_string(),
                requested: desired.name.clone(),
            });
        }
    }

    if let Some(attribute) = IMMUTABLE_ATTRIBUTES
        .iter()
        .find(|attribute| changed.contains_key(**attribute))
    {
        return Err(SpecError::AttributeImmutable {
            attribute: (*attribute).to_string(),
        });
    }

    Ok(())
}

/// Queue name embedded in a queue URL (its last path segment).
#[must_use]
pub fn queue_name_from_url(queue_url: &str) -> Option<&str> {
    queue_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
}

/// Tag changes needed to make `actual` equal `desired`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagDiff {
    /// Tags to add or overwrite.
    pub to_set: BTreeMap<String, String>,
    /// Tag keys to remove.
    pub to_remove: Vec<String>,
}

impl TagDiff {
    /// Whether no tag calls are needed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_set.is_empty() && self.to_remove.is_empty()
    }
}

/// Compute the tag changes that make `actual` match `desired`. Desired tags are authoritative.
#[must_use]
pub fn diff_tags(
    desired: &BTreeMap<String, String>,
    actual: &BTreeMap<String, String>,
) -> TagDiff {
    TagDiff {
        to_set: desired
            .iter()
            .filter(|(key, value)| actual.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        to_remove: actual
            .keys()
            .filter(|key| !desired.contains_key(*key))
            .cloned()
            .collect(),
    }
}

/// Build ACK resource metadata from remote attributes.
///
/// The owner account is the fifth field of the ARN (`arn:aws:sqs:<region>:<account>:<name>`).
#[must_use]
pub fn resource_metadata(remote: &BTreeMap<String, String>) -> Option<AckResourceMetadata> {
    let arn = remote.get(QUEUE_ARN_ATTRIBUTE)?;
    let owner_account_id = arn
        .split(':')
        .nth(4)
        .filter(|account| !account.is_empty())
        .map(ToString::to_string);
    Some(AckResourceMetadata {
        arn: Some(arn.clone()),
        owner_account_id,
    })
}

#[cfg(test)]
#[path = "desired_tests.rs"]
mod desired_tests;
