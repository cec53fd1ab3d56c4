// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `desired.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{Queue, QueueSpec, QueueStatus};
    use crate::desired::*;
    use crate::errors::SpecError;
    use std::collections::BTreeMap;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn queue(name: &str, spec_name: &str, attributes: &[(&str, &str)]) -> Queue {
        let mut queue = Queue::new(
            name,
            QueueSpec {
                name: spec_name.to_string(),
                attributes: map(attributes),
                tags: BTreeMap::new(),
            },
        );
        queue.metadata.namespace = Some("default".to_string());
        queue.metadata.generation = Some(3);
        queue
    }

    #[test]
    fn test_from_queue_uses_spec_name() {
        let desired =
            DesiredQueueSpec::from_queue(&queue("obj", "orders", &[("VisibilityTimeout", "30")]))
                .unwrap();
        assert_eq!(desired.name, "orders");
        assert_eq!(desired.generation, 3);
        assert_eq!(desired.attributes, map(&[("VisibilityTimeout", "30")]));
        assert!(!desired.is_fifo());
    }

    #[test]
    fn test_from_queue_defaults_name_to_metadata_name() {
        let desired = DesiredQueueSpec::from_queue(&queue("sqs-queue-abc", "", &[])).unwrap();
        assert_eq!(desired.name, "sqs-queue-abc");
    }

    #[test]
    fn test_from_queue_rejects_unknown_attribute() {
        let err = DesiredQueueSpec::from_queue(&queue("q", "q", &[("Colour", "blue")])).unwrap_err();
        assert_eq!(err, SpecError::UnknownAttribute("Colour".to_string()));
    }

    #[test]
    fn test_from_queue_rejects_non_numeric_value() {
        let err = DesiredQueueSpec::from_queue(&queue("q", "q", &[("DelaySeconds", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            SpecError::InvalidAttributeValue { ref attribute, .. } if attribute == "DelaySeconds"
        ));
    }

    #[test]
    fn test_from_queue_rejects_malformed_policy() {
        let err =
            DesiredQueueSpec::from_queue(&queue("q", "q", &[("Policy", "{not json")])).unwrap_err();
        assert!(matches!(err, SpecError::InvalidAttributeValue { .. }));
    }

    #[test]
    fn test_from_queue_normalizes_booleans() {
        let desired = DesiredQueueSpec::from_queue(&queue(
            "q",
            "q.fifo",
            &[("ContentBasedDeduplication", "TRUE")],
        ))
        .unwrap();
        assert_eq!(
            desired.attributes.get("ContentBasedDeduplication").unwrap(),
            "true"
        );
    }

    #[test]
    fn test_fifo_suffix_implies_fifo_queue() {
        let desired = DesiredQueueSpec::from_queue(&queue("q", "orders.fifo", &[])).unwrap();
        assert!(desired.is_fifo());
        assert_eq!(desired.attributes.get("FifoQueue").unwrap(), "true");
    }

    #[test]
    fn test_fifo_attribute_requires_suffix() {
        let err = DesiredQueueSpec::from_queue(&queue("q", "orders", &[("FifoQueue", "true")]))
            .unwrap_err();
        assert!(matches!(err, SpecError::InvalidName { .. }));

        let err = DesiredQueueSpec::from_queue(&queue(
            "q",
            "orders.fifo",
            &[("FifoQueue", "false")],
        ))
        .unwrap_err();
        assert!(matches!(err, SpecError::InvalidAttributeValue { .. }));
    }

    #[test]
    fn test_validate_queue_name() {
        assert!(validate_queue_name("sqs-queue-abc_1").is_ok());
        assert!(validate_queue_name("orders.fifo").is_ok());
        assert!(validate_queue_name(&"a".repeat(80)).is_ok());

        assert!(validate_queue_name("").is_err());
        assert!(validate_queue_name(".fifo").is_err());
        assert!(validate_queue_name("has space").is_err());
        assert!(validate_queue_name("dots.in.name").is_err());
        assert!(validate_queue_name(&"a".repeat(81)).is_err());
    }

    #[test]
    fn test_observed_state_from_missing_status() {
        let observed = ObservedQueueState::from_status(None);
        assert!(!observed.exists);
        assert!(observed.queue_url.is_empty());
        assert!(!observed.is_synced_at(1));
    }

    #[test]
    fn test_observed_state_requires_url_for_exists() {
        let status = QueueStatus {
            exists: true,
            ..Default::default()
        };
        assert!(!ObservedQueueState::from_status(Some(&status)).exists);

        let status = QueueStatus {
            queue_url: Some("https://sqs.us-east-1.amazonaws.com/000000000000/q".to_string()),
            exists: true,
            last_synced_generation: Some(4),
            ..Default::default()
        };
        let observed = ObservedQueueState::from_status(Some(&status));
        assert!(observed.exists);
        assert!(observed.is_synced_at(4));
        assert!(observed.is_synced_at(3));
        assert!(!observed.is_synced_at(5));
    }

    #[test]
    fn test_diff_attributes_only_changed_keys() {
        let desired = map(&[("VisibilityTimeout", "60"), ("DelaySeconds", "0")]);
        let actual = map(&[
            ("VisibilityTimeout", "30"),
            ("DelaySeconds", "0"),
            ("MaximumMessageSize", "262144"),
        ]);

        let changed = diff_attributes(&desired, &actual);
        assert_eq!(changed, map(&[("VisibilityTimeout", "60")]));
    }

    #[test]
    fn test_diff_attributes_includes_missing_keys() {
        let desired = map(&[("DelaySeconds", "5")]);
        let changed = diff_attributes(&desired, &BTreeMap::new());
        assert_eq!(changed, desired);
    }

    #[test]
    fn test_diff_attributes_compares_policies_by_value() {
        let desired = map(&[(
            "RedrivePolicy",
            r#"{"deadLetterTargetArn":"arn:aws:sqs:us-east-1:1:dlq","maxReceiveCount":5}"#,
        )]);
        let actual = map(&[(
            "RedrivePolicy",
            r#"{ "maxReceiveCount": 5, "deadLetterTargetArn": "arn:aws:sqs:us-east-1:1:dlq" }"#,
        )]);
        assert!(diff_attributes(&desired, &actual).is_empty());
    }

    #[test]
    fn test_managed_attributes_filters_to_desired_keys() {
        let desired = map(&[("DelaySeconds", "0")]);
        let remote = map(&[
            ("DelaySeconds", "0"),
            ("QueueArn", "arn:aws:sqs:us-east-1:1:q"),
            ("ApproximateNumberOfMessages", "7"),
        ]);
        assert_eq!(managed_attributes(&desired, &remote), desired);
    }

    #[test]
    fn test_check_immutable_name() {
        let desired = DesiredQueueSpec::from_queue(&queue("q", "renamed", &[])).unwrap();
        let err = check_immutable(
            &desired,
            "https://sqs.us-east-1.amazonaws.com/1/original",
            &BTreeMap::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SpecError::NameImmutable {
                existing: "original".to_string(),
                requested: "renamed".to_string(),
            }
        );

        assert!(check_immutable(
            &desired,
            "https://sqs.us-east-1.amazonaws.com/1/renamed",
            &BTreeMap::new()
        )
        .is_ok());
    }

    #[test]
    fn test_check_immutable_fifo_attribute() {
        let desired = DesiredQueueSpec::from_queue(&queue("q", "q.fifo", &[])).unwrap();
        let changed = map(&[("FifoQueue", "true")]);
        let err = check_immutable(&desired, "https://sqs.us-east-1.amazonaws.com/1/q.fifo", &changed)
            .unwrap_err();
        assert!(matches!(err, SpecError::AttributeImmutable { .. }));
    }

    #[test]
    fn test_queue_name_from_url() {
        assert_eq!(
            queue_name_from_url("https://sqs.us-east-1.amazonaws.com/000000000000/orders"),
            Some("orders")
        );
        assert_eq!(
            queue_name_from_url("http://localhost:4566/000000000000/orders.fifo/"),
            Some("orders.fifo")
        );
        assert_eq!(queue_name_from_url(""), None);
    }

    #[test]
    fn test_diff_tags() {
        let desired = map(&[("team", "payments"), ("env", "prod")]);
        let actual = map(&[("team", "billing"), ("stale", "yes"), ("env", "prod")]);

        let diff = diff_tags(&desired, &actual);
        assert_eq!(diff.to_set, map(&[("team", "payments")]));
        assert_eq!(diff.to_remove, vec!["stale".to_string()]);
        assert!(!diff.is_empty());

        assert!(diff_tags(&desired, &desired).is_empty());
    }

    #[test]
    fn test_resource_metadata_from_arn() {
        let remote = map(&[(QUEUE_ARN_ATTRIBUTE, "arn:aws:sqs:us-west-2:123456789012:orders")]);
        let metadata = resource_metadata(&remote).unwrap();
        assert_eq!(
            metadata.arn.as_deref(),
            Some("arn:aws:sqs:us-west-2:123456789012:orders")
        );
        assert_eq!(metadata.owner_account_id.as_deref(), Some("123456789012"));

        assert!(resource_metadata(&BTreeMap::new()).is_none());
    }
}
