// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `crd.rs`

#[cfg(test)]
mod tests {
    use crate::constants::{API_GROUP, API_GROUP_VERSION, API_VERSION, KIND_QUEUE, QUEUE_PLURAL};
    use crate::crd::{AckResourceMetadata, Queue, QueueSpec, QueueStatus};
    use kube::{CustomResourceExt, Resource};
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_queue_crd_identity() {
        assert_eq!(Queue::group(&()), API_GROUP);
        assert_eq!(Queue::version(&()), API_VERSION);
        assert_eq!(Queue::kind(&()), KIND_QUEUE);
        assert_eq!(Queue::plural(&()), QUEUE_PLURAL);
        assert_eq!(Queue::api_version(&()), API_GROUP_VERSION);
    }

    #[test]
    fn test_queue_crd_is_namespaced_with_status() {
        let crd = Queue::crd();
        assert_eq!(crd.spec.scope, "Namespaced");

        let version = crd.spec.versions.first().unwrap();
        assert!(
            version
                .subresources
                .as_ref()
                .and_then(|s| s.status.as_ref())
                .is_some(),
            "Queue must expose a status subresource"
        );
    }

    #[test]
    fn test_spec_deserializes_with_defaults() {
        let spec: QueueSpec = serde_json::from_value(json!({})).unwrap();
        assert!(spec.name.is_empty());
        assert!(spec.attributes.is_empty());
        assert!(spec.tags.is_empty());
    }

    #[test]
    fn test_spec_deserializes_from_manifest() {
        let spec: QueueSpec = serde_json::from_value(json!({
            "name": "sqs-queue-abc",
            "attributes": { "VisibilityTimeout": "30" },
            "tags": { "team": "payments" }
        }))
        .unwrap();

        assert_eq!(spec.name, "sqs-queue-abc");
        assert_eq!(spec.attributes.get("VisibilityTimeout").unwrap(), "30");
        assert_eq!(spec.tags.get("team").unwrap(), "payments");
    }

    #[test]
    fn test_status_field_names() {
        let status = QueueStatus {
            queue_url: Some("https://sqs.us-east-1.amazonaws.com/1/q".to_string()),
            ack_resource_metadata: Some(AckResourceMetadata {
                arn: Some("arn:aws:sqs:us-east-1:1:q".to_string()),
                owner_account_id: Some("1".to_string()),
            }),
            observed_attributes: BTreeMap::from([("DelaySeconds".to_string(), "0".to_string())]),
            last_synced_generation: Some(2),
            exists: true,
            ..Default::default()
        };

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(
            value["queueURL"],
            json!("https://sqs.us-east-1.amazonaws.com/1/q")
        );
        assert_eq!(value["ackResourceMetadata"]["ownerAccountID"], json!("1"));
        assert_eq!(value["observedAttributes"]["DelaySeconds"], json!("0"));
        assert_eq!(value["lastSyncedGeneration"], json!(2));
        assert_eq!(value["exists"], json!(true));
    }

    #[test]
    fn test_empty_status_serializes_null_url() {
        // A null queueURL lets a merge patch clear a stale URL.
        let value = serde_json::to_value(QueueStatus::default()).unwrap();
        assert!(value["queueURL"].is_null());
        assert!(value.get("queueURL").is_some());
    }
}
