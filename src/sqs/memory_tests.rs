// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the in-memory queue service.

#[cfg(test)]
mod tests {
    use crate::desired::DesiredQueueSpec;
    use crate::errors::QueueServiceError;
    use crate::sqs::memory::*;
    use crate::sqs::{with_deadline, QueueService};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn spec(name: &str, attributes: &[(&str, &str)]) -> DesiredQueueSpec {
        DesiredQueueSpec {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            tags: BTreeMap::from([("team".to_string(), "payments".to_string())]),
            generation: 1,
        }
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let service = MemoryQueueService::new("us-east-1");
        let spec = spec("orders", &[("VisibilityTimeout", "60")]);

        let first = service.create(&spec).await.unwrap();
        let second = service.create(&spec).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first,
            "https://sqs.us-east-1.amazonaws.com/000000000000/orders"
        );
        assert_eq!(service.queue_names(), vec!["orders".to_string()]);
    }

    #[tokio::test]
    async fn test_create_with_different_attributes_conflicts() {
        let service = MemoryQueueService::new("us-east-1");
        service
            .create(&spec("orders", &[("VisibilityTimeout", "60")]))
            .await
            .unwrap();

        let err = service
            .create(&spec("orders", &[("VisibilityTimeout", "90")]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            QueueServiceError::AlreadyExists {
                name: "orders".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_create_applies_defaults_and_arn() {
        let service = MemoryQueueService::new("eu-west-1");
        let url = service.create(&spec("orders", &[])).await.unwrap();
        let attributes = service.get_attributes(&url).await.unwrap();

        assert_eq!(attributes.get("VisibilityTimeout").unwrap(), "30");
        assert_eq!(
            attributes.get("QueueArn").unwrap(),
            "arn:aws:sqs:eu-west-1:000000000000:orders"
        );
        assert_eq!(
            service.tags("orders").unwrap().get("team").unwrap(),
            "payments"
        );
    }

    #[tokio::test]
    async fn test_out_of_range_attribute_is_invalid_parameter() {
        let service = MemoryQueueService::new("us-east-1");
        let err = service
            .create(&spec("orders", &[("VisibilityTimeout", "50000")]))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueServiceError::InvalidParameter { .. }));
        assert!(!service.contains("orders"));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let service = MemoryQueueService::new("us-east-1");
        let url = service.create(&spec("orders", &[])).await.unwrap();

        service.delete(&url).await.unwrap();
        service.delete(&url).await.unwrap();

        assert!(!service.contains("orders"));
        assert_eq!(service.call_count(OP_DELETE), 2);
    }

    #[tokio::test]
    async fn test_lookup_distinguishes_not_found() {
        let service = MemoryQueueService::new("us-east-1");
        let err = service.lookup_url_by_name("orders").await.unwrap_err();
        assert!(matches!(err, QueueServiceError::NotFound { .. }));

        let url = service.create(&spec("orders", &[])).await.unwrap();
        assert_eq!(service.lookup_url_by_name("orders").await.unwrap(), url);
    }

    #[tokio::test]
    async fn test_set_attributes_and_drift() {
        let service = MemoryQueueService::new("us-east-1");
        let url = service.create(&spec("orders", &[])).await.unwrap();

        service
            .set_attributes(
                &url,
                &BTreeMap::from([("DelaySeconds".to_string(), "5".to_string())]),
            )
            .await
            .unwrap();
        assert_eq!(service.attributes("orders").unwrap()["DelaySeconds"], "5");

        service.mutate_attribute("orders", "DelaySeconds", "9");
        let attributes = service.get_attributes(&url).await.unwrap();
        assert_eq!(attributes["DelaySeconds"], "9");
    }

    #[tokio::test]
    async fn test_fifo_queue_cannot_be_changed() {
        let service = MemoryQueueService::new("us-east-1");
        let url = service.create(&spec("orders", &[])).await.unwrap();
        let err = service
            .set_attributes(
                &url,
                &BTreeMap::from([("FifoQueue".to_string(), "true".to_string())]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, QueueServiceError::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn test_tag_and_untag() {
        let service = MemoryQueueService::new("us-east-1");
        let url = service.create(&spec("orders", &[])).await.unwrap();

        service
            .tag(
                &url,
                &BTreeMap::from([("env".to_string(), "prod".to_string())]),
            )
            .await
            .unwrap();
        service.untag(&url, &["team".to_string()]).await.unwrap();

        let tags = service.list_tags(&url).await.unwrap();
        assert_eq!(
            tags,
            BTreeMap::from([("env".to_string(), "prod".to_string())])
        );
    }

    #[tokio::test]
    async fn test_operations_on_missing_queue() {
        let service = MemoryQueueService::new("us-east-1");
        let url = service.queue_url("ghost");

        assert!(matches!(
            service.get_attributes(&url).await,
            Err(QueueServiceError::NotFound { .. })
        ));
        assert!(matches!(
            service.list_tags(&url).await,
            Err(QueueServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_injected_faults_fire_once_in_order() {
        let service = MemoryQueueService::new("us-east-1");
        service.inject_fault(OP_CREATE, QueueServiceError::unavailable("CreateQueue", "boom"));
        service.inject_fault(
            OP_CREATE,
            QueueServiceError::Throttled {
                operation: "CreateQueue".to_string(),
                message: "slow".to_string(),
            },
        );

        let spec = spec("orders", &[]);
        assert!(matches!(
            service.create(&spec).await,
            Err(QueueServiceError::Unavailable { .. })
        ));
        assert!(matches!(
            service.create(&spec).await,
            Err(QueueServiceError::Throttled { .. })
        ));
        assert!(service.create(&spec).await.is_ok());
        assert_eq!(service.call_count(OP_CREATE), 3);
        assert_eq!(service.write_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_trips_deadline() {
        let service = MemoryQueueService::new("us-east-1");
        service.set_latency(Some(Duration::from_secs(30)));

        let result = with_deadline(
            Duration::from_secs(10),
            "CreateQueue",
            service.create(&spec("orders", &[])),
        )
        .await;
        assert!(matches!(result, Err(QueueServiceError::Unavailable { .. })));
    }
}
