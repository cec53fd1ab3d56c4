// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`QueueService`] backed by Amazon SQS through `aws-sdk-sqs`.

use super::{QueueService, QueueServiceResult};
use crate::desired::DesiredQueueSpec;
use crate::errors::QueueServiceError;
use async_trait::async_trait;
use aws_sdk_sqs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sqs::types::QueueAttributeName;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use tracing::{debug, info};

const OP_CREATE_QUEUE: &str = "CreateQueue";
const OP_GET_QUEUE_ATTRIBUTES: &str = "GetQueueAttributes";
const OP_SET_QUEUE_ATTRIBUTES: &str = "SetQueueAttributes";
const OP_DELETE_QUEUE: &str = "DeleteQueue";
const OP_GET_QUEUE_URL: &str = "GetQueueUrl";
const OP_LIST_QUEUE_TAGS: &str = "ListQueueTags";
const OP_TAG_QUEUE: &str = "TagQueue";
const OP_UNTAG_QUEUE: &str = "UntagQueue";

/// Queue service that talks to SQS.
///
/// Calls carry no deadline of their own; wrap the service in a
/// [`DeadlineQueueService`](super::DeadlineQueueService).
#[derive(Clone, Debug)]
pub struct SqsQueueService {
    client: aws_sdk_sqs::Client,
}

impl SqsQueueService {
    /// Wrap an existing SDK client.
    #[must_use]
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }

    /// Build a client from the standard AWS environment (credentials chain, profile, region).
    ///
    /// # Arguments
    ///
    /// * `region` - Overrides the region from the environment
    /// * `endpoint_url` - Overrides the SQS endpoint, e.g. a localstack URL
    pub async fn from_env(region: Option<String>, endpoint_url: Option<String>) -> Self {
        let mut loader = aws_config::from_env();
        if let Some(region) = region {
            loader = loader.region(aws_types::region::Region::new(region));
        }
        if let Some(endpoint_url) = endpoint_url {
            info!("Using SQS endpoint URL {endpoint_url}");
            loader = loader.endpoint_url(endpoint_url);
        }
        let config = loader.load().await;
        Self::new(aws_sdk_sqs::Client::new(&config))
    }
}

/// Map an SQS error code onto the adapter's error taxonomy.
///
/// Codes are matched by substring so both the query protocol form
/// (`AWS.SimpleQueueService.NonExistentQueue`) and the JSON protocol form
/// (`QueueDoesNotExist`) are recognized. Quota and authorization failures are terminal.
/// Unrecognized codes are treated as transient.
///
/// # Arguments
///
/// * `operation` - Operation that failed
/// * `target` - Queue name or URL the call addressed
/// * `code` - Service error code, if any
/// * `message` - Service error message, if any
#[must_use]
pub fn classify_error_code(
    operation: &str,
    target: &str,
    code: Option<&str>,
    message: Option<&str>,
) -> QueueServiceError {
    let code = code.unwrap_or_default();
    let message = message.unwrap_or(code).to_string();

    if code.contains("NonExistentQueue") || code.contains("QueueDoesNotExist") {
        QueueServiceError::NotFound {
            queue: target.to_string(),
        }
    } else if code.contains("QueueAlreadyExists") || code.contains("QueueNameExists") {
        QueueServiceError::AlreadyExists {
            name: target.to_string(),
        }
    } else if code.contains("Throttl") || code.contains("RequestThrottled") {
        QueueServiceError::Throttled {
            operation: operation.to_string(),
            message,
        }
    } else if code.contains("OverLimit") {
        QueueServiceError::QuotaExceeded {
            operation: operation.to_string(),
            message,
        }
    } else if code.contains("AccessDenied")
        || code.contains("KmsAccessDenied")
        || code.contains("KmsDisabled")
        || code.contains("KmsInvalidKeyUsage")
        || code.contains("KmsInvalidState")
        || code.contains("KmsNotFound")
        || code.contains("InvalidSecurity")
    {
        QueueServiceError::AccessDenied {
            operation: operation.to_string(),
            message,
        }
    } else if code.contains("InvalidAttributeName")
        || code.contains("InvalidAttributeValue")
        || code.contains("InvalidParameterValue")
        || code.contains("InvalidAddress")
        || code.contains("UnsupportedOperation")
    {
        QueueServiceError::InvalidParameter {
            operation: operation.to_string(),
            message,
        }
    } else {
        QueueServiceError::unavailable(operation, format!("{code}: {message}"))
    }
}

/// Classify an SDK error. Anything that never got a service answer is transient.
fn classify_sdk_error<E, R>(
    operation: &str,
    target: &str,
    err: SdkError<E, R>,
) -> QueueServiceError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: Debug + 'static,
{
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            QueueServiceError::unavailable(operation, DisplayErrorContext(&err).to_string())
        }
        SdkError::ServiceError(_) => {
            classify_error_code(operation, target, err.code(), err.message())
        }
        _ => QueueServiceError::unavailable(operation, DisplayErrorContext(&err).to_string()),
    }
}

fn to_sdk_attributes(
    attributes: &BTreeMap<String, String>,
) -> HashMap<QueueAttributeName, String> {
    attributes
        .iter()
        .map(|(key, value)| (QueueAttributeName::from(key.as_str()), value.clone()))
        .collect()
}

#[async_trait]
impl QueueService for SqsQueueService {
    async fn create(&self, spec: &DesiredQueueSpec) -> QueueServiceResult<String> {
        debug!(queue = %spec.name, "Creating SQS queue");
        let output = self
            .client
            .create_queue()
            .queue_name(&spec.name)
            .set_attributes(Some(to_sdk_attributes(&spec.attributes)))
            .set_tags((!spec.tags.is_empty()).then(|| spec.tags.clone().into_iter().collect()))
            .send()
            .await
            .map_err(|e| classify_sdk_error(OP_CREATE_QUEUE, &spec.name, e))?;
        output.queue_url.ok_or_else(|| {
            QueueServiceError::unavailable(OP_CREATE_QUEUE, "response carried no queue URL")
        })
    }

    async fn get_attributes(
        &self,
        queue_url: &str,
    ) -> QueueServiceResult<BTreeMap<String, String>> {
        let output = self
            .client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::All)
            .send()
            .await
            .map_err(|e| classify_sdk_error(OP_GET_QUEUE_ATTRIBUTES, queue_url, e))?;
        Ok(output
            .attributes
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key.as_str().to_string(), value))
            .collect())
    }

    async fn set_attributes(
        &self,
        queue_url: &str,
        attributes: &BTreeMap<String, String>,
    ) -> QueueServiceResult<()> {
        if attributes.is_empty() {
            return Ok(());
        }
        self.client
            .set_queue_attributes()
            .queue_url(queue_url)
            .set_attributes(Some(to_sdk_attributes(attributes)))
            .send()
            .await
            .map_err(|e| classify_sdk_error(OP_SET_QUEUE_ATTRIBUTES, queue_url, e))?;
        Ok(())
    }

    async fn delete(&self, queue_url: &str) -> QueueServiceResult<()> {
        let result = self
            .client
            .delete_queue()
            .queue_url(queue_url)
            .send()
            .await
            .map_err(|e| classify_sdk_error(OP_DELETE_QUEUE, queue_url, e));
        match result {
            Ok(_) | Err(QueueServiceError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn lookup_url_by_name(&self, name: &str) -> QueueServiceResult<String> {
        let output = self
            .client
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(OP_GET_QUEUE_URL, name, e))?;
        output.queue_url.ok_or_else(|| QueueServiceError::NotFound {
            queue: name.to_string(),
        })
    }

    async fn list_tags(&self, queue_url: &str) -> QueueServiceResult<BTreeMap<String, String>> {
        let output = self
            .client
            .list_queue_tags()
            .queue_url(queue_url)
            .send()
            .await
            .map_err(|e| classify_sdk_error(OP_LIST_QUEUE_TAGS, queue_url, e))?;
        Ok(output.tags.unwrap_or_default().into_iter().collect())
    }

    async fn tag(
        &self,
        queue_url: &str,
        tags: &BTreeMap<String, String>,
    ) -> QueueServiceResult<()> {
        if tags.is_empty() {
            return Ok(());
        }
        self.client
            .tag_queue()
            .queue_url(queue_url)
            .set_tags(Some(tags.clone().into_iter().collect()))
            .send()
            .await
            .map_err(|e| classify_sdk_error(OP_TAG_QUEUE, queue_url, e))?;
        Ok(())
    }

    async fn untag(&self, queue_url: &str, keys: &[String]) -> QueueServiceResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.client
            .untag_queue()
            .queue_url(queue_url)
            .set_tag_keys(Some(keys.to_vec()))
            .send()
            .await
            .map_err(|e| classify_sdk_error(OP_UNTAG_QUEUE, queue_url, e))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
