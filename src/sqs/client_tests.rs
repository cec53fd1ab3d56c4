// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for SQS error classification.

#[cfg(test)]
mod tests {
    use crate::errors::QueueServiceError;
    use crate::sqs::client::classify_error_code;
    use crate::status_reasons::{REASON_ACCESS_DENIED, REASON_QUOTA_EXCEEDED};

    #[test]
    fn test_missing_queue_codes_are_not_found() {
        for code in ["AWS.SimpleQueueService.NonExistentQueue", "QueueDoesNotExist"] {
            let err = classify_error_code("GetQueueUrl", "orders", Some(code), None);
            assert_eq!(
                err,
                QueueServiceError::NotFound {
                    queue: "orders".to_string()
                },
                "{code}"
            );
        }
    }

    #[test]
    fn test_existing_queue_codes_are_already_exists() {
        for code in ["QueueAlreadyExists", "QueueNameExists"] {
            let err = classify_error_code("CreateQueue", "orders", Some(code), Some("differs"));
            assert!(
                matches!(err, QueueServiceError::AlreadyExists { ref name } if name == "orders"),
                "{code}"
            );
        }
    }

    #[test]
    fn test_throttling_is_transient() {
        for code in ["RequestThrottled", "ThrottlingException"] {
            let err = classify_error_code("CreateQueue", "orders", Some(code), Some("slow down"));
            assert!(matches!(err, QueueServiceError::Throttled { .. }), "{code}");
            assert!(err.is_transient());
        }
    }

    #[test]
    fn test_invalid_parameters_are_terminal() {
        for code in [
            "InvalidAttributeName",
            "InvalidAttributeValue",
            "InvalidParameterValue",
            "AWS.SimpleQueueService.UnsupportedOperation",
        ] {
            let err = classify_error_code(
                "SetQueueAttributes",
                "https://sqs.us-east-1.amazonaws.com/1/orders",
                Some(code),
                Some("VisibilityTimeout must be at most 43200"),
            );
            assert!(
                matches!(
                    err,
                    QueueServiceError::InvalidParameter { ref message, .. }
                        if message == "VisibilityTimeout must be at most 43200"
                ),
                "{code}"
            );
            assert!(!err.is_transient());
        }
    }

    #[test]
    fn test_over_limit_is_terminal() {
        for code in ["OverLimit", "AWS.SimpleQueueService.OverLimit"] {
            let err =
                classify_error_code("CreateQueue", "orders", Some(code), Some("too many queues"));
            assert!(matches!(err, QueueServiceError::QuotaExceeded { .. }), "{code}");
            assert!(!err.is_transient());
            assert_eq!(err.status_reason(), REASON_QUOTA_EXCEEDED);
        }
    }

    #[test]
    fn test_access_denied_is_terminal() {
        for code in [
            "AccessDenied",
            "AccessDeniedException",
            "KmsAccessDenied",
            "KmsNotFound",
            "InvalidSecurity",
        ] {
            let err = classify_error_code(
                "SetQueueAttributes",
                "https://sqs.us-east-1.amazonaws.com/1/orders",
                Some(code),
                Some("not authorized"),
            );
            assert!(matches!(err, QueueServiceError::AccessDenied { .. }), "{code}");
            assert!(!err.is_transient());
            assert_eq!(err.status_reason(), REASON_ACCESS_DENIED);
        }
    }

    #[test]
    fn test_unknown_codes_are_unavailable() {
        let err = classify_error_code(
            "CreateQueue",
            "orders",
            Some("AWS.SimpleQueueService.QueueDeletedRecently"),
            Some("wait 60 seconds"),
        );
        assert!(matches!(err, QueueServiceError::Unavailable { .. }));
        assert!(err.is_transient());

        let err = classify_error_code("CreateQueue", "orders", None, None);
        assert!(err.is_transient());
    }
}
