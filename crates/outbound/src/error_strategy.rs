//! DefaultErrorMessageStrategy - failure sink payload

use serde_json::Value;
use std::sync::Arc;

use contracts::{metadata_keys, ErrorMessage, ErrorMessageStrategy, Metadata, SendFailure};

/// Wraps the failure together with the original message
///
/// Error metadata carries the destination topic and the failure text so that
/// downstream consumers can route without unpacking the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorMessageStrategy;

impl ErrorMessageStrategy for DefaultErrorMessageStrategy {
    fn build_error_message(&self, failure: SendFailure) -> ErrorMessage {
        let original = Arc::clone(failure.message());

        let mut metadata = Metadata::new();
        metadata.insert(
            metadata_keys::TOPIC.to_string(),
            Value::String(failure.record().topic.clone()),
        );
        metadata.insert(
            metadata_keys::SEND_FAILURE.to_string(),
            Value::String(failure.cause().to_string()),
        );

        ErrorMessage::new(failure, Some(original), metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Message, OutboundRecord, PublishFailure, RecordHeaders};

    #[test]
    fn test_error_message_shape() {
        let message = Arc::new(Message::builder("x").with_topic("orders").build());
        let record = Arc::new(OutboundRecord {
            topic: "orders".into(),
            partition: None,
            timestamp: None,
            key: None,
            payload: None,
            headers: RecordHeaders::new(),
        });
        let failure = SendFailure::new(
            Arc::clone(&message),
            record,
            PublishFailure::Rejected("too large".into()),
        );

        let error = DefaultErrorMessageStrategy.build_error_message(failure);
        assert!(Arc::ptr_eq(error.original_message().unwrap(), &message));
        assert_eq!(error.metadata()[metadata_keys::TOPIC], "orders");
        assert_eq!(
            error.metadata()[metadata_keys::SEND_FAILURE],
            "record rejected: too large"
        );
        assert_eq!(
            error.payload().cause(),
            &PublishFailure::Rejected("too large".into())
        );
    }
}
