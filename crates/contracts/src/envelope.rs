//! Envelope - OutcomeRouter output
//!
//! What sinks receive: the enriched original message on success, or an
//! error message describing a failed publish.

use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::{Message, Metadata, OutboundRecord, PublishFailure};

/// A publish that the broker reported as failed
#[derive(Debug, Clone, Error)]
#[error("failed to publish to topic '{}': {cause}", .record.topic)]
pub struct SendFailure {
    message: Arc<Message>,
    record: Arc<OutboundRecord>,
    #[source]
    cause: PublishFailure,
}

impl SendFailure {
    pub fn new(message: Arc<Message>, record: Arc<OutboundRecord>, cause: PublishFailure) -> Self {
        Self {
            message,
            record,
            cause,
        }
    }

    /// Message whose publish failed
    pub fn message(&self) -> &Arc<Message> {
        &self.message
    }

    /// Record that was submitted
    pub fn record(&self) -> &Arc<OutboundRecord> {
        &self.record
    }

    /// Broker-reported cause
    pub fn cause(&self) -> &PublishFailure {
        &self.cause
    }
}

/// Error message delivered to the failure sink
///
/// Built once by an `ErrorMessageStrategy` and never mutated.
#[derive(Debug, Clone)]
pub struct ErrorMessage {
    payload: SendFailure,
    original_message: Option<Arc<Message>>,
    metadata: Metadata,
}

impl ErrorMessage {
    pub fn new(
        payload: SendFailure,
        original_message: Option<Arc<Message>>,
        metadata: Metadata,
    ) -> Self {
        Self {
            payload,
            original_message,
            metadata,
        }
    }

    pub fn payload(&self) -> &SendFailure {
        &self.payload
    }

    pub fn original_message(&self) -> Option<&Arc<Message>> {
        self.original_message.as_ref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// Item delivered to a sink
#[derive(Debug, Clone)]
pub enum Envelope {
    /// Success channel: original message enriched with record metadata
    Message(Arc<Message>),
    /// Failure channel
    Error(Arc<ErrorMessage>),
}

impl Envelope {
    /// Short kind label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Message(_) => "message",
            Envelope::Error(_) => "error",
        }
    }

    /// JSON rendering used by file and log sinks
    pub fn to_json(&self) -> Value {
        match self {
            Envelope::Message(message) => json!({
                "kind": self.kind(),
                "message": &**message,
            }),
            Envelope::Error(error) => {
                let failure = error.payload();
                let record = failure.record();
                json!({
                    "kind": self.kind(),
                    "error": failure.to_string(),
                    "cause": failure.cause().to_string(),
                    "record": {
                        "topic": record.topic,
                        "partition": record.partition,
                        "timestamp": record.timestamp,
                        "key": record.key,
                        "tombstone": record.is_tombstone(),
                        "headers": record.headers.len(),
                    },
                    "metadata": error.metadata(),
                    "original_message": error.original_message().map(|m| &**m),
                })
            }
        }
    }
}
