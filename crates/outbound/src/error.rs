//! Outbound error types

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use contracts::{ContractError, Message, PublishFailure};

/// Field being resolved when an error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Topic,
    Partition,
    Key,
    Timestamp,
    SendTimeout,
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordField::Topic => "topic",
            RecordField::Partition => "partition",
            RecordField::Key => "key",
            RecordField::Timestamp => "timestamp",
            RecordField::SendTimeout => "send_timeout",
        };
        f.write_str(name)
    }
}

/// Outbound handler errors
#[derive(Debug, Error)]
pub enum OutboundError {
    /// Invariant violated before dispatch (e.g. blank topic)
    #[error("precondition failed: {message}")]
    Precondition { message: String },

    /// Rule evaluation or value conversion failed before dispatch
    #[error("failed to resolve {field}: {source}")]
    Resolution {
        field: RecordField,
        #[source]
        source: ContractError,
    },

    /// Broker reported a failure (sync mode)
    #[error("publish to topic '{topic}' failed: {source}")]
    PublishFailed {
        topic: String,
        #[source]
        source: PublishFailure,
    },

    /// Sync wait expired before the broker answered
    #[error("timeout after {timeout_ms}ms waiting for broker acknowledgement")]
    Timeout {
        timeout_ms: u64,
        message: Arc<Message>,
    },

    /// Handler wiring error
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Sink queue closed
    #[error("sink '{name}' is closed")]
    SinkClosed { name: String },

    /// Sink queue stayed full for the whole send timeout
    #[error("sink '{name}' did not accept the envelope within {timeout_ms}ms")]
    SinkTimeout { name: String, timeout_ms: u64 },

    /// Contract error
    #[error("contract error: {0}")]
    Contract(#[from] ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl OutboundError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    pub fn resolution(field: RecordField, source: ContractError) -> Self {
        Self::Resolution { field, source }
    }

    /// Conversion failure for a resolved value
    pub fn conversion(field: RecordField, message: impl Into<String>) -> Self {
        Self::Resolution {
            field,
            source: ContractError::rule_evaluation(field.to_string(), message),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// True for the sync-mode wait timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// True for a broker-reported failure
    pub fn is_publish_failure(&self) -> bool {
        matches!(self, Self::PublishFailed { .. })
    }

    /// True for errors raised before any publish attempt
    pub fn is_rejected_before_dispatch(&self) -> bool {
        matches!(self, Self::Precondition { .. } | Self::Resolution { .. })
    }

    /// Broker-reported cause, if any
    pub fn publish_failure(&self) -> Option<&PublishFailure> {
        match self {
            Self::PublishFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
