//! Message - Handler input
//!
//! Inbound application message: payload plus metadata.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Message metadata (key -> JSON value)
pub type Metadata = BTreeMap<String, Value>;

/// Well-known metadata keys
///
/// Used as fallbacks when no resolution rule is configured, and as the
/// enrichment key on the success path.
pub mod metadata_keys {
    /// Destination topic
    pub const TOPIC: &str = "kafka_topic";
    /// Destination partition
    pub const PARTITION_ID: &str = "kafka_partitionId";
    /// Record key
    pub const MESSAGE_KEY: &str = "kafka_messageKey";
    /// Record timestamp (epoch millis)
    pub const TIMESTAMP: &str = "kafka_timestamp";
    /// Broker-reported record metadata, added on successful publish
    pub const RECORD_METADATA: &str = "kafka_recordMetadata";
    /// Failure description, added to error messages
    pub const SEND_FAILURE: &str = "kafka_sendFailure";
    /// Message id
    pub const ID: &str = "id";
    /// Message creation time
    pub const MESSAGE_TIMESTAMP: &str = "timestamp";
}

/// Message payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// Raw bytes
    Bytes(Bytes),
    /// UTF-8 text
    Text(String),
    /// Structured JSON document
    Json(Value),
    /// Null-payload sentinel; published as a tombstone
    Null,
}

impl Payload {
    /// True for the null-payload sentinel
    pub fn is_null(&self) -> bool {
        matches!(self, Payload::Null)
    }

    /// Encode the payload for the wire
    ///
    /// Returns `None` for the null sentinel.
    pub fn to_bytes(&self) -> Option<Bytes> {
        match self {
            Payload::Bytes(b) => Some(b.clone()),
            Payload::Text(s) => Some(Bytes::copy_from_slice(s.as_bytes())),
            Payload::Json(v) => Some(Bytes::from(v.to_string().into_bytes())),
            Payload::Null => None,
        }
    }

    /// Borrow the JSON document, if this is a JSON payload
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(v) => Some(v),
            _ => None,
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Payload::Bytes(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(value))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Payload::Null,
            other => Payload::Json(other),
        }
    }
}

/// Inbound message
///
/// Immutable once built; use [`MessageBuilder::from_message`] to derive an
/// enriched copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    payload: Payload,
    #[serde(default)]
    metadata: Metadata,
}

impl Message {
    /// Create a message with empty metadata
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            payload: payload.into(),
            metadata: Metadata::new(),
        }
    }

    /// Start building a message
    pub fn builder(payload: impl Into<Payload>) -> MessageBuilder {
        MessageBuilder::new(payload)
    }

    /// Message payload
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Message metadata
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Look up a single metadata value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}

/// Builder for [`Message`]
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    payload: Payload,
    metadata: Metadata,
}

impl MessageBuilder {
    /// Create a builder with the given payload
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            payload: payload.into(),
            metadata: Metadata::new(),
        }
    }

    /// Copy payload and metadata from an existing message
    pub fn from_message(message: &Message) -> Self {
        Self {
            payload: message.payload.clone(),
            metadata: message.metadata.clone(),
        }
    }

    /// Set a metadata entry, replacing any previous value
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merge a whole metadata map
    pub fn with_all_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata.extend(metadata);
        self
    }

    pub fn with_topic(self, topic: impl Into<String>) -> Self {
        let topic: String = topic.into();
        self.with_metadata(metadata_keys::TOPIC, topic)
    }

    pub fn with_partition(self, partition: i32) -> Self {
        self.with_metadata(metadata_keys::PARTITION_ID, partition)
    }

    pub fn with_key(self, key: impl Into<Value>) -> Self {
        self.with_metadata(metadata_keys::MESSAGE_KEY, key)
    }

    pub fn with_timestamp(self, timestamp_ms: i64) -> Self {
        self.with_metadata(metadata_keys::TIMESTAMP, timestamp_ms)
    }

    /// Finish building
    pub fn build(self) -> Message {
        Message {
            payload: self.payload,
            metadata: self.metadata,
        }
    }
}
