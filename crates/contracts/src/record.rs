//! OutboundRecord - RecordBuilder output
//!
//! Broker-ready record and the fields it is assembled from.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Payload;

/// Fields resolved from a message before the record is built
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFields {
    /// Destination topic (never empty)
    pub topic: String,
    /// Explicit partition; `None` lets the broker client assign one
    pub partition: Option<i32>,
    /// Record key
    pub key: Option<Value>,
    /// Record timestamp (epoch millis)
    pub timestamp: Option<i64>,
}

/// A single broker header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub key: String,
    pub value: Bytes,
}

/// Ordered broker header set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeaders(Vec<RecordHeader>);

impl RecordHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.0.push(RecordHeader {
            key: key.into(),
            value: value.into(),
        });
    }

    /// First header value with the given key
    pub fn get(&self, key: &str) -> Option<&Bytes> {
        self.0.iter().find(|h| h.key == key).map(|h| &h.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordHeader> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Record submitted to the broker
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRecord {
    pub topic: String,
    pub partition: Option<i32>,
    pub timestamp: Option<i64>,
    pub key: Option<Value>,
    /// `None` for tombstones
    pub payload: Option<Payload>,
    pub headers: RecordHeaders,
}

impl OutboundRecord {
    /// True when the record carries no payload
    pub fn is_tombstone(&self) -> bool {
        self.payload.is_none()
    }

    /// Wire encoding of the key
    ///
    /// Strings are sent as raw UTF-8, everything else as JSON.
    pub fn key_bytes(&self) -> Option<Bytes> {
        self.key.as_ref().map(|key| match key {
            Value::String(s) => Bytes::copy_from_slice(s.as_bytes()),
            other => Bytes::from(other.to_string().into_bytes()),
        })
    }

    /// Wire encoding of the payload
    pub fn payload_bytes(&self) -> Option<Bytes> {
        self.payload.as_ref().and_then(Payload::to_bytes)
    }
}

/// Broker-reported result of a successful publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}
