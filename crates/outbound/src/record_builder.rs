//! RecordBuilder - resolved fields + message to broker record

use std::sync::Arc;

use contracts::{HeaderMapper, Message, OutboundRecord, Payload, RecordHeaders, ResolvedFields};

/// Assembles [`OutboundRecord`]s
///
/// Pure: the message is only read. Without a header mapper the record carries
/// no headers.
#[derive(Clone, Default)]
pub struct RecordBuilder {
    header_mapper: Option<Arc<dyn HeaderMapper>>,
}

impl RecordBuilder {
    pub fn new(header_mapper: Option<Arc<dyn HeaderMapper>>) -> Self {
        Self { header_mapper }
    }

    pub fn has_header_mapper(&self) -> bool {
        self.header_mapper.is_some()
    }

    pub fn build(&self, fields: ResolvedFields, message: &Message) -> OutboundRecord {
        let headers = self
            .header_mapper
            .as_ref()
            .map(|mapper| mapper.from_metadata(message.metadata()))
            .unwrap_or_default();

        // 空负载哨兵 -> tombstone
        let payload = match message.payload() {
            Payload::Null => None,
            payload => Some(payload.clone()),
        };

        OutboundRecord {
            topic: fields.topic,
            partition: fields.partition,
            timestamp: fields.timestamp,
            key: fields.key,
            payload,
            headers,
        }
    }
}

impl std::fmt::Debug for RecordBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordBuilder")
            .field("header_mapper", &self.has_header_mapper())
            .finish()
    }
}

/// Headers-only view, used when logging a record
pub fn header_keys(headers: &RecordHeaders) -> Vec<&str> {
    headers.iter().map(|h| h.key.as_str()).collect()
}
