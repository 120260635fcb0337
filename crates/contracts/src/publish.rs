//! Collaborator traits consumed by the producer handler.

use std::sync::Arc;

use crate::{ErrorMessage, Metadata, OutboundRecord, OutcomeHandle, RecordHeaders, SendFailure};

/// Broker client
///
/// `publish` must not block: it enqueues the record and returns a handle
/// that is settled later from the client's own execution context. Retries,
/// if any, belong to the client.
pub trait PublishClient: Send + Sync {
    /// Client name (used for logging)
    fn name(&self) -> &str;

    /// Submit one record
    fn publish(&self, record: Arc<OutboundRecord>) -> OutcomeHandle;
}

/// Metadata to broker header translation
///
/// Implementations must be pure: the same metadata always maps to the same
/// headers.
pub trait HeaderMapper: Send + Sync {
    fn from_metadata(&self, metadata: &Metadata) -> RecordHeaders;
}

/// Builds the message sent to the failure sink
pub trait ErrorMessageStrategy: Send + Sync {
    fn build_error_message(&self, failure: SendFailure) -> ErrorMessage;
}
