//! LogSink - logs envelope summaries via tracing

use contracts::{metadata_keys, ContractError, Envelope, MessageSink};
use tracing::{info, instrument, warn};

/// Sink that logs envelope summaries for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_summary(&self, envelope: &Envelope) {
        match envelope {
            Envelope::Message(message) => {
                let record = message.get(metadata_keys::RECORD_METADATA);
                info!(
                    sink = %self.name,
                    topic = ?record.and_then(|r| r.get("topic")),
                    partition = ?record.and_then(|r| r.get("partition")),
                    offset = ?record.and_then(|r| r.get("offset")),
                    "Message published"
                );
            }
            Envelope::Error(error) => {
                let failure = error.payload();
                warn!(
                    sink = %self.name,
                    topic = %failure.record().topic,
                    cause = %failure.cause(),
                    "Publish failed"
                );
            }
        }
    }
}

impl MessageSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_deliver",
        skip(self, envelope),
        fields(sink = %self.name, kind = envelope.kind())
    )]
    async fn deliver(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        self.log_summary(envelope);
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Message;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_log_sink_deliver() {
        let mut sink = LogSink::new("test_log");
        let envelope = Envelope::Message(Arc::new(Message::new("hello")));

        assert!(sink.deliver(&envelope).await.is_ok());
        assert!(sink.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
