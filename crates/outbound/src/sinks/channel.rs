//! ChannelSink - forwards envelopes to an in-process receiver

use contracts::{ContractError, Envelope, MessageSink};
use tokio::sync::mpsc;

/// Sink that hands every envelope to an unbounded channel
///
/// Lets embedding code (and tests) consume the adapter's output channels.
pub struct ChannelSink {
    name: String,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl ChannelSink {
    pub fn new(name: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                name: name.into(),
                tx,
            },
            rx,
        )
    }
}

impl MessageSink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        self.tx
            .send(envelope.clone())
            .map_err(|_| ContractError::sink_delivery(&self.name, "receiver dropped"))
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
