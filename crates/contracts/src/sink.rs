//! MessageSink trait - OutcomeRouter output interface
//!
//! Defines the abstract interface for Sinks.

use crate::{ContractError, Envelope};

/// Message delivery trait
///
/// All sink implementations must implement this trait. Sinks are driven by a
/// single worker task, so `&mut self` is safe.
#[trait_variant::make(MessageSink: Send)]
pub trait LocalMessageSink {
    /// Sink name (used for logging/metrics/lookup)
    fn name(&self) -> &str;

    /// Deliver one envelope
    ///
    /// # Errors
    /// Returns delivery error (should include context)
    async fn deliver(&mut self, envelope: &Envelope) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
