//! Publish client implementations
//!
//! `InMemoryBroker` is always available; the librdkafka-backed client needs
//! the `kafka` feature.

#[cfg(feature = "kafka")]
mod kafka;
mod memory;

#[cfg(feature = "kafka")]
pub use self::kafka::KafkaPublishClient;
pub use self::memory::{InMemoryBroker, PublishedRecord};
