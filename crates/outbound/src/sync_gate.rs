//! SyncGate - bounded wait for the broker in sync mode

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use contracts::{FieldRule, Message, OutcomeHandle, RecordMetadata, DEFAULT_SEND_TIMEOUT_MS};

use crate::error::{OutboundError, RecordField};
use crate::resolver::to_integer;

/// Timeout rule with a constant value; `None` waits forever
pub fn fixed_timeout(timeout: Option<Duration>) -> FieldRule {
    let millis = timeout.map_or(-1, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));
    FieldRule::fixed(millis)
}

/// Sync-mode waiter
///
/// The timeout rule yields milliseconds; a negative or absent value means
/// wait without bound.
#[derive(Debug, Clone)]
pub struct SyncGate {
    timeout_rule: FieldRule,
}

impl Default for SyncGate {
    fn default() -> Self {
        Self::new(FieldRule::fixed(DEFAULT_SEND_TIMEOUT_MS))
    }
}

impl SyncGate {
    pub fn new(timeout_rule: FieldRule) -> Self {
        Self { timeout_rule }
    }

    /// Fixed timeout; `None` waits forever
    pub fn fixed(timeout: Option<Duration>) -> Self {
        Self::new(fixed_timeout(timeout))
    }

    /// Evaluate the timeout for one message
    pub fn resolve_timeout(&self, message: &Message) -> Result<Option<Duration>, OutboundError> {
        let value = self
            .timeout_rule
            .evaluate(message)
            .map_err(|e| OutboundError::resolution(RecordField::SendTimeout, e))?;

        let Some(value) = value else {
            return Ok(None);
        };
        let millis = to_integer(&value, RecordField::SendTimeout)?;
        Ok(u64::try_from(millis).ok().map(Duration::from_millis))
    }

    /// Wait for the outcome
    ///
    /// On expiry the outcome keeps running; only this wait gives up.
    pub async fn await_outcome(
        &self,
        outcome: &OutcomeHandle,
        timeout: Option<Duration>,
        topic: &str,
        message: &Arc<Message>,
    ) -> Result<RecordMetadata, OutboundError> {
        let settled = match timeout {
            Some(limit) => match tokio::time::timeout(limit, outcome.wait()).await {
                Ok(settled) => settled,
                Err(_) => {
                    let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                    warn!(timeout_ms, "Timed out waiting for broker acknowledgement");
                    return Err(OutboundError::Timeout {
                        timeout_ms,
                        message: Arc::clone(message),
                    });
                }
            },
            None => outcome.wait().await,
        };

        match settled.as_ref() {
            Ok(metadata) => {
                debug!(
                    topic = %metadata.topic,
                    partition = metadata.partition,
                    offset = metadata.offset,
                    "Broker acknowledged"
                );
                Ok(metadata.clone())
            }
            Err(cause) => Err(OutboundError::PublishFailed {
                topic: topic.to_string(),
                source: cause.clone(),
            }),
        }
    }
}
