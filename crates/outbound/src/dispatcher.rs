//! Dispatcher - hands records to the broker client

use std::sync::Arc;
use tracing::{debug, instrument};

use contracts::{OutboundRecord, OutcomeHandle, PublishClient};

use crate::metrics::PublishMetrics;
use crate::record_builder::header_keys;

/// Submits records without waiting for the broker
///
/// Exactly one `publish` call per record; the returned handle is the only
/// link to the eventual outcome.
#[derive(Clone)]
pub struct Dispatcher {
    adapter: Arc<str>,
    client: Arc<dyn PublishClient>,
    metrics: Arc<PublishMetrics>,
}

impl Dispatcher {
    pub fn new(
        adapter: impl Into<Arc<str>>,
        client: Arc<dyn PublishClient>,
        metrics: Arc<PublishMetrics>,
    ) -> Self {
        Self {
            adapter: adapter.into(),
            client,
            metrics,
        }
    }

    pub fn client(&self) -> &Arc<dyn PublishClient> {
        &self.client
    }

    #[instrument(
        name = "dispatcher_dispatch",
        skip(self, record),
        fields(client = self.client.name(), topic = %record.topic)
    )]
    pub fn dispatch(&self, record: Arc<OutboundRecord>) -> OutcomeHandle {
        self.metrics.inc_attempts();
        observability::record_publish_attempt(&self.adapter, &record.topic);

        debug!(
            partition = ?record.partition,
            tombstone = record.is_tombstone(),
            headers = ?header_keys(&record.headers),
            "Dispatching record"
        );

        self.client.publish(record)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("adapter", &self.adapter)
            .field("client", &self.client.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;
    use contracts::{OutcomeState, RecordHeaders};

    fn record() -> Arc<OutboundRecord> {
        Arc::new(OutboundRecord {
            topic: "orders".into(),
            partition: None,
            timestamp: None,
            key: None,
            payload: None,
            headers: RecordHeaders::new(),
        })
    }

    #[tokio::test]
    async fn test_one_publish_per_dispatch() {
        let broker = Arc::new(InMemoryBroker::new());
        let metrics = Arc::new(PublishMetrics::new());
        let dispatcher = Dispatcher::new("test", broker.clone(), Arc::clone(&metrics));

        let outcome = dispatcher.dispatch(record());
        outcome.wait().await;

        assert_eq!(broker.attempts(), 1);
        assert_eq!(metrics.attempts(), 1);
        assert_eq!(outcome.state(), OutcomeState::Succeeded);
    }

    #[tokio::test]
    async fn test_dispatch_does_not_wait() {
        let broker = Arc::new(InMemoryBroker::new().never_settle());
        let dispatcher = Dispatcher::new("test", broker, Arc::new(PublishMetrics::new()));

        let outcome = dispatcher.dispatch(record());
        assert_eq!(outcome.state(), OutcomeState::Pending);
    }
}
