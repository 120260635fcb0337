//! ProducerMessageHandler - one publish per inbound message
//!
//! ```text
//! Message ─► FieldResolver ─► RecordBuilder ─► Dispatcher ─► OutcomeHandle
//!                                                              │
//!                                   OutcomeRouter ◄────────────┤
//!                                   SyncGate (sync mode) ◄─────┘
//! ```
//!
//! Errors before dispatch abort the invocation with nothing published. After
//! dispatch the router always observes the outcome, so sync-mode callers and
//! the sinks see the same single result.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use contracts::{
    ErrorMessageStrategy, FieldRule, HeaderMapper, Message, OutcomeHandle, PublishClient,
    RecordMetadata, ResolvedFields, DEFAULT_SEND_TIMEOUT_MS,
};

use crate::dispatcher::Dispatcher;
use crate::error::OutboundError;
use crate::error_strategy::DefaultErrorMessageStrategy;
use crate::handle::SinkRef;
use crate::header_mapper::DefaultHeaderMapper;
use crate::metrics::{PublishMetrics, PublishSnapshot};
use crate::record_builder::RecordBuilder;
use crate::registry::SinkRegistry;
use crate::resolver::FieldResolver;
use crate::router::{OutcomeRouter, Routed};
use crate::sync_gate::{fixed_timeout, SyncGate};

/// Component type reported by the handler
pub const COMPONENT_TYPE: &str = "kafka:outbound-channel-adapter";

/// Result of a successful `handle` call
#[derive(Debug)]
pub struct Dispatched {
    outcome: OutcomeHandle,
    routing: JoinHandle<Routed>,
    /// Set in sync mode
    acknowledged: Option<RecordMetadata>,
}

impl Dispatched {
    /// Broker outcome of this publish
    pub fn outcome(&self) -> &OutcomeHandle {
        &self.outcome
    }

    /// Broker metadata, present when the handler waited (sync mode)
    pub fn acknowledged(&self) -> Option<&RecordMetadata> {
        self.acknowledged.as_ref()
    }

    /// Wait until the router delivered the outcome to its sink
    pub async fn routed(self) -> Routed {
        match self.routing.await {
            Ok(routed) => routed,
            Err(e) => {
                warn!(error = %e, "Outcome router task failed");
                Routed::SinkClosed
            }
        }
    }
}

/// Builder for [`ProducerMessageHandler`]
pub struct ProducerMessageHandlerBuilder {
    name: String,
    client: Arc<dyn PublishClient>,
    resolver: FieldResolver,
    header_mapper: Option<Arc<dyn HeaderMapper>>,
    sync: bool,
    timeout_rule: FieldRule,
    sink_timeout: Option<Duration>,
    output: Option<SinkRef>,
    failure: Option<SinkRef>,
    failure_name: Option<String>,
    strategy: Arc<dyn ErrorMessageStrategy>,
}

impl ProducerMessageHandlerBuilder {
    fn new(client: Arc<dyn PublishClient>) -> Self {
        Self {
            name: "kafka-outbound".to_string(),
            client,
            resolver: FieldResolver::new(),
            header_mapper: Some(Arc::new(DefaultHeaderMapper::default())),
            sync: false,
            timeout_rule: FieldRule::fixed(DEFAULT_SEND_TIMEOUT_MS),
            sink_timeout: Some(Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS.unsigned_abs())),
            output: None,
            failure: None,
            failure_name: None,
            strategy: Arc::new(DefaultErrorMessageStrategy),
        }
    }

    /// Name used in logs and metrics
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn topic(mut self, rule: FieldRule) -> Self {
        self.resolver = self.resolver.with_topic(rule);
        self
    }

    pub fn partition(mut self, rule: FieldRule) -> Self {
        self.resolver = self.resolver.with_partition(rule);
        self
    }

    pub fn key(mut self, rule: FieldRule) -> Self {
        self.resolver = self.resolver.with_key(rule);
        self
    }

    pub fn timestamp(mut self, rule: FieldRule) -> Self {
        self.resolver = self.resolver.with_timestamp(rule);
        self
    }

    pub fn header_mapper(mut self, mapper: Arc<dyn HeaderMapper>) -> Self {
        self.header_mapper = Some(mapper);
        self
    }

    /// Publish records without headers
    pub fn without_header_mapping(mut self) -> Self {
        self.header_mapper = None;
        self
    }

    /// Wait for the broker before returning
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Fixed send timeout; `None` waits forever
    ///
    /// Bounds the sync-mode wait and the wait for output/failure sink
    /// queue space.
    pub fn send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_rule = fixed_timeout(timeout);
        self.sink_timeout = timeout;
        self
    }

    /// Per-message sync-mode timeout (milliseconds)
    ///
    /// Sink sends keep their fixed limit.
    pub fn send_timeout_rule(mut self, rule: FieldRule) -> Self {
        self.timeout_rule = rule;
        self
    }

    /// Limit on waiting for sink queue space; `None` waits forever
    pub fn sink_send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.sink_timeout = timeout;
        self
    }

    pub fn output_sink(mut self, sink: SinkRef) -> Self {
        self.output = Some(sink);
        self
    }

    pub fn failure_sink(mut self, sink: SinkRef) -> Self {
        self.failure = Some(sink);
        self.failure_name = None;
        self
    }

    /// Failure sink looked up by name at build time
    pub fn failure_sink_name(mut self, name: impl Into<String>) -> Self {
        self.failure_name = Some(name.into());
        self.failure = None;
        self
    }

    pub fn error_message_strategy(mut self, strategy: Arc<dyn ErrorMessageStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Build without a sink registry
    ///
    /// # Errors
    /// `Configuration` if a failure sink was given by name.
    pub fn build(self) -> Result<ProducerMessageHandler, OutboundError> {
        if let Some(name) = &self.failure_name {
            return Err(OutboundError::configuration(format!(
                "failure sink '{name}' given by name but no sink registry supplied"
            )));
        }
        Ok(self.assemble())
    }

    /// Build, resolving named sinks against a registry
    pub fn build_with_registry(
        mut self,
        registry: &SinkRegistry,
    ) -> Result<ProducerMessageHandler, OutboundError> {
        if let Some(name) = self.failure_name.take() {
            self.failure = Some(registry.resolve(&name)?);
        }
        Ok(self.assemble())
    }

    fn assemble(self) -> ProducerMessageHandler {
        let name: Arc<str> = Arc::from(self.name);
        let metrics = Arc::new(PublishMetrics::new());

        ProducerMessageHandler {
            resolver: self.resolver,
            builder: RecordBuilder::new(self.header_mapper),
            dispatcher: Dispatcher::new(Arc::clone(&name), self.client, Arc::clone(&metrics)),
            router: OutcomeRouter::new(
                Arc::clone(&name),
                self.output,
                self.failure,
                self.strategy,
                Arc::clone(&metrics),
            )
            .with_sink_timeout(self.sink_timeout),
            gate: self.sync.then(|| SyncGate::new(self.timeout_rule)),
            metrics,
            name,
        }
    }
}

/// Outbound channel adapter handler
///
/// Safe to share across tasks: `handle` takes `&self`.
#[derive(Debug)]
pub struct ProducerMessageHandler {
    name: Arc<str>,
    resolver: FieldResolver,
    builder: RecordBuilder,
    dispatcher: Dispatcher,
    router: OutcomeRouter,
    /// `Some` in sync mode
    gate: Option<SyncGate>,
    metrics: Arc<PublishMetrics>,
}

impl ProducerMessageHandler {
    pub fn builder(client: Arc<dyn PublishClient>) -> ProducerMessageHandlerBuilder {
        ProducerMessageHandlerBuilder::new(client)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component_type(&self) -> &'static str {
        COMPONENT_TYPE
    }

    pub fn is_sync(&self) -> bool {
        self.gate.is_some()
    }

    pub fn metrics(&self) -> PublishSnapshot {
        self.metrics.snapshot()
    }

    /// Limit on waiting for output/failure sink queue space
    pub fn sink_send_timeout(&self) -> Option<Duration> {
        self.router.sink_timeout()
    }

    /// Publish one message
    ///
    /// # Errors
    /// - `Precondition` / `Resolution` before dispatch (nothing published)
    /// - sync mode only: `PublishFailed` or `Timeout`
    #[instrument(name = "producer_handle", skip(self, message), fields(adapter = %self.name))]
    pub async fn handle(&self, message: Message) -> Result<Dispatched, OutboundError> {
        let prepared = self.prepare(&message);
        let (fields, timeout) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                self.metrics.inc_rejected();
                observability::record_invocation_rejected(&self.name, reject_reason(&e));
                debug!(error = %e, "Message rejected before dispatch");
                return Err(e);
            }
        };

        let record = Arc::new(self.builder.build(fields, &message));
        let topic = record.topic.clone();
        let message = Arc::new(message);

        let outcome = self.dispatcher.dispatch(Arc::clone(&record));
        let routing = self
            .router
            .attach(outcome.clone(), Arc::clone(&message), record);

        let acknowledged = match &self.gate {
            Some(gate) => match gate.await_outcome(&outcome, timeout, &topic, &message).await {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    if e.is_timeout() {
                        self.metrics.inc_timed_out();
                        observability::record_sync_timeout(&self.name);
                    }
                    return Err(e);
                }
            },
            None => None,
        };

        Ok(Dispatched {
            outcome,
            routing,
            acknowledged,
        })
    }

    /// Everything that can fail before dispatch
    fn prepare(
        &self,
        message: &Message,
    ) -> Result<(ResolvedFields, Option<Duration>), OutboundError> {
        let fields = self.resolver.resolve(message)?;
        let timeout = match &self.gate {
            Some(gate) => gate.resolve_timeout(message)?,
            None => None,
        };
        Ok((fields, timeout))
    }
}

fn reject_reason(error: &OutboundError) -> &'static str {
    match error {
        OutboundError::Precondition { .. } => "precondition",
        OutboundError::Resolution { .. } => "resolution",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;
    use crate::handle::SinkHandle;
    use crate::sinks::ChannelSink;
    use contracts::{
        metadata_keys, ContractError, Envelope, OutcomeState, Payload, PublishFailure,
    };
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn channel(name: &str) -> (SinkHandle, UnboundedReceiver<Envelope>) {
        let (sink, rx) = ChannelSink::new(name);
        (SinkHandle::spawn(sink, 16), rx)
    }

    fn order(topic: &str) -> Message {
        Message::builder(json!({"order": 1})).with_topic(topic).build()
    }

    #[tokio::test]
    async fn test_async_success_forwards_enriched_message() {
        let broker = Arc::new(InMemoryBroker::new());
        let (output, mut rx) = channel("out");
        let handler = ProducerMessageHandler::builder(broker.clone())
            .output_sink(output.sender())
            .build()
            .unwrap();

        let dispatched = handler.handle(order("orders")).await.unwrap();
        assert!(dispatched.acknowledged().is_none());
        assert_eq!(dispatched.routed().await, Routed::Forwarded);

        let Some(Envelope::Message(enriched)) = rx.recv().await else {
            panic!("expected message");
        };
        assert_eq!(enriched.get(metadata_keys::RECORD_METADATA).unwrap()["offset"], 0);
        assert_eq!(broker.attempts(), 1);
        assert_eq!(handler.metrics().forwarded, 1);
        output.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_topic_publishes_nothing() {
        let broker = Arc::new(InMemoryBroker::new());
        let handler = ProducerMessageHandler::builder(broker.clone())
            .build()
            .unwrap();

        let err = handler.handle(Message::new("x")).await.unwrap_err();
        assert!(matches!(err, OutboundError::Precondition { .. }));
        assert_eq!(broker.attempts(), 0);
        assert_eq!(handler.metrics().rejected, 1);
    }

    #[tokio::test]
    async fn test_key_rule_error_publishes_nothing() {
        let broker = Arc::new(InMemoryBroker::new());
        let handler = ProducerMessageHandler::builder(broker.clone())
            .key(FieldRule::custom(|_| {
                Err(ContractError::rule_evaluation("key", "boom"))
            }))
            .build()
            .unwrap();

        let err = handler.handle(order("orders")).await.unwrap_err();
        assert!(err.is_rejected_before_dispatch());
        assert_eq!(broker.attempts(), 0);
    }

    #[tokio::test]
    async fn test_async_failure_goes_to_failure_sink() {
        let broker = Arc::new(
            InMemoryBroker::new().fail_with(PublishFailure::BrokerUnavailable("down".into())),
        );
        let (output, mut out_rx) = channel("out");
        let (failure, mut err_rx) = channel("err");
        let handler = ProducerMessageHandler::builder(broker)
            .output_sink(output.sender())
            .failure_sink(failure.sender())
            .build()
            .unwrap();

        let dispatched = handler.handle(order("orders")).await.unwrap();
        assert_eq!(dispatched.routed().await, Routed::FailureForwarded);

        let Some(Envelope::Error(error)) = err_rx.recv().await else {
            panic!("expected error message");
        };
        assert_eq!(error.payload().record().topic, "orders");
        assert_eq!(
            error.original_message().unwrap().payload(),
            &Payload::Json(json!({"order": 1}))
        );

        output.shutdown().await;
        failure.shutdown().await;
        assert!(out_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_sync_success_returns_metadata() {
        let broker = Arc::new(InMemoryBroker::new().with_latency(Duration::from_millis(10)));
        let handler = ProducerMessageHandler::builder(broker)
            .sync(true)
            .build()
            .unwrap();

        let dispatched = handler.handle(order("orders")).await.unwrap();
        assert_eq!(dispatched.acknowledged().map(|m| m.offset), Some(0));
        assert_eq!(dispatched.outcome().state(), OutcomeState::Succeeded);
    }

    #[tokio::test]
    async fn test_sync_failure_raised_and_routed() {
        let broker = Arc::new(InMemoryBroker::new().fail_with(PublishFailure::Rejected("no".into())));
        let (failure, mut err_rx) = channel("err");
        let handler = ProducerMessageHandler::builder(broker)
            .sync(true)
            .failure_sink(failure.sender())
            .build()
            .unwrap();

        let err = handler.handle(order("orders")).await.unwrap_err();
        assert_eq!(
            err.publish_failure(),
            Some(&PublishFailure::Rejected("no".into()))
        );
        assert!(matches!(err_rx.recv().await, Some(Envelope::Error(_))));
        failure.shutdown().await;
    }

    #[tokio::test]
    async fn test_sync_timeout_then_late_failure_still_routed() {
        let broker = Arc::new(InMemoryBroker::new().never_settle());
        let (failure, mut err_rx) = channel("err");
        let handler = ProducerMessageHandler::builder(broker.clone())
            .sync(true)
            .send_timeout(Some(Duration::from_millis(20)))
            .failure_sink(failure.sender())
            .build()
            .unwrap();

        let err = handler.handle(order("orders")).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(handler.metrics().timed_out, 1);

        for settler in broker.take_parked() {
            settler.settle(Err(PublishFailure::TimedOut("late".into())));
        }
        let Some(Envelope::Error(error)) = err_rx.recv().await else {
            panic!("expected late error message");
        };
        assert_eq!(error.payload().cause(), &PublishFailure::TimedOut("late".into()));
        failure.shutdown().await;
    }

    #[tokio::test]
    async fn test_per_message_timeout_rule() {
        let broker = Arc::new(InMemoryBroker::new().never_settle());
        let handler = ProducerMessageHandler::builder(broker)
            .sync(true)
            .send_timeout_rule(FieldRule::metadata("deadline"))
            .build()
            .unwrap();

        let message = Message::builder("x")
            .with_topic("orders")
            .with_metadata("deadline", 15)
            .build();
        let err = handler.handle(message).await.unwrap_err();
        assert!(matches!(err, OutboundError::Timeout { timeout_ms: 15, .. }));
    }

    /// Never finishes delivering the envelope it took
    struct StalledSink;

    impl contracts::MessageSink for StalledSink {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn deliver(&mut self, _envelope: &Envelope) -> Result<(), ContractError> {
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stalled_output_sink_does_not_block_routing() {
        let broker = Arc::new(InMemoryBroker::new());
        let stalled = SinkHandle::spawn(StalledSink, 1);
        let handler = ProducerMessageHandler::builder(broker)
            .send_timeout(Some(Duration::from_millis(50)))
            .output_sink(stalled.sender())
            .build()
            .unwrap();

        let mut routed = Vec::new();
        for _ in 0..3 {
            let dispatched = handler.handle(order("orders")).await.unwrap();
            let result = tokio::time::timeout(Duration::from_secs(2), dispatched.routed())
                .await
                .expect("routing must finish");
            routed.push(result);
        }

        assert_eq!(routed[2], Routed::SinkTimedOut);
        let metrics = handler.metrics();
        assert_eq!(metrics.succeeded, 3);
        assert_eq!(metrics.forwarded, 2);
        assert_eq!(metrics.sink_timeouts, 1);
    }

    #[tokio::test]
    async fn test_timeout_rule_keeps_default_sink_limit() {
        let broker = Arc::new(InMemoryBroker::new());
        let handler = ProducerMessageHandler::builder(broker)
            .sync(true)
            .send_timeout_rule(FieldRule::metadata("deadline"))
            .build()
            .unwrap();

        assert_eq!(handler.sink_send_timeout(), Some(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_headers_mapped_by_default() {
        let broker = Arc::new(InMemoryBroker::new());
        let handler = ProducerMessageHandler::builder(broker.clone())
            .build()
            .unwrap();

        let message = Message::builder("x")
            .with_topic("orders")
            .with_metadata("trace_id", "abc")
            .build();
        handler.handle(message).await.unwrap().routed().await;

        let published = broker.published();
        let headers = &published[0].record.headers;
        assert!(headers.get("trace_id").is_some());
        assert!(headers.get(metadata_keys::TOPIC).is_none());

        let bare = ProducerMessageHandler::builder(broker.clone())
            .without_header_mapping()
            .build()
            .unwrap();
        bare.handle(order("orders")).await.unwrap().routed().await;
        assert!(broker.published()[1].record.headers.is_empty());
    }

    #[tokio::test]
    async fn test_failure_sink_by_name() {
        let mut registry = SinkRegistry::new();
        let (sink, _rx) = ChannelSink::new("errors");
        registry.register(SinkHandle::spawn(sink, 4)).unwrap();
        let broker = Arc::new(InMemoryBroker::new());

        let handler = ProducerMessageHandler::builder(broker.clone())
            .failure_sink_name("errors")
            .build_with_registry(&registry)
            .unwrap();
        assert_eq!(handler.component_type(), "kafka:outbound-channel-adapter");

        let missing = ProducerMessageHandler::builder(broker.clone())
            .failure_sink_name("nope")
            .build_with_registry(&registry);
        assert!(matches!(missing, Err(OutboundError::Configuration { .. })));

        let no_registry = ProducerMessageHandler::builder(broker)
            .failure_sink_name("errors")
            .build();
        assert!(no_registry.is_err());
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_tombstone_and_rule_resolution() {
        let broker = Arc::new(InMemoryBroker::new().with_partitions(4));
        let handler = ProducerMessageHandler::builder(broker.clone())
            .topic(FieldRule::template("events.${region}").unwrap())
            .partition(FieldRule::fixed(3))
            .key(FieldRule::metadata("customer"))
            .timestamp(FieldRule::fixed(1_700_000_000_000_i64))
            .build()
            .unwrap();

        let message = Message::builder(Payload::Null)
            .with_metadata("region", "eu")
            .with_metadata("customer", "c-9")
            .build();
        handler.handle(message).await.unwrap().routed().await;

        let published = broker.published_to("events.eu");
        assert_eq!(published.len(), 1);
        let record = &published[0].record;
        assert!(record.is_tombstone());
        assert_eq!(record.partition, Some(3));
        assert_eq!(record.key, Some(json!("c-9")));
        assert_eq!(published[0].metadata.timestamp, Some(1_700_000_000_000));
    }
}
