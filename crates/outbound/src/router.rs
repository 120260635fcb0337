//! OutcomeRouter - delivers each settled outcome to the output or failure sink
//!
//! ```text
//! OutcomeHandle ──Ok(metadata)──► enrich ──► output sink (if any)
//!               └─Err(cause)────► ErrorMessageStrategy ──► failure sink (if any)
//! ```
//!
//! Sink sends wait for queue space at most `sink_timeout` (10s unless
//! configured), so a stalled sink cannot park routing tasks forever.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn, Instrument};

use contracts::{
    metadata_keys, Envelope, ErrorMessageStrategy, Message, MessageBuilder, OutboundRecord,
    OutcomeHandle, PublishFailure, RecordMetadata, SendFailure, DEFAULT_SEND_TIMEOUT_MS,
};

use crate::error::OutboundError;
use crate::handle::SinkRef;
use crate::metrics::PublishMetrics;

/// What the router did with one outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Enriched message sent to the output sink
    Forwarded,
    /// Success with no output sink configured
    NoOutputSink,
    /// Error message sent to the failure sink
    FailureForwarded,
    /// Failure with no failure sink configured
    FailureDropped,
    /// The target sink stopped accepting envelopes
    SinkClosed,
    /// The target sink queue stayed full past the send timeout
    SinkTimedOut,
}

/// Outcome continuation shared by all invocations of one handler
#[derive(Clone)]
pub struct OutcomeRouter {
    adapter: Arc<str>,
    output: Option<SinkRef>,
    failure: Option<SinkRef>,
    strategy: Arc<dyn ErrorMessageStrategy>,
    metrics: Arc<PublishMetrics>,
    /// `None` waits for queue space without bound
    sink_timeout: Option<Duration>,
}

impl OutcomeRouter {
    pub fn new(
        adapter: impl Into<Arc<str>>,
        output: Option<SinkRef>,
        failure: Option<SinkRef>,
        strategy: Arc<dyn ErrorMessageStrategy>,
        metrics: Arc<PublishMetrics>,
    ) -> Self {
        Self {
            adapter: adapter.into(),
            output,
            failure,
            strategy,
            metrics,
            sink_timeout: Some(Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS.unsigned_abs())),
        }
    }

    /// Limit on waiting for sink queue space
    pub fn with_sink_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.sink_timeout = timeout;
        self
    }

    pub fn sink_timeout(&self) -> Option<Duration> {
        self.sink_timeout
    }

    pub fn output_sink(&self) -> Option<&SinkRef> {
        self.output.as_ref()
    }

    pub fn failure_sink(&self) -> Option<&SinkRef> {
        self.failure.as_ref()
    }

    /// Register the continuation for one outcome
    ///
    /// Runs exactly once, whether the outcome is already settled or not.
    pub fn attach(
        &self,
        outcome: OutcomeHandle,
        message: Arc<Message>,
        record: Arc<OutboundRecord>,
    ) -> JoinHandle<Routed> {
        let router = self.clone();
        let started = Instant::now();
        let span = tracing::debug_span!("outcome_router", topic = %record.topic);

        tokio::spawn(
            async move {
                let settled = outcome.wait().await;
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                match settled.as_ref() {
                    Ok(metadata) => router.on_success(metadata, &message, elapsed_ms).await,
                    Err(cause) => router.on_failure(cause.clone(), message, record).await,
                }
            }
            .instrument(span),
        )
    }

    #[instrument(
        name = "outcome_router_success",
        skip(self, metadata, message),
        fields(partition = metadata.partition, offset = metadata.offset)
    )]
    async fn on_success(
        &self,
        metadata: &RecordMetadata,
        message: &Message,
        elapsed_ms: f64,
    ) -> Routed {
        self.metrics.inc_succeeded();
        observability::record_publish_outcome(&self.adapter, &metadata.topic, true);
        observability::record_ack_latency_ms(&self.adapter, elapsed_ms);

        let Some(output) = &self.output else {
            return Routed::NoOutputSink;
        };

        let record_metadata = match serde_json::to_value(metadata) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Record metadata not serializable");
                serde_json::Value::Null
            }
        };
        let enriched = MessageBuilder::from_message(message)
            .with_metadata(metadata_keys::RECORD_METADATA, record_metadata)
            .build();

        match self.forward(output, Envelope::Message(Arc::new(enriched))).await {
            Ok(()) => {
                self.metrics.inc_forwarded();
                Routed::Forwarded
            }
            Err(routed) => routed,
        }
    }

    #[instrument(name = "outcome_router_failure", skip_all, fields(cause = %cause))]
    async fn on_failure(
        &self,
        cause: PublishFailure,
        message: Arc<Message>,
        record: Arc<OutboundRecord>,
    ) -> Routed {
        self.metrics.inc_failed();
        observability::record_publish_outcome(&self.adapter, &record.topic, false);

        let Some(failure_sink) = &self.failure else {
            // 无失败通道时静默丢弃
            self.metrics.inc_failures_dropped();
            debug!(topic = %record.topic, "No failure sink, publish failure dropped");
            return Routed::FailureDropped;
        };

        let error = self
            .strategy
            .build_error_message(SendFailure::new(message, record, cause));

        match self.forward(failure_sink, Envelope::Error(Arc::new(error))).await {
            Ok(()) => {
                self.metrics.inc_failures_forwarded();
                Routed::FailureForwarded
            }
            Err(routed) => routed,
        }
    }

    /// Enqueue on a sink; `Err` carries what happened instead
    async fn forward(&self, sink: &SinkRef, envelope: Envelope) -> Result<(), Routed> {
        match sink.send_timeout(envelope, self.sink_timeout).await {
            Ok(()) => Ok(()),
            Err(OutboundError::SinkTimeout { timeout_ms, .. }) => {
                self.metrics.inc_sink_timeouts();
                observability::record_sink_send_timeout(sink.name());
                warn!(sink = sink.name(), timeout_ms, "Sink queue full, envelope dropped");
                Err(Routed::SinkTimedOut)
            }
            Err(e) => {
                warn!(sink = sink.name(), error = %e, "Sink closed, envelope dropped");
                Err(Routed::SinkClosed)
            }
        }
    }
}

impl std::fmt::Debug for OutcomeRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutcomeRouter")
            .field("adapter", &self.adapter)
            .field("output", &self.output.as_ref().map(SinkRef::name))
            .field("failure", &self.failure.as_ref().map(SinkRef::name))
            .field("sink_timeout", &self.sink_timeout)
            .finish()
    }
}
