//! Publisher - reads messages and drives the adapter.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{AdapterBlueprint, PublishOutcome};
use outbound::{Adapter, AdapterFactory, Dispatched, Routed};
use tokio::io::AsyncBufReadExt;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use super::input::{open_input, parse_line};
use super::stats::SendStats;

/// Configuration of one `send` run
#[derive(Debug, Clone)]
pub struct SendConfig {
    /// Adapter configuration (CLI overrides already applied)
    pub blueprint: AdapterBlueprint,

    /// JSON-lines input, stdin when `None`
    pub input: Option<PathBuf>,

    /// Stop after this many messages
    pub max_messages: Option<u64>,
}

/// Drives one adapter over an input stream
pub struct Publisher {
    config: SendConfig,
}

impl Publisher {
    pub fn new(config: SendConfig) -> Self {
        Self { config }
    }

    /// Publish every input message, then wait for all outcomes
    #[instrument(name = "publisher_run", skip(self), fields(adapter = %self.config.blueprint.adapter.name))]
    pub async fn run(self) -> Result<SendStats> {
        let adapter = AdapterFactory::build(&self.config.blueprint)
            .context("Failed to build adapter")?;

        let started = Instant::now();
        let mut stats = SendStats::default();
        let result = self.publish_all(&adapter, &mut stats).await;

        stats.handler = adapter.handler.metrics();
        let sink_metrics: Vec<_> = adapter
            .registry
            .names()
            .into_iter()
            .filter_map(|name| {
                adapter
                    .registry
                    .get(name)
                    .map(|sink| (name.to_string(), Arc::clone(sink.metrics())))
            })
            .collect();

        adapter.shutdown().await;

        stats.sinks = sink_metrics
            .into_iter()
            .map(|(name, metrics)| (name, metrics.snapshot()))
            .collect();
        stats.duration = started.elapsed();

        result.map(|()| stats)
    }

    async fn publish_all(&self, adapter: &Adapter, stats: &mut SendStats) -> Result<()> {
        let reader = open_input(self.config.input.as_deref())
            .await
            .context("Failed to open input")?;
        let mut lines = reader.lines();
        let mut in_flight: JoinSet<(Arc<PublishOutcome>, f64, Routed)> = JoinSet::new();
        let mut line_no = 0u64;

        while let Some(line) = lines.next_line().await.context("Failed to read input")? {
            line_no += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let message = match parse_line(line_no, line) {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed input line");
                    stats.malformed_lines += 1;
                    continue;
                }
            };
            stats.messages_read += 1;

            let sent_at = Instant::now();
            match adapter.handler.handle(message).await {
                Ok(dispatched) => {
                    in_flight.spawn(settle(dispatched, sent_at));
                }
                Err(e) if e.is_timeout() => {
                    warn!(line = line_no, error = %e, "Send timed out");
                    stats.outcomes.record_timeout();
                }
                Err(e) if e.is_rejected_before_dispatch() => {
                    warn!(line = line_no, error = %e, "Message rejected");
                    stats.outcomes.record_rejected();
                }
                Err(e) => match e.publish_failure() {
                    Some(failure) => {
                        warn!(line = line_no, error = %e, "Publish failed");
                        let latency_ms = sent_at.elapsed().as_secs_f64() * 1000.0;
                        stats.outcomes.update(&Err(failure.clone()), latency_ms);
                    }
                    None => return Err(e).context("Publish failed"),
                },
            }

            if self
                .config
                .max_messages
                .is_some_and(|max| stats.messages_read >= max)
            {
                info!(max_messages = stats.messages_read, "Message limit reached");
                break;
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            let (outcome, latency_ms, routed) = joined.context("Outcome task failed")?;
            debug!(?routed, "Outcome routed");
            stats.outcomes.update(&outcome, latency_ms);
        }

        info!(
            messages = stats.messages_read,
            malformed = stats.malformed_lines,
            "Input exhausted"
        );
        Ok(())
    }
}

/// Wait for the broker and the router of one dispatched message
async fn settle(dispatched: Dispatched, sent_at: Instant) -> (Arc<PublishOutcome>, f64, Routed) {
    let outcome = dispatched.outcome().wait().await;
    let latency_ms = sent_at.elapsed().as_secs_f64() * 1000.0;
    let routed = dispatched.routed().await;
    (outcome, latency_ms, routed)
}
