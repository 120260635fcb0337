//! SinkHandle - runs a sink behind an isolated queue and worker task
//!
//! Producers hold cheap [`SinkRef`] clones; the handle owns the worker and
//! decides when it stops.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace};

use contracts::{Envelope, MessageSink};

use crate::error::OutboundError;
use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
pub struct SinkHandle {
    sink_ref: SinkRef,
    /// Stops the worker even while `SinkRef` clones are alive
    shutdown_tx: watch::Sender<bool>,
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    pub fn spawn<S: MessageSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name: Arc<str> = Arc::from(sink.name());
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.to_string();
        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, shutdown_rx, worker_metrics, worker_name).await;
        });

        Self {
            sink_ref: SinkRef { name, tx, metrics },
            shutdown_tx,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        self.sink_ref.name()
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        self.sink_ref.metrics()
    }

    /// Producer side of the queue
    pub fn sender(&self) -> SinkRef {
        self.sink_ref.clone()
    }

    /// Drain the queue, flush and close the sink
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name()))]
    pub async fn shutdown(self) {
        let name = self.name().to_string();
        let _ = self.shutdown_tx.send(true);
        drop(self.sink_ref);

        if let Err(e) = self.worker_handle.await {
            error!(sink = %name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %name, "SinkHandle shutdown complete");
    }
}

/// Cloneable producer reference to a sink queue
#[derive(Debug, Clone)]
pub struct SinkRef {
    name: Arc<str>,
    tx: mpsc::Sender<Envelope>,
    metrics: Arc<SinkMetrics>,
}

impl SinkRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Enqueue an envelope
    ///
    /// Waits for queue space (backpressure); fails only when the worker is gone.
    pub async fn send(&self, envelope: Envelope) -> Result<(), OutboundError> {
        self.tx.send(envelope).await.map_err(|_| OutboundError::SinkClosed {
            name: self.name.to_string(),
        })?;
        self.update_queue_len();
        Ok(())
    }

    /// Enqueue an envelope, waiting at most `timeout` for queue space
    ///
    /// `None` behaves like [`SinkRef::send`].
    pub async fn send_timeout(
        &self,
        envelope: Envelope,
        timeout: Option<Duration>,
    ) -> Result<(), OutboundError> {
        let Some(limit) = timeout else {
            return self.send(envelope).await;
        };

        self.tx
            .send_timeout(envelope, limit)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => OutboundError::SinkTimeout {
                    name: self.name.to_string(),
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                },
                SendTimeoutError::Closed(_) => OutboundError::SinkClosed {
                    name: self.name.to_string(),
                },
            })?;
        self.update_queue_len();
        Ok(())
    }

    fn update_queue_len(&self) {
        self.metrics
            .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
    }

    /// True once the worker stopped accepting envelopes
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Worker task that consumes envelopes and delivers them to the sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, shutdown_rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: MessageSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Envelope>,
    mut shutdown_rx: watch::Receiver<bool>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(envelope) => deliver(&mut sink, &envelope, &rx, &metrics, &name).await,
                None => break,
            },
            _ = async { shutdown_rx.wait_for(|stop| *stop).await.is_ok() } => {
                // 停止接收，处理已入队的消息
                rx.close();
                while let Ok(envelope) = rx.try_recv() {
                    deliver(&mut sink, &envelope, &rx, &metrics, &name).await;
                }
                break;
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}

async fn deliver<S: MessageSink>(
    sink: &mut S,
    envelope: &Envelope,
    rx: &mpsc::Receiver<Envelope>,
    metrics: &SinkMetrics,
    name: &str,
) {
    metrics.set_queue_len(rx.len());

    match sink.deliver(envelope).await {
        Ok(()) => {
            metrics.inc_delivered_count();
            observability::record_sink_delivery(name, true);
            trace!(sink = %name, kind = envelope.kind(), "Envelope delivered");
        }
        Err(e) => {
            // 单条失败不影响后续投递
            metrics.inc_failure_count();
            observability::record_sink_delivery(name, false);
            error!(
                sink = %name,
                kind = envelope.kind(),
                error = %e,
                "Delivery failed"
            );
        }
    }
}
