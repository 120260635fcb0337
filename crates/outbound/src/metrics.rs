//! Publish and sink metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for one producer handler
#[derive(Debug, Default)]
pub struct PublishMetrics {
    /// Records handed to the publish client
    attempts: AtomicU64,
    /// Broker acknowledgements
    succeeded: AtomicU64,
    /// Broker-reported failures
    failed: AtomicU64,
    /// Sync waits that expired
    timed_out: AtomicU64,
    /// Invocations aborted before dispatch
    rejected: AtomicU64,
    /// Enriched messages forwarded to the output sink
    forwarded: AtomicU64,
    /// Error messages forwarded to the failure sink
    failures_forwarded: AtomicU64,
    /// Failures with no failure sink to receive them
    failures_dropped: AtomicU64,
    /// Outcomes lost because a sink queue stayed full
    sink_timeouts: AtomicU64,
}

impl PublishMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn inc_attempts(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn inc_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    pub fn inc_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    pub fn inc_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failures_forwarded(&self) -> u64 {
        self.failures_forwarded.load(Ordering::Relaxed)
    }

    pub fn inc_failures_forwarded(&self) {
        self.failures_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failures_dropped(&self) -> u64 {
        self.failures_dropped.load(Ordering::Relaxed)
    }

    pub fn inc_failures_dropped(&self) {
        self.failures_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sink_timeouts(&self) -> u64 {
        self.sink_timeouts.load(Ordering::Relaxed)
    }

    pub fn inc_sink_timeouts(&self) {
        self.sink_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> PublishSnapshot {
        PublishSnapshot {
            attempts: self.attempts(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            timed_out: self.timed_out(),
            rejected: self.rejected(),
            forwarded: self.forwarded(),
            failures_forwarded: self.failures_forwarded(),
            failures_dropped: self.failures_dropped(),
            sink_timeouts: self.sink_timeouts(),
        }
    }
}

/// Snapshot of handler metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSnapshot {
    pub attempts: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub rejected: u64,
    pub forwarded: u64,
    pub failures_forwarded: u64,
    pub failures_dropped: u64,
    pub sink_timeouts: u64,
}

impl PublishSnapshot {
    /// Attempts still waiting for the broker
    pub fn in_flight(&self) -> u64 {
        self.attempts
            .saturating_sub(self.succeeded)
            .saturating_sub(self.failed)
    }
}

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Current queue length
    queue_len: AtomicUsize,
    /// Total successful deliveries
    delivered_count: AtomicU64,
    /// Total delivery failures
    failure_count: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current queue length
    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    /// Set current queue length
    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get total delivered count
    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    /// Increment delivered count
    pub fn inc_delivered_count(&self) {
        self.delivered_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Increment failure count
    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> SinkSnapshot {
        SinkSnapshot {
            queue_len: self.queue_len(),
            delivered_count: self.delivered_count(),
            failure_count: self.failure_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy)]
pub struct SinkSnapshot {
    pub queue_len: usize,
    pub delivered_count: u64,
    pub failure_count: u64,
}
