//! InMemoryBroker - process-local publish client
//!
//! Assigns partitions and offsets like a single-node broker would, with knobs
//! for acknowledgement latency and injected failures.
//!
//! The accepted-record log is unbounded for `new()`; `from_config` and
//! `with_log_capacity` keep only the most recent records.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, trace};

use contracts::{
    BrokerConfig, OutboundRecord, OutcomeHandle, OutcomeSettler, PublishClient, PublishFailure,
    PublishOutcome, RecordMetadata,
};

/// A record the broker accepted
#[derive(Debug, Clone)]
pub struct PublishedRecord {
    pub record: Arc<OutboundRecord>,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Default)]
struct BrokerState {
    /// (topic, partition) -> next offset
    offsets: HashMap<(String, i32), i64>,
    round_robin: u64,
    log: VecDeque<PublishedRecord>,
    /// Settlers held back in never-settle mode
    parked: VecDeque<OutcomeSettler>,
}

/// In-memory publish client
#[derive(Debug)]
pub struct InMemoryBroker {
    name: String,
    partitions: u32,
    latency: Duration,
    fail_all: Option<PublishFailure>,
    fail_topics: HashMap<String, PublishFailure>,
    never_settle: bool,
    /// `None` keeps every record
    log_capacity: Option<usize>,
    attempts: AtomicU64,
    state: Mutex<BrokerState>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            name: "memory".to_string(),
            partitions: 1,
            latency: Duration::ZERO,
            fail_all: None,
            fail_topics: HashMap::new(),
            never_settle: false,
            log_capacity: None,
            attempts: AtomicU64::new(0),
            state: Mutex::new(BrokerState::default()),
        }
    }

    /// Build from the `[broker]` section
    pub fn from_config(config: &BrokerConfig) -> Self {
        let mut broker = Self::new()
            .with_partitions(config.partitions)
            .with_latency(Duration::from_millis(config.latency_ms))
            .with_log_capacity(config.log_capacity);
        if let Some(client_id) = &config.client_id {
            broker.name = client_id.clone();
        }
        for topic in &config.fail_topics {
            broker = broker.fail_topic(
                topic.clone(),
                PublishFailure::Rejected(format!("topic '{topic}' is configured to fail")),
            );
        }
        broker
    }

    /// Partitions per topic (min 1)
    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    /// Delay before each outcome settles
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail every publish
    pub fn fail_with(mut self, failure: PublishFailure) -> Self {
        self.fail_all = Some(failure);
        self
    }

    /// Fail publishes to one topic
    pub fn fail_topic(mut self, topic: impl Into<String>, failure: PublishFailure) -> Self {
        self.fail_topics.insert(topic.into(), failure);
        self
    }

    /// Keep at most `capacity` accepted records and parked settlers
    ///
    /// The oldest entries go first. An evicted parked settler is dropped,
    /// which settles its outcome as `Abandoned`.
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = Some(capacity);
        self
    }

    /// Never settle outcomes (simulates a broker that stops answering)
    pub fn never_settle(mut self) -> Self {
        self.never_settle = true;
        self
    }

    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    /// Number of `publish` calls
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Accepted records, in acknowledgement order
    pub fn published(&self) -> Vec<PublishedRecord> {
        self.lock().log.iter().cloned().collect()
    }

    /// Accepted records for one topic
    pub fn published_to(&self, topic: &str) -> Vec<PublishedRecord> {
        self.lock()
            .log
            .iter()
            .filter(|p| p.metadata.topic == topic)
            .cloned()
            .collect()
    }

    /// Take the settlers held back in never-settle mode
    pub fn take_parked(&self) -> Vec<OutcomeSettler> {
        self.lock().parked.drain(..).collect()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn choose_partition(&self, record: &OutboundRecord, state: &mut BrokerState) -> i32 {
        let partitions = u64::from(self.partitions);
        let slot = match record.key_bytes() {
            Some(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                hasher.finish() % partitions
            }
            None => {
                let slot = state.round_robin % partitions;
                state.round_robin += 1;
                slot
            }
        };
        // partitions <= u32::MAX, slot < partitions
        i32::try_from(slot).unwrap_or(0)
    }

    fn accept(&self, record: Arc<OutboundRecord>) -> PublishOutcome {
        if let Some(failure) = self
            .fail_topics
            .get(&record.topic)
            .or(self.fail_all.as_ref())
        {
            return Err(failure.clone());
        }

        let mut state = self.lock();
        let partition = match record.partition {
            Some(p) if i64::from(p) >= i64::from(self.partitions) => {
                return Err(PublishFailure::Rejected(format!(
                    "partition {p} does not exist for topic '{}' ({} partitions)",
                    record.topic, self.partitions
                )));
            }
            Some(p) => p,
            None => self.choose_partition(&record, &mut state),
        };

        let next = state
            .offsets
            .entry((record.topic.clone(), partition))
            .or_insert(0);
        let offset = *next;
        *next += 1;

        let metadata = RecordMetadata {
            topic: record.topic.clone(),
            partition,
            offset,
            timestamp: Some(
                record
                    .timestamp
                    .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
            ),
        };
        state.log.push_back(PublishedRecord {
            record,
            metadata: metadata.clone(),
        });
        if let Some(capacity) = self.log_capacity {
            truncate_front(&mut state.log, capacity);
        }
        Ok(metadata)
    }
}

fn truncate_front<T>(queue: &mut VecDeque<T>, capacity: usize) {
    let excess = queue.len().saturating_sub(capacity);
    queue.drain(..excess);
}

impl PublishClient for InMemoryBroker {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, record: Arc<OutboundRecord>) -> OutcomeHandle {
        self.attempts.fetch_add(1, Ordering::Relaxed);

        if self.never_settle {
            let (settler, handle) = OutcomeHandle::pending();
            let mut state = self.lock();
            state.parked.push_back(settler);
            if let Some(capacity) = self.log_capacity {
                truncate_front(&mut state.parked, capacity);
            }
            drop(state);
            trace!(broker = %self.name, topic = %record.topic, "Outcome parked");
            return handle;
        }

        let topic = record.topic.clone();
        let outcome = self.accept(record);
        debug!(
            broker = %self.name,
            %topic,
            ok = outcome.is_ok(),
            "Record processed"
        );

        if self.latency.is_zero() {
            return OutcomeHandle::settled(outcome);
        }

        let (settler, handle) = OutcomeHandle::pending();
        let latency = self.latency;
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            settler.settle(outcome);
        });
        handle
    }
}
