//! KafkaPublishClient - librdkafka `FutureProducer` behind `PublishClient`

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;

use contracts::{
    BrokerConfig, ContractError, OutboundRecord, OutcomeHandle, PublishClient, PublishFailure,
    RecordMetadata,
};

/// How long `send` may wait for space in the local producer queue
const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Publish client backed by a librdkafka producer
///
/// Delivery retries are left to librdkafka (`retries`, `delivery.timeout.ms`).
pub struct KafkaPublishClient {
    name: String,
    producer: Arc<FutureProducer>,
}

impl KafkaPublishClient {
    /// Create a producer from the `[broker]` section
    pub fn from_config(config: &BrokerConfig) -> Result<Self, ContractError> {
        let servers = config
            .bootstrap_servers
            .as_deref()
            .ok_or_else(|| ContractError::broker_client("bootstrap_servers is required"))?;
        let name = config
            .client_id
            .clone()
            .unwrap_or_else(|| "kafka-outbound".to_string());

        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", servers)
            .set("client.id", &name);
        for (key, value) in &config.properties {
            client_config.set(key, value);
        }

        let producer: FutureProducer = client_config
            .create()
            .map_err(|e| ContractError::broker_client(e.to_string()))?;

        debug!(client = %name, %servers, "Kafka producer created");
        Ok(Self {
            name,
            producer: Arc::new(producer),
        })
    }
}

fn to_failure(error: &KafkaError) -> PublishFailure {
    match error.rdkafka_error_code() {
        Some(
            RDKafkaErrorCode::AllBrokersDown
            | RDKafkaErrorCode::BrokerTransportFailure
            | RDKafkaErrorCode::NetworkException,
        ) => PublishFailure::BrokerUnavailable(error.to_string()),
        Some(RDKafkaErrorCode::MessageTimedOut | RDKafkaErrorCode::RequestTimedOut) => {
            PublishFailure::TimedOut(error.to_string())
        }
        _ => PublishFailure::Rejected(error.to_string()),
    }
}

impl PublishClient for KafkaPublishClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, record: Arc<OutboundRecord>) -> OutcomeHandle {
        let (settler, handle) = OutcomeHandle::pending();
        let producer = Arc::clone(&self.producer);
        let client = self.name.clone();

        tokio::spawn(async move {
            let key = record.key_bytes();
            let payload = record.payload_bytes();

            let mut headers = OwnedHeaders::new();
            for header in record.headers.iter() {
                headers = headers.insert(Header {
                    key: header.key.as_str(),
                    value: Some(header.value.as_ref()),
                });
            }

            let mut future_record = FutureRecord::<[u8], [u8]>::to(&record.topic).headers(headers);
            if let Some(key) = key.as_deref() {
                future_record = future_record.key(key);
            }
            if let Some(payload) = payload.as_deref() {
                future_record = future_record.payload(payload);
            }
            if let Some(partition) = record.partition {
                future_record = future_record.partition(partition);
            }
            if let Some(timestamp) = record.timestamp {
                future_record = future_record.timestamp(timestamp);
            }

            let outcome = match producer
                .send(future_record, Timeout::After(ENQUEUE_TIMEOUT))
                .await
            {
                Ok((partition, offset)) => Ok(RecordMetadata {
                    topic: record.topic.clone(),
                    partition,
                    offset,
                    timestamp: record.timestamp,
                }),
                Err((error, _)) => {
                    warn!(client = %client, topic = %record.topic, error = %error, "Kafka delivery failed");
                    Err(to_failure(&error))
                }
            };
            settler.settle(outcome);
        });

        handle
    }
}
