//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 配置 -> 适配器 -> 进程内 Broker -> sinks 的端到端测试

#[cfg(test)]
mod contract_tests {
    use contracts::{metadata_keys, ConfigVersion};

    #[test]
    fn test_contracts_compile() {
        let _ = ConfigVersion::V1;
        assert_eq!(metadata_keys::TOPIC, "kafka_topic");
        assert_eq!(metadata_keys::RECORD_METADATA, "kafka_recordMetadata");
        assert_eq!(outbound::COMPONENT_TYPE, "kafka:outbound-channel-adapter");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        metadata_keys, Envelope, FieldRule, HeaderMapper, Message, OutboundRecord,
        OutcomeHandle, Payload, PublishClient, PublishFailure, RecordMetadata,
    };
    use outbound::{
        ChannelSink, DefaultHeaderMapper, InMemoryBroker, OutboundError, ProducerMessageHandler,
        Routed, SinkHandle,
    };
    use serde_json::json;

    /// Acknowledges everything at a fixed offset
    struct FixedOffsetClient {
        offset: i64,
    }

    impl PublishClient for FixedOffsetClient {
        fn name(&self) -> &str {
            "fixed-offset"
        }

        fn publish(&self, record: Arc<OutboundRecord>) -> OutcomeHandle {
            OutcomeHandle::settled(Ok(RecordMetadata {
                topic: record.topic.clone(),
                partition: record.partition.unwrap_or(0),
                offset: self.offset,
                timestamp: record.timestamp,
            }))
        }
    }

    fn channel(name: &str) -> (SinkHandle, tokio::sync::mpsc::UnboundedReceiver<Envelope>) {
        let (sink, rx) = ChannelSink::new(name);
        (SinkHandle::spawn(sink, 16), rx)
    }

    /// `{payload: "hello", topic: "orders"}`, async, acked at offset 42
    #[tokio::test]
    async fn test_async_success_reaches_output_sink() {
        let (output, mut rx) = channel("out");
        let handler = ProducerMessageHandler::builder(Arc::new(FixedOffsetClient { offset: 42 }))
            .name("e2e")
            .output_sink(output.sender())
            .build()
            .unwrap();

        let message = Message::builder("hello").with_topic("orders").build();
        let dispatched = handler.handle(message).await.unwrap();
        assert!(dispatched.acknowledged().is_none());
        assert_eq!(dispatched.routed().await, Routed::Forwarded);

        let Some(Envelope::Message(enriched)) = rx.recv().await else {
            panic!("expected an enriched message");
        };
        assert_eq!(enriched.payload(), &Payload::Text("hello".into()));
        assert_eq!(enriched.get(metadata_keys::TOPIC), Some(&json!("orders")));
        assert_eq!(
            enriched.get(metadata_keys::RECORD_METADATA).and_then(|m| m.get("offset")),
            Some(&json!(42))
        );

        output.shutdown().await;
    }

    #[tokio::test]
    async fn test_tombstone_is_still_published() {
        let broker = Arc::new(InMemoryBroker::new());
        let handler = ProducerMessageHandler::builder(broker.clone())
            .build()
            .unwrap();

        let message = Message::builder(serde_json::Value::Null)
            .with_topic("tombstones")
            .build();
        let dispatched = handler.handle(message).await.unwrap();
        dispatched.outcome().wait().await;

        assert_eq!(broker.attempts(), 1);
        let published = broker.published_to("tombstones");
        assert_eq!(published.len(), 1);
        assert!(published[0].record.is_tombstone());
    }

    /// sync, default timeout, broker unavailable
    #[tokio::test]
    async fn test_sync_failure_reaches_caller_and_failure_sink() {
        let broker = Arc::new(
            InMemoryBroker::new().fail_with(PublishFailure::BrokerUnavailable("down".into())),
        );
        let (errors, mut rx) = channel("errors");
        let handler = ProducerMessageHandler::builder(broker)
            .sync(true)
            .failure_sink(errors.sender())
            .build()
            .unwrap();

        let message = Message::builder("x").with_topic("orders").build();
        let err = handler.handle(message).await.unwrap_err();
        assert!(err.is_publish_failure());
        assert_eq!(
            err.publish_failure(),
            Some(&PublishFailure::BrokerUnavailable("down".into()))
        );

        let Some(Envelope::Error(error)) = rx.recv().await else {
            panic!("expected an error message");
        };
        assert_eq!(
            error.payload().cause(),
            &PublishFailure::BrokerUnavailable("down".into())
        );
        assert_eq!(error.payload().record().topic, "orders");
        assert!(error.original_message().is_some());

        errors.shutdown().await;
    }

    #[tokio::test]
    async fn test_partition_rule_overrides_metadata() {
        let broker = Arc::new(InMemoryBroker::new().with_partitions(4));
        let handler = ProducerMessageHandler::builder(broker.clone())
            .partition(FieldRule::fixed(2))
            .sync(true)
            .build()
            .unwrap();

        let message = Message::builder("x")
            .with_topic("orders")
            .with_partition(0)
            .build();
        let dispatched = handler.handle(message).await.unwrap();

        assert_eq!(dispatched.acknowledged().map(|m| m.partition), Some(2));
        assert_eq!(broker.published()[0].record.partition, Some(2));
    }

    #[tokio::test]
    async fn test_missing_topic_makes_no_attempt() {
        let broker = Arc::new(InMemoryBroker::new());
        let handler = ProducerMessageHandler::builder(broker.clone())
            .build()
            .unwrap();

        let err = handler.handle(Message::new("x")).await.unwrap_err();
        assert!(matches!(err, OutboundError::Precondition { .. }));

        let err = handler
            .handle(Message::builder("x").with_topic("  ").build())
            .await
            .unwrap_err();
        assert!(err.is_rejected_before_dispatch());

        assert_eq!(broker.attempts(), 0);
        assert_eq!(handler.metrics().rejected, 2);
    }

    /// Broker slower than the default 10s sync timeout
    fn slow_broker() -> Arc<InMemoryBroker> {
        Arc::new(InMemoryBroker::new().with_latency(Duration::from_secs(60)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_timeout_waits_past_default() {
        let handler = ProducerMessageHandler::builder(slow_broker())
            .sync(true)
            .send_timeout_rule(FieldRule::fixed(-1))
            .build()
            .unwrap();

        let started = tokio::time::Instant::now();
        let dispatched = handler
            .handle(Message::builder("x").with_topic("orders").build())
            .await
            .unwrap();
        assert_eq!(dispatched.acknowledged().map(|m| m.offset), Some(0));
        assert!(started.elapsed() >= Duration::from_secs(60));
        assert_eq!(handler.metrics().timed_out, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_timeout_waits_past_default() {
        let handler = ProducerMessageHandler::builder(slow_broker())
            .sync(true)
            .send_timeout_rule(FieldRule::metadata("deadline"))
            .build()
            .unwrap();

        let dispatched = handler
            .handle(Message::builder("x").with_topic("orders").build())
            .await
            .unwrap();
        assert_eq!(dispatched.acknowledged().map(|m| m.topic.as_str()), Some("orders"));
        assert_eq!(handler.metrics().timed_out, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_timeout_expires_before_slow_broker() {
        let handler = ProducerMessageHandler::builder(slow_broker())
            .sync(true)
            .build()
            .unwrap();

        let err = handler
            .handle(Message::builder("x").with_topic("orders").build())
            .await
            .unwrap_err();
        assert!(matches!(err, OutboundError::Timeout { timeout_ms: 10_000, .. }));
    }

    #[tokio::test]
    async fn test_sync_timeout_is_not_a_publish_failure() {
        let broker = Arc::new(InMemoryBroker::new().with_latency(Duration::from_millis(500)));
        let handler = ProducerMessageHandler::builder(broker)
            .sync(true)
            .send_timeout(Some(Duration::from_millis(20)))
            .build()
            .unwrap();

        let err = handler
            .handle(Message::builder("x").with_topic("orders").build())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(!err.is_publish_failure());
        assert_eq!(handler.metrics().timed_out, 1);
    }

    #[test]
    fn test_header_mapping_is_idempotent() {
        let mapper = DefaultHeaderMapper::default();
        let message = Message::builder("x")
            .with_topic("orders")
            .with_metadata("trace", "t-1")
            .with_metadata("attempt", 3)
            .build();

        let first = mapper.from_metadata(message.metadata());
        let second = mapper.from_metadata(message.metadata());
        assert_eq!(first, second);
        assert!(first.get("trace").is_some());
        assert!(first.get(metadata_keys::TOPIC).is_none());
    }
}

#[cfg(test)]
mod config_e2e_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use observability::PublishStatsAggregator;
    use outbound::AdapterFactory;
    use serde_json::{json, Value};

    fn blueprint_toml(dir: &std::path::Path) -> String {
        format!(
            r#"
[adapter]
name = "orders-out"
topic = {{ template = "orders.${{region}}" }}
key = {{ metadata = "customer" }}
output_sink = "acks"
failure_sink = "errors"

[broker]
kind = "memory"
partitions = 3
fail_topics = ["orders.blocked"]

[[sinks]]
name = "acks"
sink_type = "file"
[sinks.params]
path = "{acks}"

[[sinks]]
name = "errors"
sink_type = "file"
[sinks.params]
path = "{errors}"
"#,
            acks = dir.join("acks.jsonl").display(),
            errors = dir.join("errors.jsonl").display(),
        )
    }

    fn read_lines(path: &std::path::Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    /// Config -> AdapterFactory -> in-memory broker -> file sinks
    #[tokio::test]
    async fn test_config_driven_adapter_routes_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let blueprint =
            ConfigLoader::load_from_str(&blueprint_toml(dir.path()), ConfigFormat::Toml).unwrap();
        let adapter = AdapterFactory::build(&blueprint).unwrap();

        let mut stats = PublishStatsAggregator::new();
        for (region, customer) in [("eu", "c-1"), ("us", "c-2"), ("blocked", "c-3")] {
            let message = contracts::Message::builder(json!({"customer": customer}))
                .with_metadata("region", region)
                .with_metadata("customer", customer)
                .build();
            let dispatched = adapter.handler.handle(message).await.unwrap();
            let outcome = dispatched.outcome().wait().await;
            stats.update(&outcome, 0.0);
            dispatched.routed().await;
        }

        let metrics = adapter.handler.metrics();
        assert_eq!(metrics.attempts, 3);
        assert_eq!(metrics.forwarded, 2);
        assert_eq!(metrics.failures_forwarded, 1);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 1);

        adapter.shutdown().await;

        let acks = read_lines(&dir.path().join("acks.jsonl"));
        assert_eq!(acks.len(), 2);
        assert!(acks.iter().all(|a| a["kind"] == "message"));
        assert_eq!(
            acks[0]["message"]["metadata"]["kafka_recordMetadata"]["topic"],
            json!("orders.eu")
        );

        let errors = read_lines(&dir.path().join("errors.jsonl"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["kind"], "error");
        assert_eq!(errors[0]["record"]["topic"], "orders.blocked");
        assert_eq!(errors[0]["record"]["key"], "c-3");
        assert_eq!(errors[0]["metadata"]["kafka_topic"], "orders.blocked");
    }

    #[test]
    fn test_invalid_reference_rejected_before_build() {
        let content = r#"
[adapter]
name = "orders-out"
output_sink = "nowhere"
"#;
        let err = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("adapter.output_sink"));
    }
}
