//! AdapterFactory - AdapterBlueprint to running adapter
//!
//! Creates the sinks, the broker client and the handler in that order, so
//! named sinks can be resolved while the handler is built.

use std::sync::Arc;
use tracing::{info, instrument};

use contracts::{AdapterBlueprint, BrokerConfig, BrokerKind, FieldRule, PublishClient, RuleConfig};

use crate::broker::InMemoryBroker;
use crate::error::OutboundError;
use crate::handler::ProducerMessageHandler;
use crate::header_mapper::DefaultHeaderMapper;
use crate::registry::{create_sink_handle, SinkRegistry};

/// A configured adapter: handler plus the sinks it routes to
pub struct Adapter {
    pub handler: ProducerMessageHandler,
    pub registry: SinkRegistry,
    pub client: Arc<dyn PublishClient>,
}

impl Adapter {
    /// Drain and close all sinks
    pub async fn shutdown(self) {
        self.registry.shutdown().await;
    }
}

/// Builds adapters from blueprints
pub struct AdapterFactory;

impl AdapterFactory {
    /// Build with the broker client described in the blueprint
    #[instrument(name = "adapter_factory_build", skip(blueprint), fields(adapter = %blueprint.adapter.name))]
    pub fn build(blueprint: &AdapterBlueprint) -> Result<Adapter, OutboundError> {
        let client = create_client(&blueprint.broker)?;
        Self::build_with_client(blueprint, client)
    }

    /// Build around an existing broker client
    pub fn build_with_client(
        blueprint: &AdapterBlueprint,
        client: Arc<dyn PublishClient>,
    ) -> Result<Adapter, OutboundError> {
        let mut registry = SinkRegistry::new();
        for sink_config in &blueprint.sinks {
            registry.register(create_sink_handle(sink_config)?)?;
        }

        let adapter = &blueprint.adapter;
        let mut builder = ProducerMessageHandler::builder(Arc::clone(&client))
            .name(&adapter.name)
            .sync(adapter.sync)
            .send_timeout_rule(adapter.send_timeout_rule()?)
            .sink_send_timeout(adapter.sink_send_timeout());

        if let Some(rule) = compile(&adapter.topic)? {
            builder = builder.topic(rule);
        }
        if let Some(rule) = compile(&adapter.partition)? {
            builder = builder.partition(rule);
        }
        if let Some(rule) = compile(&adapter.key)? {
            builder = builder.key(rule);
        }
        if let Some(rule) = compile(&adapter.timestamp)? {
            builder = builder.timestamp(rule);
        }

        builder = if blueprint.header_mapping.enabled {
            builder.header_mapper(Arc::new(DefaultHeaderMapper::new(
                &blueprint.header_mapping.patterns,
            )))
        } else {
            builder.without_header_mapping()
        };

        if let Some(name) = &adapter.output_sink {
            builder = builder.output_sink(registry.resolve(name)?);
        }
        if let Some(name) = &adapter.failure_sink {
            builder = builder.failure_sink_name(name);
        }

        let handler = builder.build_with_registry(&registry)?;
        info!(
            adapter = handler.name(),
            client = client.name(),
            sync = handler.is_sync(),
            sinks = registry.len(),
            "Adapter built"
        );

        Ok(Adapter {
            handler,
            registry,
            client,
        })
    }
}

fn compile(rule: &Option<RuleConfig>) -> Result<Option<FieldRule>, OutboundError> {
    Ok(rule.as_ref().map(RuleConfig::to_rule).transpose()?)
}

/// Create the broker client for a `[broker]` section
pub fn create_client(config: &BrokerConfig) -> Result<Arc<dyn PublishClient>, OutboundError> {
    match config.kind {
        BrokerKind::Memory => Ok(Arc::new(InMemoryBroker::from_config(config))),
        #[cfg(feature = "kafka")]
        BrokerKind::Kafka => Ok(Arc::new(crate::broker::KafkaPublishClient::from_config(
            config,
        )?)),
        #[cfg(not(feature = "kafka"))]
        BrokerKind::Kafka => Err(OutboundError::configuration(
            "broker kind 'kafka' requires the `kafka` feature",
        )),
    }
}
