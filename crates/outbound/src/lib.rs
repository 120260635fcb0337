//! # Outbound
//!
//! 出站发布适配器。
//!
//! 负责：
//! - 从消息解析 topic / partition / key / timestamp
//! - 构建 Broker 记录并异步发布
//! - 将发布结果路由到输出通道或失败通道
//! - 同步模式下有界等待 Broker 确认

pub mod broker;
pub mod dispatcher;
pub mod error;
pub mod error_strategy;
pub mod factory;
pub mod handle;
pub mod handler;
pub mod header_mapper;
pub mod metrics;
pub mod record_builder;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod sinks;
pub mod sync_gate;

pub use broker::{InMemoryBroker, PublishedRecord};
#[cfg(feature = "kafka")]
pub use broker::KafkaPublishClient;
pub use contracts::{Envelope, Message, MessageSink, PublishClient};
pub use dispatcher::Dispatcher;
pub use error::{OutboundError, RecordField};
pub use error_strategy::DefaultErrorMessageStrategy;
pub use factory::{create_client, Adapter, AdapterFactory};
pub use handle::{SinkHandle, SinkRef};
pub use handler::{Dispatched, ProducerMessageHandler, ProducerMessageHandlerBuilder, COMPONENT_TYPE};
pub use header_mapper::{DefaultHeaderMapper, JSON_TYPES_HEADER};
pub use metrics::{PublishMetrics, PublishSnapshot, SinkMetrics, SinkSnapshot};
pub use record_builder::RecordBuilder;
pub use registry::{create_sink_handle, SinkRegistry};
pub use resolver::FieldResolver;
pub use router::{OutcomeRouter, Routed};
pub use sinks::{ChannelSink, FileSink, FileSinkConfig, LogSink};
pub use sync_gate::SyncGate;
