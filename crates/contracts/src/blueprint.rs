//! AdapterBlueprint - Config Loader 输出
//!
//! 描述一个完整的出站适配器：字段解析规则、同步策略、头映射、Broker 连接、输出路由。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

use crate::{ContractError, FieldRule};

/// 默认同步发送超时 (毫秒)
pub const DEFAULT_SEND_TIMEOUT_MS: i64 = 10_000;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的适配器配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdapterBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 适配器设置
    #[validate(nested)]
    pub adapter: AdapterConfig,

    /// 头映射策略
    #[serde(default)]
    pub header_mapping: HeaderMappingConfig,

    /// Broker 连接
    #[serde(default)]
    #[validate(nested)]
    pub broker: BrokerConfig,

    /// 输出路由配置
    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

/// 适配器设置：解析规则、同步模式、输出通道
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdapterConfig {
    /// 适配器名称 (用于日志/指标)
    #[validate(length(min = 1, message = "adapter name cannot be empty"))]
    pub name: String,

    /// 同步模式：等待 Broker 确认后返回
    #[serde(default)]
    pub sync: bool,

    /// 静态发送超时 (毫秒, 负数 = 无限等待)
    #[serde(default)]
    pub send_timeout_ms: Option<i64>,

    /// 按消息动态解析的发送超时
    #[serde(default)]
    pub send_timeout: Option<RuleConfig>,

    /// Topic 解析规则 (缺省读取 `kafka_topic`)
    #[serde(default)]
    pub topic: Option<RuleConfig>,

    /// 分区解析规则 (缺省读取 `kafka_partitionId`)
    #[serde(default)]
    pub partition: Option<RuleConfig>,

    /// Key 解析规则 (缺省读取 `kafka_messageKey`)
    #[serde(default)]
    pub key: Option<RuleConfig>,

    /// 时间戳解析规则 (缺省读取 `kafka_timestamp`)
    #[serde(default)]
    pub timestamp: Option<RuleConfig>,

    /// 成功输出通道 (sink 名称)
    #[serde(default)]
    pub output_sink: Option<String>,

    /// 失败输出通道 (sink 名称)
    #[serde(default)]
    pub failure_sink: Option<String>,
}

impl AdapterConfig {
    /// 解析发送超时规则
    ///
    /// 动态规则优先；否则使用静态值或默认 10s。
    pub fn send_timeout_rule(&self) -> Result<FieldRule, ContractError> {
        match (&self.send_timeout, self.send_timeout_ms) {
            (Some(rule), _) => rule.to_rule(),
            (None, Some(ms)) => Ok(FieldRule::fixed(ms)),
            (None, None) => Ok(FieldRule::fixed(DEFAULT_SEND_TIMEOUT_MS)),
        }
    }

    /// 输出/失败通道的入队超时
    ///
    /// 只取静态值 (动态规则不参与)；负数表示无限等待。
    pub fn sink_send_timeout(&self) -> Option<Duration> {
        let millis = self.send_timeout_ms.unwrap_or(DEFAULT_SEND_TIMEOUT_MS);
        u64::try_from(millis).ok().map(Duration::from_millis)
    }
}

/// 字段解析规则 (配置形式)
///
/// ```toml
/// topic = { template = "orders.${region}" }
/// partition = { static = 2 }
/// key = { metadata = "customer_id" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleConfig {
    /// 固定值
    Static(Value),
    /// 读取元数据键
    Metadata(String),
    /// `${path}` 模板
    Template(String),
}

impl RuleConfig {
    /// 编译为运行时规则
    pub fn to_rule(&self) -> Result<FieldRule, ContractError> {
        match self {
            RuleConfig::Static(value) => Ok(FieldRule::Static(value.clone())),
            RuleConfig::Metadata(key) => Ok(FieldRule::metadata(key.clone())),
            RuleConfig::Template(raw) => FieldRule::template(raw),
        }
    }
}

/// 头映射配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderMappingConfig {
    /// 是否启用
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 有序匹配模式 (`!` 前缀表示排除, `*` 通配)
    #[serde(default = "default_header_patterns")]
    pub patterns: Vec<String>,
}

impl Default for HeaderMappingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            patterns: default_header_patterns(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// 默认头映射模式
pub fn default_header_patterns() -> Vec<String> {
    vec![
        "!id".to_string(),
        "!timestamp".to_string(),
        "!kafka_*".to_string(),
        "*".to_string(),
    ]
}

/// Broker 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerKind {
    /// 进程内 Broker (测试/演示)
    #[default]
    Memory,
    /// librdkafka 客户端 (需要 `kafka` feature)
    Kafka,
}

/// Broker 连接配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BrokerConfig {
    /// Broker 类型
    #[serde(default)]
    pub kind: BrokerKind,

    /// Kafka bootstrap servers
    #[serde(default)]
    pub bootstrap_servers: Option<String>,

    /// 客户端 ID
    #[serde(default)]
    pub client_id: Option<String>,

    /// 透传给客户端的额外属性
    #[serde(default)]
    pub properties: HashMap<String, String>,

    /// 进程内 Broker: 每个 topic 的分区数
    #[serde(default = "default_partitions")]
    #[validate(range(min = 1, message = "partitions must be >= 1"))]
    pub partitions: u32,

    /// 进程内 Broker: 确认延迟 (毫秒)
    #[serde(default)]
    pub latency_ms: u64,

    /// 进程内 Broker: 总是失败的 topic
    #[serde(default)]
    pub fail_topics: Vec<String>,

    /// 进程内 Broker: 保留的已确认记录条数 (超出后丢弃最旧的)
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: BrokerKind::Memory,
            bootstrap_servers: None,
            client_id: None,
            properties: HashMap::new(),
            partitions: default_partitions(),
            latency_ms: 0,
            fail_topics: Vec::new(),
            log_capacity: default_log_capacity(),
        }
    }
}

fn default_partitions() -> u32 {
    1
}

fn default_log_capacity() -> usize {
    1_000
}

/// Sink 配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink 名称
    #[validate(length(min = 1, message = "sink name cannot be empty"))]
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1, message = "queue_capacity must be >= 1"))]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// JSON Lines 文件输出
    File,
}
