//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{AdapterBlueprint, ContractError};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<AdapterBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<AdapterBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<AdapterBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BrokerKind, RuleConfig, SinkType};
    use serde_json::json;

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[adapter]
name = "orders-out"
topic = { template = "orders.${region}" }
partition = { static = 2 }
key = { metadata = "customer_id" }

[[sinks]]
name = "log_sink"
sink_type = "log"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.adapter.name, "orders-out");
        assert!(!bp.adapter.sync);
        assert_eq!(
            bp.adapter.topic,
            Some(RuleConfig::Template("orders.${region}".into()))
        );
        assert_eq!(bp.adapter.partition, Some(RuleConfig::Static(json!(2))));
        assert_eq!(bp.broker.kind, BrokerKind::Memory);
        assert!(bp.header_mapping.enabled);
        assert_eq!(bp.sinks[0].sink_type, SinkType::Log);
        assert_eq!(bp.sinks[0].queue_capacity, 100);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "adapter": {
                "name": "orders-out",
                "sync": true,
                "send_timeout_ms": 2500,
                "failure_sink": "errors"
            },
            "broker": { "kind": "memory", "partitions": 3 },
            "sinks": [{ "name": "errors", "sink_type": "log" }]
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert!(bp.adapter.sync);
        assert_eq!(bp.adapter.send_timeout_ms, Some(2500));
        assert_eq!(bp.broker.partitions, 3);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_rule_kind_rejected() {
        let content = r#"
[adapter]
name = "a"
topic = { script = "x" }
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("JSON"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
