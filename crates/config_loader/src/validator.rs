//! 配置校验模块
//!
//! 校验规则：
//! - 字段级约束 (`validator` derive: 名称非空, partitions >= 1, queue_capacity >= 1)
//! - sink 名称唯一
//! - output_sink / failure_sink 引用的 sink 存在
//! - 所有解析规则可编译 (模板语法)
//! - send_timeout_ms 与 send_timeout 互斥
//! - kafka broker 需要 bootstrap_servers

use std::collections::HashSet;

use contracts::{AdapterBlueprint, BrokerKind, ContractError, RuleConfig};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 校验 AdapterBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &AdapterBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_sink_names(blueprint)?;
    validate_sink_references(blueprint)?;
    validate_rules(blueprint)?;
    validate_send_timeout(blueprint)?;
    validate_broker(blueprint)?;
    Ok(())
}

/// 字段级约束
fn validate_fields(blueprint: &AdapterBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let (field, message) = first_error(&errors);
        ContractError::config_validation(field, message)
    })
}

/// 取第一条字段错误 (路径, 描述)
fn first_error(errors: &ValidationErrors) -> (String, String) {
    let mut flat = Vec::new();
    flatten(errors, "", &mut flat);
    flat.sort();
    flat.into_iter()
        .next()
        .unwrap_or_else(|| ("blueprint".to_string(), errors.to_string()))
}

/// 展开嵌套错误为 `adapter.name` / `sinks[0].name` 形式的路径
fn flatten(errors: &ValidationErrors, prefix: &str, out: &mut Vec<(String, String)>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                for err in errs {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string());
                    out.push((path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(nested) => flatten(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (idx, nested) in items {
                    flatten(nested, &format!("{path}[{idx}]"), out);
                }
            }
        }
    }
}

/// 校验 sink 名称唯一性
fn validate_sink_names(blueprint: &AdapterBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                format!("duplicate sink name '{}'", sink.name),
            ));
        }
    }
    Ok(())
}

/// 校验输出通道引用
fn validate_sink_references(blueprint: &AdapterBlueprint) -> Result<(), ContractError> {
    let names: HashSet<_> = blueprint.sinks.iter().map(|s| s.name.as_str()).collect();
    let references = [
        ("adapter.output_sink", &blueprint.adapter.output_sink),
        ("adapter.failure_sink", &blueprint.adapter.failure_sink),
    ];

    for (field, reference) in references {
        if let Some(name) = reference {
            if !names.contains(name.as_str()) {
                return Err(ContractError::config_validation(
                    field,
                    format!("sink '{name}' is not defined in [[sinks]]"),
                ));
            }
        }
    }
    Ok(())
}

/// 校验解析规则可编译
fn validate_rules(blueprint: &AdapterBlueprint) -> Result<(), ContractError> {
    let adapter = &blueprint.adapter;
    let rules: [(&str, &Option<RuleConfig>); 5] = [
        ("adapter.topic", &adapter.topic),
        ("adapter.partition", &adapter.partition),
        ("adapter.key", &adapter.key),
        ("adapter.timestamp", &adapter.timestamp),
        ("adapter.send_timeout", &adapter.send_timeout),
    ];

    for (field, rule) in rules {
        if let Some(rule) = rule {
            rule.to_rule()
                .map_err(|e| ContractError::config_validation(field, e.to_string()))?;
        }
    }

    // 静态 topic 不能为空
    if let Some(RuleConfig::Static(value)) = &adapter.topic {
        let blank = value.is_null() || value.as_str().is_some_and(|s| s.trim().is_empty());
        if blank {
            return Err(ContractError::config_validation(
                "adapter.topic",
                "static topic cannot be empty",
            ));
        }
    }
    Ok(())
}

/// 校验发送超时配置
fn validate_send_timeout(blueprint: &AdapterBlueprint) -> Result<(), ContractError> {
    let adapter = &blueprint.adapter;
    if adapter.send_timeout_ms.is_some() && adapter.send_timeout.is_some() {
        return Err(ContractError::config_validation(
            "adapter.send_timeout",
            "send_timeout_ms and send_timeout are mutually exclusive",
        ));
    }
    Ok(())
}

/// 校验 Broker 配置
fn validate_broker(blueprint: &AdapterBlueprint) -> Result<(), ContractError> {
    let broker = &blueprint.broker;
    if broker.kind == BrokerKind::Kafka
        && broker
            .bootstrap_servers
            .as_deref()
            .is_none_or(|s| s.trim().is_empty())
    {
        return Err(ContractError::config_validation(
            "broker.bootstrap_servers",
            "bootstrap_servers is required for kafka brokers",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        AdapterConfig, BrokerConfig, ConfigVersion, HeaderMappingConfig, SinkConfig, SinkType,
    };
    use serde_json::json;
    use std::collections::HashMap;

    fn minimal_blueprint() -> AdapterBlueprint {
        AdapterBlueprint {
            version: ConfigVersion::V1,
            adapter: AdapterConfig {
                name: "orders-out".into(),
                sync: false,
                send_timeout_ms: None,
                send_timeout: None,
                topic: Some(RuleConfig::Static(json!("orders"))),
                partition: None,
                key: None,
                timestamp: None,
                output_sink: Some("log".into()),
                failure_sink: None,
            },
            header_mapping: HeaderMappingConfig::default(),
            broker: BrokerConfig::default(),
            sinks: vec![SinkConfig {
                name: "log".into(),
                sink_type: SinkType::Log,
                queue_capacity: 10,
                params: HashMap::new(),
            }],
        }
    }

    #[test]
    fn test_valid_blueprint() {
        assert!(validate(&minimal_blueprint()).is_ok());
    }

    #[test]
    fn test_empty_adapter_name() {
        let mut bp = minimal_blueprint();
        bp.adapter.name.clear();
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("adapter name cannot be empty"));
        assert!(err.to_string().contains("adapter.name"));
    }

    #[test]
    fn test_zero_partitions() {
        let mut bp = minimal_blueprint();
        bp.broker.partitions = 0;
        assert!(validate(&bp).is_err());

        let mut bp = minimal_blueprint();
        bp.sinks[0].queue_capacity = 0;
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("sinks[0].queue_capacity"));
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(bp.sinks[0].clone());
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_unknown_failure_sink() {
        let mut bp = minimal_blueprint();
        bp.adapter.failure_sink = Some("errors".into());
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("adapter.failure_sink"));
    }

    #[test]
    fn test_bad_template() {
        let mut bp = minimal_blueprint();
        bp.adapter.key = Some(RuleConfig::Template("${unclosed".into()));
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("adapter.key"));
    }

    #[test]
    fn test_blank_static_topic() {
        let mut bp = minimal_blueprint();
        bp.adapter.topic = Some(RuleConfig::Static(json!("  ")));
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_timeout_settings_exclusive() {
        let mut bp = minimal_blueprint();
        bp.adapter.send_timeout_ms = Some(100);
        bp.adapter.send_timeout = Some(RuleConfig::Metadata("deadline".into()));
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_kafka_requires_servers() {
        let mut bp = minimal_blueprint();
        bp.broker.kind = BrokerKind::Kafka;
        assert!(validate(&bp).is_err());

        bp.broker.bootstrap_servers = Some("localhost:9092".into());
        assert!(validate(&bp).is_ok());
    }
}
