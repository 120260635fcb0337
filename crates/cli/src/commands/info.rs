//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{metadata_keys, AdapterBlueprint, RuleConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    adapter: AdapterInfo,
    broker: BrokerInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    header_patterns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct AdapterInfo {
    name: String,
    component_type: &'static str,
    mode: &'static str,
    send_timeout: String,
    topic: String,
    partition: String,
    key: String,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_sink: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_sink: Option<String>,
}

#[derive(Serialize)]
struct BrokerInfo {
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    bootstrap_servers: Option<String>,
    header_mapping: bool,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

/// Human-readable form of a resolution rule
fn describe_rule(rule: Option<&RuleConfig>, default_key: &str) -> String {
    match rule {
        Some(RuleConfig::Static(value)) => format!("static {value}"),
        Some(RuleConfig::Metadata(key)) => format!("metadata '{key}'"),
        Some(RuleConfig::Template(raw)) => format!("template \"{raw}\""),
        None => format!("metadata '{default_key}' (default)"),
    }
}

fn describe_timeout(blueprint: &AdapterBlueprint) -> String {
    let adapter = &blueprint.adapter;
    match (&adapter.send_timeout, adapter.send_timeout_ms) {
        (Some(rule), _) => describe_rule(Some(rule), ""),
        (None, Some(ms)) if ms < 0 => "unbounded".to_string(),
        (None, Some(ms)) => format!("{ms}ms"),
        (None, None) => format!("{}ms (default)", contracts::DEFAULT_SEND_TIMEOUT_MS),
    }
}

fn build_config_info(blueprint: &AdapterBlueprint, args: &InfoArgs) -> ConfigInfo {
    let adapter = &blueprint.adapter;

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
            })
            .collect()
    } else {
        Vec::new()
    };

    let header_patterns = if args.headers && blueprint.header_mapping.enabled {
        blueprint.header_mapping.patterns.clone()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        adapter: AdapterInfo {
            name: adapter.name.clone(),
            component_type: outbound::COMPONENT_TYPE,
            mode: if adapter.sync { "sync" } else { "async" },
            send_timeout: describe_timeout(blueprint),
            topic: describe_rule(adapter.topic.as_ref(), metadata_keys::TOPIC),
            partition: describe_rule(adapter.partition.as_ref(), metadata_keys::PARTITION_ID),
            key: describe_rule(adapter.key.as_ref(), metadata_keys::MESSAGE_KEY),
            timestamp: describe_rule(adapter.timestamp.as_ref(), metadata_keys::TIMESTAMP),
            output_sink: adapter.output_sink.clone(),
            failure_sink: adapter.failure_sink.clone(),
        },
        broker: BrokerInfo {
            kind: format!("{:?}", blueprint.broker.kind),
            bootstrap_servers: blueprint.broker.bootstrap_servers.clone(),
            header_mapping: blueprint.header_mapping.enabled,
        },
        header_patterns,
        sinks,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Kafka Outbound Configuration                   ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let adapter = &info.adapter;
    println!("📤 Adapter");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Name: {} ({})", adapter.name, adapter.component_type);
    println!("   ├─ Mode: {}", adapter.mode);
    println!("   ├─ Send timeout: {}", adapter.send_timeout);
    println!("   ├─ Topic: {}", adapter.topic);
    println!("   ├─ Partition: {}", adapter.partition);
    println!("   ├─ Key: {}", adapter.key);
    println!("   ├─ Timestamp: {}", adapter.timestamp);
    println!(
        "   ├─ Output sink: {}",
        adapter.output_sink.as_deref().unwrap_or("(none)")
    );
    println!(
        "   └─ Failure sink: {}",
        adapter.failure_sink.as_deref().unwrap_or("(none, failures logged)")
    );

    println!("\n🔌 Broker");
    println!("   ├─ Kind: {}", info.broker.kind);
    if let Some(servers) = &info.broker.bootstrap_servers {
        println!("   ├─ Bootstrap servers: {}", servers);
    }
    println!(
        "   └─ Header mapping: {}",
        if info.broker.header_mapping { "on" } else { "off" }
    );

    if !info.header_patterns.is_empty() {
        println!("\n🏷  Header Patterns");
        for (i, pattern) in info.header_patterns.iter().enumerate() {
            let prefix = if i == info.header_patterns.len() - 1 { "└─" } else { "├─" };
            println!("   {} {}", prefix, pattern);
        }
    }

    if !info.sinks.is_empty() {
        println!("\n📦 Sinks ({})", info.sinks.len());
        for (i, sink) in info.sinks.iter().enumerate() {
            let prefix = if i == info.sinks.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {} {} ({}, queue={})",
                prefix, sink.name, sink.sink_type, sink.queue_capacity
            );
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};
    use serde_json::json;

    #[test]
    fn test_describe_rules() {
        assert_eq!(
            describe_rule(Some(&RuleConfig::Static(json!(2))), "x"),
            "static 2"
        );
        assert_eq!(
            describe_rule(None, metadata_keys::TOPIC),
            "metadata 'kafka_topic' (default)"
        );
    }

    #[test]
    fn test_build_info() {
        let bp = ConfigLoader::load_from_str(
            r#"
[adapter]
name = "orders-out"
send_timeout_ms = -1
topic = { template = "orders.${region}" }
failure_sink = "errors"

[[sinks]]
name = "errors"
sink_type = "log"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();
        let args = InfoArgs {
            config: "adapter.toml".into(),
            json: true,
            headers: true,
            sinks: true,
        };

        let info = build_config_info(&bp, &args);
        assert_eq!(info.adapter.topic, "template \"orders.${region}\"");
        assert_eq!(info.adapter.send_timeout, "unbounded");
        assert_eq!(info.adapter.component_type, "kafka:outbound-channel-adapter");
        assert_eq!(info.sinks.len(), 1);
        assert_eq!(info.header_patterns.len(), 4);
    }
}
