//! `send` command implementation.

use anyhow::{Context, Result};
use contracts::{AdapterBlueprint, RuleConfig};
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::SendArgs;
use crate::error::CliError;
use crate::pipeline::{Publisher, SendConfig};

/// Execute the `send` command
pub async fn run_send(args: &SendArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args);
    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after applying CLI overrides")?;

    info!(
        adapter = %blueprint.adapter.name,
        sync = blueprint.adapter.sync,
        broker = ?blueprint.broker.kind,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let publisher = Publisher::new(SendConfig {
        blueprint,
        input: args.input.clone(),
        max_messages: (args.max_messages != 0).then_some(args.max_messages),
    });

    let shutdown_signal = setup_shutdown_signal();

    tokio::select! {
        result = publisher.run() => {
            let stats = result.context("Send failed")?;
            info!(
                messages = stats.messages_read,
                duration_secs = stats.duration.as_secs_f64(),
                throughput = format!("{:.2}", stats.throughput()),
                "Send completed"
            );
            stats.print_summary();
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping send...");
        }
    }

    Ok(())
}

/// Apply CLI overrides to the loaded configuration
fn apply_overrides(blueprint: &mut AdapterBlueprint, args: &SendArgs) {
    if let Some(sync) = args.sync_override() {
        info!(sync, "Overriding sync mode from CLI");
        blueprint.adapter.sync = sync;
    }
    if let Some(timeout_ms) = args.send_timeout_ms {
        info!(timeout_ms, "Overriding send timeout from CLI");
        blueprint.adapter.send_timeout_ms = Some(timeout_ms);
        blueprint.adapter.send_timeout = None;
    }
    if let Some(topic) = &args.topic {
        info!(topic = %topic, "Overriding topic from CLI");
        blueprint.adapter.topic = Some(RuleConfig::Static(Value::String(topic.clone())));
    }
    if let Some(servers) = &args.bootstrap_servers {
        info!(servers = %servers, "Overriding bootstrap servers from CLI");
        blueprint.broker.bootstrap_servers = Some(servers.clone());
    }
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &AdapterBlueprint) {
    let adapter = &blueprint.adapter;
    println!("\n=== Configuration Summary ===\n");
    println!("Adapter: {}", adapter.name);
    println!("  Mode: {}", if adapter.sync { "sync" } else { "async" });
    println!("  Broker: {:?}", blueprint.broker.kind);
    if let Some(servers) = &blueprint.broker.bootstrap_servers {
        println!("  Bootstrap servers: {}", servers);
    }
    println!(
        "  Header mapping: {}",
        if blueprint.header_mapping.enabled { "on" } else { "off" }
    );

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    const CONFIG: &str = r#"
[adapter]
name = "orders-out"
sync = true
send_timeout = { metadata = "deadline" }
"#;

    fn send_args(extra: &[&str]) -> SendArgs {
        let mut argv = vec!["kafka-outbound", "send"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Send(args) => args,
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_overrides_applied() {
        let mut bp = config_loader::ConfigLoader::load_from_str(
            CONFIG,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        let args = send_args(&["--no-sync", "--send-timeout-ms", "500", "--topic", "audit"]);
        apply_overrides(&mut bp, &args);

        assert!(!bp.adapter.sync);
        assert_eq!(bp.adapter.send_timeout_ms, Some(500));
        assert!(bp.adapter.send_timeout.is_none());
        assert_eq!(
            bp.adapter.topic,
            Some(RuleConfig::Static(Value::String("audit".into())))
        );
        assert!(config_loader::ConfigLoader::validate(&bp).is_ok());
    }

    #[tokio::test]
    async fn test_missing_config() {
        let args = send_args(&["-c", "/nonexistent/adapter.toml"]);
        let err = run_send(&args).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
