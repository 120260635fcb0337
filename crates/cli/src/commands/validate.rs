//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{AdapterBlueprint, BrokerKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    adapter: String,
    sync: bool,
    broker: String,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    adapter: blueprint.adapter.name.clone(),
                    sync: blueprint.adapter.sync,
                    broker: format!("{:?}", blueprint.broker.kind),
                    sink_count: blueprint.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &AdapterBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let adapter = &blueprint.adapter;

    if adapter.failure_sink.is_none() {
        warnings.push("No failure_sink configured - publish failures are only logged".to_string());
    }

    if adapter.topic.is_none() {
        warnings.push(
            "No topic rule - every message must carry a 'kafka_topic' header".to_string(),
        );
    }

    if !adapter.sync && (adapter.send_timeout_ms.is_some() || adapter.send_timeout.is_some()) {
        warnings.push("send timeout is ignored unless sync = true".to_string());
    }

    if blueprint.broker.kind == BrokerKind::Memory {
        warnings.push("Using the in-memory broker - nothing leaves this process".to_string());
    }

    let referenced: Vec<&str> = [&adapter.output_sink, &adapter.failure_sink]
        .into_iter()
        .filter_map(|s| s.as_deref())
        .collect();
    for sink in &blueprint.sinks {
        if !referenced.contains(&sink.name.as_str()) {
            warnings.push(format!("Sink '{}' is not referenced by the adapter", sink.name));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Adapter: {}", summary.adapter);
            println!("  Sync: {}", summary.sync);
            println!("  Broker: {}", summary.broker);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn args(path: &Path) -> ValidateArgs {
        ValidateArgs {
            config: path.to_path_buf(),
            json: true,
        }
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adapter.toml");
        std::fs::write(
            &path,
            "[adapter]\nname = \"a\"\n\n[[sinks]]\nname = \"spare\"\nsink_type = \"log\"\n",
        )
        .unwrap();

        let result = validate_config(&args(&path));
        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("failure_sink")));
        assert!(warnings.iter().any(|w| w.contains("'spare'")));
        assert!(run_validate(&args(&path)).is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adapter.toml");
        std::fs::write(&path, "[adapter]\nname = \"\"\n").unwrap();

        let result = validate_config(&args(&path));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("adapter.name"));
        assert!(run_validate(&args(&path)).is_err());

        let missing = validate_config(&args(&dir.path().join("none.toml")));
        assert!(missing.error.unwrap().contains("File not found"));
    }
}
