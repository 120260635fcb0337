//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Kafka Outbound - publish messages to a broker through a configured adapter
#[derive(Parser, Debug)]
#[command(
    name = "kafka-outbound",
    author,
    version,
    about = "Kafka outbound channel adapter",
    long_about = "Publishes messages to a Kafka-style broker.\n\n\
                  Resolves topic, partition, key and timestamp per message, \n\
                  publishes asynchronously or waits for acknowledgement, and \n\
                  routes outcomes to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "KAFKA_OUTBOUND_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "KAFKA_OUTBOUND_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish JSON-lines messages through the adapter
    Send(SendArgs),

    /// Validate configuration file without publishing
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `send` command
#[derive(Parser, Debug, Clone)]
pub struct SendArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "adapter.toml",
        env = "KAFKA_OUTBOUND_CONFIG"
    )]
    pub config: PathBuf,

    /// JSON-lines input file (stdin when omitted)
    ///
    /// Each line is either `{"payload": ..., "headers": {...}}` or a bare
    /// JSON value used as the payload.
    #[arg(short, long, env = "KAFKA_OUTBOUND_INPUT")]
    pub input: Option<PathBuf>,

    /// Wait for broker acknowledgement of every message
    #[arg(long, conflicts_with = "no_sync")]
    pub sync: bool,

    /// Publish without waiting, even if the configuration enables sync mode
    #[arg(long)]
    pub no_sync: bool,

    /// Override the send timeout in milliseconds (negative = wait forever)
    #[arg(long, allow_negative_numbers = true, env = "KAFKA_OUTBOUND_SEND_TIMEOUT_MS")]
    pub send_timeout_ms: Option<i64>,

    /// Publish every message to this topic instead of the configured rule
    #[arg(long, env = "KAFKA_OUTBOUND_TOPIC")]
    pub topic: Option<String>,

    /// Override broker bootstrap servers
    #[arg(long, env = "KAFKA_BOOTSTRAP_SERVERS")]
    pub bootstrap_servers: Option<String>,

    /// Maximum number of messages to publish (0 = unlimited)
    #[arg(long, default_value = "0", env = "KAFKA_OUTBOUND_MAX_MESSAGES")]
    pub max_messages: u64,

    /// Validate configuration and exit without publishing
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "KAFKA_OUTBOUND_METRICS_PORT")]
    pub metrics_port: u16,
}

impl SendArgs {
    /// Sync override from `--sync` / `--no-sync`
    pub fn sync_override(&self) -> Option<bool> {
        match (self.sync, self.no_sync) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "adapter.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "adapter.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show header mapping patterns
    #[arg(long)]
    pub headers: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
