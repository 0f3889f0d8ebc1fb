//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Monitor Adapter - streaming ingestion of cluster monitoring data
#[derive(Parser, Debug)]
#[command(
    name = "monitor-adapter",
    author,
    version,
    about = "Streaming ingestion adapter for cluster monitoring data",
    long_about = "Subscribes to the network streams of one adapter profile, filters \n\
                  messages by subject and hands them to the profile's provider, \n\
                  which normalizes them and acts on the resulting records."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "MONITOR_ADAPTER_VERBOSE")]
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
        env = "MONITOR_ADAPTER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Activate a profile and ingest until interrupted
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display profiles, streams and providers
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (JSON or TOML)
    #[arg(
        short,
        long,
        default_value = "adapter.json",
        env = "MONITOR_ADAPTER_CONFIG"
    )]
    pub config: PathBuf,

    /// Adapter profile to activate
    #[arg(short, long, default_value = "default", env = "MONITOR_ADAPTER_PROFILE")]
    pub profile: String,

    /// Number of queue workers, 1 to 3 (default: derived from available cores)
    #[arg(long, env = "MONITOR_ADAPTER_WORKERS")]
    pub workers: Option<usize>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "MONITOR_ADAPTER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Persist stream resume cursors in this JSON file
    #[arg(long, env = "MONITOR_ADAPTER_CURSOR_FILE")]
    pub cursor_file: Option<PathBuf>,

    /// Stop after this many seconds (0 = run until interrupted)
    #[arg(long, default_value = "0", env = "MONITOR_ADAPTER_TIMEOUT")]
    pub timeout: u64,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "adapter.json")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "adapter.json")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show resolved transport arguments of every stream
    #[arg(long)]
    pub arguments: bool,
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
