//! # Monitor Adapter CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - Configuration loading and validation
//! - Profile activation and dispatcher lifecycle
//! - Graceful shutdown on Ctrl+C / SIGTERM

mod cli;
mod commands;
mod error;

use anyhow::Result;
use clap::Parser;
use observability::{LogFormat, ObservabilityConfig};
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_adapter, run_info, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "monitor adapter starting"
    );

    let result = match &cli.command {
        Commands::Run(args) => run_adapter(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Map `-v` / `-q` / `--log-format` onto the observability settings
fn init_logging(cli: &Cli) -> Result<()> {
    let (level, ignore_env_filter) = match (cli.quiet, cli.verbose) {
        (true, _) => ("warn", true),
        (false, 0) => ("info", false),
        (false, 1) => ("debug", false),
        (false, _) => ("trace", false),
    };
    let log_format = match cli.log_format {
        cli::LogFormat::Json => LogFormat::Json,
        cli::LogFormat::Pretty => LogFormat::Pretty,
        cli::LogFormat::Compact => LogFormat::Compact,
    };

    observability::init_with_config(ObservabilityConfig {
        log_format,
        metrics_port: None,
        default_log_level: level.to_string(),
        ignore_env_filter,
    })
}
