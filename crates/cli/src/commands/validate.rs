//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::ListenerConfig;
use dispatcher::ProviderRegistry;
use ingestion::{SinkFactory, TokenProviderRegistry};
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
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    profile_count: usize,
    stream_count: usize,
    subject_count: usize,
    benchmarking_actions: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let config_path = args.config.display().to_string();
    let result = match super::load_config(&args.config) {
        Ok(config) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&config),
            summary: Some(ConfigSummary {
                profile_count: config.adapter_profiles.len(),
                stream_count: config.network_streams.len(),
                subject_count: config.subject_map.len(),
                benchmarking_actions: config.use_benchmarking_actions,
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("{e:#}")),
            warnings: Vec::new(),
            summary: None,
        },
    };

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

/// Non-fatal issues: names nothing in this build can resolve
fn collect_warnings(config: &ListenerConfig) -> Vec<String> {
    let providers = ProviderRegistry::with_defaults();
    let sinks = SinkFactory::with_defaults(TokenProviderRegistry::with_defaults());
    let mut warnings = Vec::new();

    for (name, profile) in &config.adapter_profiles {
        if let Ok(class) = config.provider_class(profile) {
            if !providers.contains(class) {
                warnings.push(format!(
                    "Profile '{name}' uses unknown provider class '{class}'"
                ));
            }
        }
    }

    for (name, stream) in &config.network_streams {
        if !sinks.contains(&stream.name) {
            warnings.push(format!(
                "Network stream '{name}' uses unknown transport '{}' and will be skipped",
                stream.name
            ));
        }
        let referenced = config
            .adapter_profiles
            .values()
            .any(|p| p.network_streams_ref.contains(name));
        if !referenced {
            warnings.push(format!("Network stream '{name}' is not used by any profile"));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Profiles: {}", summary.profile_count);
            println!("  Network streams: {}", summary.stream_count);
            println!("  Subjects: {}", summary.subject_count);
            println!("  Benchmarking actions: {}", summary.benchmarking_actions);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
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
