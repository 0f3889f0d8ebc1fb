//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::ListenerConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

#[derive(Serialize)]
struct ConfigInfo {
    use_benchmarking_actions: bool,
    profiles: Vec<ProfileInfo>,
    subjects: Vec<String>,
}

#[derive(Serialize)]
struct ProfileInfo {
    name: String,
    provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider_class: Option<String>,
    subjects: Vec<String>,
    streams: Vec<StreamInfo>,
}

#[derive(Serialize)]
struct StreamInfo {
    name: String,
    transport: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    arguments: BTreeMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = super::load_config(&args.config)?;
    let info = build_config_info(&config, args.arguments);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &ListenerConfig, with_arguments: bool) -> ConfigInfo {
    let profiles = config
        .adapter_profiles
        .iter()
        .map(|(name, profile)| ProfileInfo {
            name: name.clone(),
            provider: profile.adapter_provider.clone(),
            provider_class: config.provider_class(profile).ok().map(str::to_string),
            subjects: profile.subjects.clone(),
            streams: profile
                .network_streams_ref
                .iter()
                .map(|stream| StreamInfo {
                    name: stream.clone(),
                    transport: config
                        .network_stream(stream)
                        .map(|s| s.name.clone())
                        .unwrap_or_else(|_| "<undefined>".to_string()),
                    arguments: if with_arguments {
                        resolved_arguments(config, stream, &profile.subjects)
                    } else {
                        BTreeMap::new()
                    },
                })
                .collect(),
        })
        .collect();

    ConfigInfo {
        use_benchmarking_actions: config.use_benchmarking_actions,
        profiles,
        subjects: config.subject_map.keys().cloned().collect(),
    }
}

/// Sorted transport arguments with secrets masked
fn resolved_arguments(
    config: &ListenerConfig,
    stream: &str,
    subjects: &[String],
) -> BTreeMap<String, String> {
    config
        .network_arguments(stream, subjects)
        .map(|args| {
            args.into_iter()
                .map(|(key, value)| {
                    let lower = key.to_ascii_lowercase();
                    if lower.contains("token") && lower != "tokenauthprovider" && lower != "tokenserver" {
                        (key, "***".to_string())
                    } else {
                        (key, value)
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

fn print_config_info(info: &ConfigInfo) {
    println!("\n=== Adapter Configuration ===\n");
    println!("Benchmarking actions: {}", info.use_benchmarking_actions);
    println!("Known subjects: {}", info.subjects.join(", "));

    println!("\nProfiles ({}):", info.profiles.len());
    for profile in &info.profiles {
        println!(
            "  - {} provider={} ({})",
            profile.name,
            profile.provider,
            profile.provider_class.as_deref().unwrap_or("unmapped")
        );
        println!("    subjects: {}", profile.subjects.join(", "));
        for stream in &profile.streams {
            println!("    stream {} [{}]", stream.name, stream.transport);
            for (key, value) in &stream.arguments {
                println!("      {} = {}", key, value);
            }
        }
    }
    println!();
}
