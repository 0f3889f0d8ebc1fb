//! Configuration reference checks
//!
//! Structural checks only, the document itself is trusted:
//! - every profile names a mapped provider
//! - every profile references at least one defined network stream
//! - every profile subject is listed in `subjectMap` (or is `*`)
//! - every network stream has a transport name

use contracts::{ContractError, ListenerConfig};

/// Check cross references inside a configuration
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &ListenerConfig) -> Result<(), ContractError> {
    for (name, stream) in &config.network_streams {
        if stream.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("networkStreams.{name}.name"),
                "transport name must not be empty",
            ));
        }
    }

    for (name, profile) in &config.adapter_profiles {
        let field = format!("adapterProfiles.{name}");

        if !config
            .provider_class_map
            .contains_key(&profile.adapter_provider)
        {
            return Err(ContractError::config_validation(
                format!("{field}.adapterProvider"),
                format!(
                    "provider '{}' is not in providerClassMap",
                    profile.adapter_provider
                ),
            ));
        }

        if profile.network_streams_ref.is_empty() {
            return Err(ContractError::config_validation(
                format!("{field}.networkStreamsRef"),
                "at least one network stream is required",
            ));
        }
        for stream in &profile.network_streams_ref {
            if !config.network_streams.contains_key(stream) {
                return Err(ContractError::config_validation(
                    format!("{field}.networkStreamsRef"),
                    format!("network stream '{stream}' is not defined"),
                ));
            }
        }

        if profile.subjects.is_empty() {
            return Err(ContractError::config_validation(
                format!("{field}.subjects"),
                "at least one subject is required",
            ));
        }
        for subject in &profile.subjects {
            if subject != "*" && !config.subject_map.contains_key(subject) {
                return Err(ContractError::config_validation(
                    format!("{field}.subjects"),
                    format!("subject '{subject}' is not in subjectMap"),
                ));
            }
        }
    }

    Ok(())
}
