//! Listener configuration model
//!
//! Mirrors the adapter's JSON/TOML configuration document. Keys are camelCase.
//!
//! ```json
//! {
//!   "adapterProfiles": {
//!     "default": {
//!       "adapterProvider": "environmental",
//!       "networkStreamsRef": ["nodeTelemetry"],
//!       "subjects": ["telemetry"]
//!     }
//!   },
//!   "networkStreams": {
//!     "nodeTelemetry": {
//!       "name": "eventSource",
//!       "arguments": { "fullUrl": "https://mgmt:8443/stream?stream_id=telemetry" }
//!     }
//!   },
//!   "subjectMap": { "telemetry": "EnvironmentalData" },
//!   "providerClassMap": { "environmental": "telemetry" },
//!   "providerConfigurations": { "telemetry": { "publish": true } }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ContractError, TransportArguments};

/// Argument holding the token provider name
pub const TOKEN_AUTH_PROVIDER_KEY: &str = "tokenAuthProvider";
/// Argument holding nested request selectors
pub const REQUEST_BUILDER_SELECTORS_KEY: &str = "requestBuilderSelectors";
/// Argument holding the comma separated subject list
pub const SUBJECTS_KEY: &str = "subjects";

/// Root configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerConfig {
    /// Replace the real system actions with counting ones
    #[serde(default)]
    pub use_benchmarking_actions: bool,

    /// Profiles selectable at runtime
    pub adapter_profiles: BTreeMap<String, AdapterProfile>,

    /// Network streams referenced by profiles
    pub network_streams: BTreeMap<String, NetworkStreamConfig>,

    /// Known subjects and their descriptions
    pub subject_map: BTreeMap<String, Value>,

    /// Provider name → registered provider class
    pub provider_class_map: BTreeMap<String, String>,

    /// Per-class configuration handed to providers and token providers
    #[serde(default)]
    pub provider_configurations: BTreeMap<String, Map<String, Value>>,
}

/// Named bundle of streams, subjects and one provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterProfile {
    /// Key into `providerClassMap`
    pub adapter_provider: String,

    /// Keys into `networkStreams`
    pub network_streams_ref: Vec<String>,

    /// Allowed subjects, `*` allows everything
    pub subjects: Vec<String>,
}

/// One inbound stream: transport name plus raw arguments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStreamConfig {
    /// Transport name resolved by the sink factory (e.g. "eventSource")
    pub name: String,

    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ListenerConfig {
    /// Look up a profile by name
    pub fn profile(&self, name: &str) -> Result<&AdapterProfile, ContractError> {
        self.adapter_profiles.get(name).ok_or_else(|| {
            ContractError::config_validation(
                format!("adapterProfiles.{name}"),
                "profile is not defined",
            )
        })
    }

    /// Look up a network stream by name
    pub fn network_stream(&self, name: &str) -> Result<&NetworkStreamConfig, ContractError> {
        self.network_streams.get(name).ok_or_else(|| {
            ContractError::config_validation(
                format!("networkStreams.{name}"),
                "network stream is not defined",
            )
        })
    }

    /// Resolve the provider class a profile uses
    pub fn provider_class(&self, profile: &AdapterProfile) -> Result<&str, ContractError> {
        self.provider_class_map
            .get(&profile.adapter_provider)
            .map(String::as_str)
            .ok_or_else(|| {
                ContractError::config_validation(
                    format!("providerClassMap.{}", profile.adapter_provider),
                    "provider is not mapped to a class",
                )
            })
    }

    /// Configuration block for a provider class (empty when absent)
    pub fn provider_configuration(&self, class: &str) -> Map<String, Value> {
        self.provider_configurations
            .get(class)
            .cloned()
            .unwrap_or_default()
    }

    /// Flatten a stream's arguments into the string map handed to sinks.
    ///
    /// - scalars are stringified, arrays joined with `,`, nested maps skipped
    /// - `requestBuilderSelectors` entries become `requestBuilderSelectors.<key>`
    /// - `tokenAuthProvider` pulls in that provider's `providerConfigurations`
    ///   block; explicit stream arguments win over it
    /// - `subjects` is always the profile's subject list
    pub fn network_arguments(
        &self,
        stream_name: &str,
        subjects: &[String],
    ) -> Result<TransportArguments, ContractError> {
        let stream = self.network_stream(stream_name)?;
        let mut args = TransportArguments::new();

        if let Some(provider) = stream
            .arguments
            .get(TOKEN_AUTH_PROVIDER_KEY)
            .and_then(value_to_argument)
        {
            if let Some(token_config) = self.provider_configurations.get(&provider) {
                for (key, value) in token_config {
                    if let Some(value) = value_to_argument(value) {
                        args.insert(key.clone(), value);
                    }
                }
            }
        }

        for (key, value) in &stream.arguments {
            match key.as_str() {
                SUBJECTS_KEY => {}
                REQUEST_BUILDER_SELECTORS_KEY => flatten_selectors(value, &mut args),
                _ => {
                    if let Some(value) = value_to_argument(value) {
                        args.insert(key.clone(), value);
                    }
                }
            }
        }

        args.insert(SUBJECTS_KEY.to_string(), subjects.join(","));
        Ok(args)
    }
}

fn flatten_selectors(value: &Value, args: &mut TransportArguments) {
    let Some(selectors) = value.as_object() else {
        return;
    };
    for (key, value) in selectors {
        if let Some(value) = value_to_argument(value) {
            args.insert(format!("{REQUEST_BUILDER_SELECTORS_KEY}.{key}"), value);
        }
    }
}

/// Stringify a JSON argument value; maps and nulls have no string form
fn value_to_argument(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Object(_) => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(value_to_argument)
                .collect::<Vec<_>>()
                .join(","),
        ),
    }
}
