//! Provider registry and built-in providers
//!
//! The profile names a provider class; the registry maps that class to a
//! constructor receiving the class's `providerConfigurations` entry.

mod boot_state;
mod inventory;
mod ras_event;
mod telemetry;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use contracts::{Provider, ProviderError};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{DispatcherError, Result};

pub use boot_state::{BootStateConfig, BootStateProvider};
pub use inventory::InventoryProvider;
pub use ras_event::{RasEventConfig, RasEventProvider};
pub use telemetry::{AggregationConfig, TelemetryConfig, TelemetryProvider};

/// Builds a provider from its configuration object
pub type ProviderConstructor = Box<
    dyn Fn(&Map<String, Value>) -> std::result::Result<Arc<dyn Provider>, ProviderError>
        + Send
        + Sync,
>;

/// Class name → provider constructor
pub struct ProviderRegistry {
    constructors: HashMap<String, ProviderConstructor>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// `telemetry`, `rasEvent`, `bootState` and `inventory`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert(TelemetryProvider::NAME, |config| {
            Ok(Arc::new(TelemetryProvider::new(from_config(config)?)))
        });
        registry.insert(RasEventProvider::NAME, |config| {
            Ok(Arc::new(RasEventProvider::new(from_config(config)?)))
        });
        registry.insert(BootStateProvider::NAME, |config| {
            Ok(Arc::new(BootStateProvider::new(from_config(config)?)))
        });
        registry.insert(InventoryProvider::NAME, |_| Ok(Arc::new(InventoryProvider::new())));
        registry
    }

    fn insert<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&Map<String, Value>) -> std::result::Result<Arc<dyn Provider>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(name.to_string(), Box::new(constructor));
    }

    /// Register a provider class; names are unique
    pub fn register(&mut self, class: impl Into<String>, constructor: ProviderConstructor) -> Result<()> {
        let class = class.into();
        if self.constructors.contains_key(&class) {
            return Err(DispatcherError::DuplicateProvider(class));
        }
        self.constructors.insert(class, constructor);
        Ok(())
    }

    pub fn contains(&self, class: &str) -> bool {
        self.constructors.contains_key(class)
    }

    /// Instantiate `class`, or `None` when it is not registered
    pub fn create(
        &self,
        class: &str,
        config: &Map<String, Value>,
    ) -> Option<Result<Arc<dyn Provider>>> {
        let constructor = self.constructors.get(class)?;
        debug!(class = %class, "creating provider");
        Some(constructor(config).map_err(|e| DispatcherError::provider_creation(class, e.to_string())))
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Deserialize a provider configuration object, missing keys taking defaults
fn from_config<T: DeserializeOwned>(config: &Map<String, Value>) -> std::result::Result<T, ProviderError> {
    serde_json::from_value(Value::Object(config.clone()))
        .map_err(|e| ProviderError::Configuration(e.to_string()))
}

/// RFC 3339 timestamp, or an integer already in nanoseconds
fn ns_timestamp(value: &Value, field: &str) -> std::result::Result<i64, ProviderError> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .map_err(|e| ProviderError::invalid_field(field, format!("'{text}': {e}")))
            .and_then(|dt| {
                dt.timestamp_nanos_opt()
                    .ok_or_else(|| ProviderError::invalid_field(field, "timestamp out of range"))
            }),
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| ProviderError::invalid_field(field, "not an integer nanosecond value")),
        Value::Null => Err(ProviderError::missing_field(field)),
        other => Err(ProviderError::invalid_field(field, format!("unexpected {other}"))),
    }
}

fn now_ns() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

/// String field of a JSON object
fn required_str<'a>(object: &'a Map<String, Value>, field: &str) -> std::result::Result<&'a str, ProviderError> {
    match object.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim()),
        Some(Value::String(_)) | None | Some(Value::Null) => Err(ProviderError::missing_field(field)),
        Some(other) => Err(ProviderError::invalid_field(field, format!("expected a string, got {other}"))),
    }
}

/// Top-level JSON object of a payload
fn parse_object(payload: &str) -> std::result::Result<Map<String, Value>, ProviderError> {
    match serde_json::from_str::<Value>(payload)? {
        Value::Object(object) => Ok(object),
        other => Err(ProviderError::malformed(format!(
            "expected a JSON object, got {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
