//! Common record format produced by providers and consumed by system actions

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind tag of a [`CommonRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Environmental/telemetry sample
    EnvironmentalData,
    /// RAS (reliability, availability, serviceability) alert event
    RasEvent,
    /// Node state change (boot state)
    StateChangeEvent,
    /// Hardware inventory change
    InventoryChangeEvent,
    /// Free-form log line
    LogData,
}

/// Node boot state carried by state change records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BootState {
    NodeOnline,
    NodeOffline,
    NodeBooting,
    Empty,
}

impl BootState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NodeOnline => "NODE_ONLINE",
            Self::NodeOffline => "NODE_OFFLINE",
            Self::NodeBooting => "NODE_BOOTING",
            Self::Empty => "EMPTY",
        }
    }
}

impl FromStr for BootState {
    type Err = String;

    /// Accepts both the canonical names (`NODE_ONLINE`) and the short forms (`online`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NODE_ONLINE" | "ONLINE" => Ok(Self::NodeOnline),
            "NODE_OFFLINE" | "OFFLINE" => Ok(Self::NodeOffline),
            "NODE_BOOTING" | "BOOTING" => Ok(Self::NodeBooting),
            "EMPTY" => Ok(Self::Empty),
            other => Err(format!("unknown boot state '{other}'")),
        }
    }
}

impl std::fmt::Display for BootState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single telemetry value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSample {
    /// Telemetry data type, e.g. "temperature"
    pub data_type: String,
    pub value: f64,
    pub units: String,
}

/// Min/max/average over a window of samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub minimum: f64,
    pub maximum: f64,
    pub average: f64,
}

/// RAS event name plus its instance data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasEventData {
    pub event_name: String,
    pub instance_data: String,
}

/// Hardware inventory change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum InventoryChange {
    /// Insert or replace the inventory JSON of a location
    Upsert { inventory_json: String },
    /// Remove the location from inventory
    Delete,
}

/// Normalized unit of monitoring data.
///
/// Built once by a provider's transform step (constructor plus setters),
/// then handed by value to the provider's act step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommonRecord {
    ns_timestamp: i64,
    location: String,
    kind: RecordKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<ValueSample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<AggregateSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ras_event: Option<RasEventData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    boot_state: Option<BootState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inventory: Option<InventoryChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_line: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    extras: BTreeMap<String, String>,
}

impl CommonRecord {
    pub fn new(ns_timestamp: i64, location: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            ns_timestamp,
            location: location.into(),
            kind,
            description: None,
            value: None,
            summary: None,
            ras_event: None,
            boot_state: None,
            inventory: None,
            log_line: None,
            extras: BTreeMap::new(),
        }
    }

    pub fn ns_timestamp(&self) -> i64 {
        self.ns_timestamp
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn value(&self) -> Option<&ValueSample> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, data_type: impl Into<String>, value: f64, units: impl Into<String>) {
        self.value = Some(ValueSample {
            data_type: data_type.into(),
            value,
            units: units.into(),
        });
    }

    /// Aggregated summary, present only when a window completed on this sample
    pub fn summary(&self) -> Option<&AggregateSummary> {
        self.summary.as_ref()
    }

    pub fn have_summary(&self) -> bool {
        self.summary.is_some()
    }

    pub fn set_summary(&mut self, minimum: f64, maximum: f64, average: f64) {
        self.summary = Some(AggregateSummary {
            minimum,
            maximum,
            average,
        });
    }

    pub fn ras_event(&self) -> Option<&RasEventData> {
        self.ras_event.as_ref()
    }

    pub fn set_ras_event(&mut self, event_name: impl Into<String>, instance_data: impl Into<String>) {
        self.ras_event = Some(RasEventData {
            event_name: event_name.into(),
            instance_data: instance_data.into(),
        });
    }

    pub fn boot_state(&self) -> Option<BootState> {
        self.boot_state
    }

    pub fn set_boot_state(&mut self, state: BootState) {
        self.boot_state = Some(state);
    }

    pub fn inventory(&self) -> Option<&InventoryChange> {
        self.inventory.as_ref()
    }

    pub fn set_inventory(&mut self, change: InventoryChange) {
        self.inventory = Some(change);
    }

    pub fn log_line(&self) -> Option<&str> {
        self.log_line.as_deref()
    }

    pub fn set_log_line(&mut self, line: impl Into<String>) {
        self.log_line = Some(line.into());
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras.get(key).map(String::as_str)
    }

    pub fn extras(&self) -> &BTreeMap<String, String> {
        &self.extras
    }

    pub fn insert_extra(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.extras.insert(key.into(), value.into());
    }
}
