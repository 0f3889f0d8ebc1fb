//! RAS event provider
//!
//! Payload `{"timestamp", "location", "event", "payload"?}` where `location`
//! may list several comma-separated locations; one record per location.

use contracts::{CommonRecord, Provider, ProviderError, RecordKind, SystemActions};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{ns_timestamp, parse_object, required_str};

/// `rasEvent` provider configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RasEventConfig {
    pub publish: bool,
    pub publish_topic: String,
}

impl Default for RasEventConfig {
    fn default() -> Self {
        Self {
            publish: false,
            publish_topic: "ucs_ras_event".to_string(),
        }
    }
}

pub struct RasEventProvider {
    config: RasEventConfig,
}

impl RasEventProvider {
    pub const NAME: &'static str = "rasEvent";

    pub fn new(config: RasEventConfig) -> Self {
        Self { config }
    }
}

impl Provider for RasEventProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn transform(&self, payload: &str) -> Result<Vec<CommonRecord>, ProviderError> {
        let message = parse_object(payload)?;
        let ns = ns_timestamp(message.get("timestamp").unwrap_or(&Value::Null), "timestamp")?;
        let event = required_str(&message, "event")?;
        let instance_data = match message.get("payload") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let records: Vec<CommonRecord> = required_str(&message, "location")?
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|location| {
                let mut record = CommonRecord::new(ns, location, RecordKind::RasEvent);
                record.set_ras_event(event, instance_data.as_str());
                record
            })
            .collect();
        debug!(event = %event, locations = records.len(), "ras event decoded");
        Ok(records)
    }

    fn act(&self, record: CommonRecord, actions: &dyn SystemActions) {
        let Some(ras) = record.ras_event() else {
            return;
        };
        actions.store_ras_event(
            &ras.event_name,
            &ras.instance_data,
            record.location(),
            record.ns_timestamp(),
        );
        if self.config.publish {
            actions.publish_ras_event(
                &self.config.publish_topic,
                &ras.event_name,
                &ras.instance_data,
                record.location(),
                record.ns_timestamp(),
            );
        }
    }
}
