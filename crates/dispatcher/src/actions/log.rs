//! System actions that write every store/publish call to the log

use chrono::{DateTime, SecondsFormat, Utc};
use contracts::{AggregateSummary, BootState, SystemActions};
use serde_json::json;
use tracing::{debug, info};

/// Logs stores at debug level and publishes (with their message body) at info
#[derive(Debug, Default)]
pub struct LogSystemActions;

impl LogSystemActions {
    pub fn new() -> Self {
        Self
    }
}

fn iso_timestamp(ns_timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp_nanos(ns_timestamp).to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Publish body for a raw sample
pub fn format_raw_message(data_type: &str, location: &str, ns_timestamp: i64, value: f64) -> String {
    json!({
        "type": data_type,
        "location": location,
        "timestamp": iso_timestamp(ns_timestamp),
        "value": value,
    })
    .to_string()
}

/// Publish body for an aggregated sample
pub fn format_aggregate_message(
    data_type: &str,
    location: &str,
    ns_timestamp: i64,
    summary: &AggregateSummary,
) -> String {
    json!({
        "type": data_type,
        "location": location,
        "timestamp": iso_timestamp(ns_timestamp),
        "minimum": summary.minimum,
        "maximum": summary.maximum,
        "average": summary.average,
    })
    .to_string()
}

/// Publish body for a RAS event
pub fn format_event_message(
    event_name: &str,
    location: &str,
    ns_timestamp: i64,
    instance_data: &str,
) -> String {
    json!({
        "event": event_name,
        "instanceData": instance_data,
        "location": location,
        "timestamp": iso_timestamp(ns_timestamp),
    })
    .to_string()
}

/// Publish body for a boot state change
pub fn format_boot_message(state: BootState, location: &str, ns_timestamp: i64) -> String {
    json!({
        "event": state.as_str(),
        "location": location,
        "timestamp": iso_timestamp(ns_timestamp),
    })
    .to_string()
}

impl SystemActions for LogSystemActions {
    fn store_normalized_data(&self, data_type: &str, location: &str, ns_timestamp: i64, value: f64) {
        debug!(data_type, location, ns_timestamp, value, "store normalized data");
    }

    fn store_aggregated_data(
        &self,
        data_type: &str,
        location: &str,
        ns_timestamp: i64,
        summary: &AggregateSummary,
    ) {
        debug!(
            data_type,
            location,
            ns_timestamp,
            minimum = summary.minimum,
            maximum = summary.maximum,
            average = summary.average,
            "store aggregated data"
        );
    }

    fn store_ras_event(&self, event_name: &str, instance_data: &str, location: &str, ns_timestamp: i64) {
        debug!(event_name, instance_data, location, ns_timestamp, "store ras event");
    }

    fn publish_normalized_data(
        &self,
        topic: &str,
        data_type: &str,
        location: &str,
        ns_timestamp: i64,
        value: f64,
    ) {
        let message = format_raw_message(data_type, location, ns_timestamp, value);
        info!(topic, %message, "publish");
    }

    fn publish_aggregated_data(
        &self,
        topic: &str,
        data_type: &str,
        location: &str,
        ns_timestamp: i64,
        summary: &AggregateSummary,
    ) {
        let message = format_aggregate_message(data_type, location, ns_timestamp, summary);
        info!(topic, %message, "publish");
    }

    fn publish_ras_event(
        &self,
        topic: &str,
        event_name: &str,
        instance_data: &str,
        location: &str,
        ns_timestamp: i64,
    ) {
        let message = format_event_message(event_name, location, ns_timestamp, instance_data);
        info!(topic, %message, "publish");
    }

    fn publish_boot_event(&self, topic: &str, state: BootState, location: &str, ns_timestamp: i64) {
        let message = format_boot_message(state, location, ns_timestamp);
        info!(topic, %message, "publish");
    }

    fn change_node_state(&self, state: BootState, location: &str, ns_timestamp: i64, inform_wlm: bool) {
        info!(state = %state, location, ns_timestamp, inform_wlm, "change node state");
    }

    fn upsert_inventory(&self, location: &str, inventory_json: &str, ns_timestamp: i64) {
        debug!(location, inventory_json, ns_timestamp, "upsert inventory");
    }

    fn delete_inventory(&self, location: &str, ns_timestamp: i64) {
        debug!(location, ns_timestamp, "delete inventory");
    }
}
