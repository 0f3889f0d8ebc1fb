//! Hardware inventory change provider
//!
//! Payload `{"Components": ["x0c0s0b0n0", ...], "State": "On" | "Off" | ...}`.
//! `On` upserts each component, `Off` deletes it. Other known component
//! states carry no inventory change and produce no records.

use contracts::{
    BootState, CommonRecord, InventoryChange, Provider, ProviderError, RecordKind, SystemActions,
};
use serde_json::{json, Value};
use tracing::debug;

use super::{now_ns, parse_object, required_str};

const IGNORED_STATES: [&str; 8] = [
    "Unknown", "Empty", "Populated", "Active", "Standby", "Halt", "Ready", "Paused",
];

pub struct InventoryProvider;

impl InventoryProvider {
    pub const NAME: &'static str = "inventory";

    pub fn new() -> Self {
        Self
    }
}

impl Default for InventoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for InventoryProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn transform(&self, payload: &str) -> Result<Vec<CommonRecord>, ProviderError> {
        let message = parse_object(payload)?;
        let state = required_str(&message, "State")?;
        let boot_state = match state {
            "On" => BootState::NodeOnline,
            "Off" => BootState::NodeOffline,
            s if IGNORED_STATES.contains(&s) => {
                debug!(state = %s, "component state carries no inventory change");
                return Ok(Vec::new());
            }
            other => {
                return Err(ProviderError::invalid_field(
                    "State",
                    format!("unexpected component state '{other}'"),
                ));
            }
        };
        let components = message
            .get("Components")
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::missing_field("Components"))?;

        // One timestamp for the whole notification
        let ns = now_ns();
        let mut records = Vec::with_capacity(components.len());
        for component in components.iter().filter_map(Value::as_str) {
            let mut record = CommonRecord::new(ns, component, RecordKind::InventoryChangeEvent);
            record.set_boot_state(boot_state);
            record.insert_extra("xname", component);
            record.set_inventory(match boot_state {
                BootState::NodeOnline => InventoryChange::Upsert {
                    inventory_json: json!({ "xname": component, "state": state }).to_string(),
                },
                _ => InventoryChange::Delete,
            });
            records.push(record);
        }
        Ok(records)
    }

    fn act(&self, record: CommonRecord, actions: &dyn SystemActions) {
        match record.inventory() {
            Some(InventoryChange::Upsert { inventory_json }) => {
                actions.upsert_inventory(record.location(), inventory_json, record.ns_timestamp());
            }
            Some(InventoryChange::Delete) => {
                actions.delete_inventory(record.location(), record.ns_timestamp());
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::RecordingActions;

    #[test]
    fn test_on_upserts_each_component() {
        let provider = InventoryProvider::new();
        let records = provider
            .transform(r#"{"Components":["x0c0s0b0n0","x0c0s0b0n1"],"State":"On"}"#)
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ns_timestamp(), records[1].ns_timestamp());
        assert_eq!(records[1].extra("xname"), Some("x0c0s0b0n1"));

        let actions = RecordingActions::default();
        for record in records {
            provider.act(record, &actions);
        }
        let calls = actions.calls();
        assert!(calls[0].starts_with("upsert_inventory x0c0s0b0n0 "));
        assert!(calls[1].starts_with("upsert_inventory x0c0s0b0n1 "));
    }

    #[test]
    fn test_off_deletes() {
        let provider = InventoryProvider::new();
        let actions = RecordingActions::default();
        for record in provider
            .transform(r#"{"Components":["x1"],"State":"Off"}"#)
            .unwrap()
        {
            provider.act(record, &actions);
        }
        assert_eq!(actions.calls(), vec!["delete_inventory x1"]);
    }

    #[test]
    fn test_ignored_and_unexpected_states() {
        let provider = InventoryProvider::new();
        assert!(provider
            .transform(r#"{"Components":["x1"],"State":"Standby"}"#)
            .unwrap()
            .is_empty());
        assert!(matches!(
            provider.transform(r#"{"Components":["x1"],"State":"Exploded"}"#),
            Err(ProviderError::InvalidField { .. })
        ));
    }
}
