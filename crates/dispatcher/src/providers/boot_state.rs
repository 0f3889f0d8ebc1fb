//! Node boot-state provider
//!
//! Payload `{"timestamp"?, "location", "state"}`; `state` accepts
//! `NODE_ONLINE`/`online` style names. A missing timestamp means "now".

use contracts::{BootState, CommonRecord, Provider, ProviderError, RecordKind, SystemActions};
use serde::Deserialize;
use serde_json::Value;

use super::{now_ns, ns_timestamp, parse_object, required_str};

/// `bootState` provider configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BootStateConfig {
    pub publish: bool,
    pub publish_topic: String,
    /// Forwarded to `change_node_state`
    #[serde(rename = "informWorkLoadManager")]
    pub inform_wlm: bool,
}

impl Default for BootStateConfig {
    fn default() -> Self {
        Self {
            publish: false,
            publish_topic: "ucs_boot_event".to_string(),
            inform_wlm: false,
        }
    }
}

pub struct BootStateProvider {
    config: BootStateConfig,
}

impl BootStateProvider {
    pub const NAME: &'static str = "bootState";

    pub fn new(config: BootStateConfig) -> Self {
        Self { config }
    }
}

impl Provider for BootStateProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn transform(&self, payload: &str) -> Result<Vec<CommonRecord>, ProviderError> {
        let message = parse_object(payload)?;
        let ns = match message.get("timestamp") {
            None | Some(Value::Null) => now_ns(),
            Some(value) => ns_timestamp(value, "timestamp")?,
        };
        let state: BootState = required_str(&message, "state")?
            .parse()
            .map_err(|e: String| ProviderError::invalid_field("state", e))?;

        let mut record = CommonRecord::new(
            ns,
            required_str(&message, "location")?,
            RecordKind::StateChangeEvent,
        );
        record.set_boot_state(state);
        Ok(vec![record])
    }

    fn act(&self, record: CommonRecord, actions: &dyn SystemActions) {
        let Some(state) = record.boot_state() else {
            return;
        };
        actions.change_node_state(
            state,
            record.location(),
            record.ns_timestamp(),
            self.config.inform_wlm,
        );
        if self.config.publish {
            actions.publish_boot_event(
                &self.config.publish_topic,
                state,
                record.location(),
                record.ns_timestamp(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::RecordingActions;

    #[test]
    fn test_transform_state() {
        let provider = BootStateProvider::new(BootStateConfig::default());
        let records = provider
            .transform(r#"{"timestamp":"2024-05-01T10:00:00Z","location":"R0-N4","state":"online"}"#)
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].boot_state(), Some(BootState::NodeOnline));
        assert_eq!(records[0].kind(), RecordKind::StateChangeEvent);
    }

    #[test]
    fn test_missing_timestamp_uses_now() {
        let provider = BootStateProvider::new(BootStateConfig::default());
        let records = provider
            .transform(r#"{"location":"R0-N4","state":"NODE_BOOTING"}"#)
            .unwrap();
        assert!(records[0].ns_timestamp() > 0);
    }

    #[test]
    fn test_unknown_state_is_error() {
        let provider = BootStateProvider::new(BootStateConfig::default());
        let result = provider.transform(r#"{"location":"R0-N4","state":"melting"}"#);
        assert!(matches!(result, Err(ProviderError::InvalidField { .. })));
    }

    #[test]
    fn test_act_changes_state_and_publishes() {
        let config: BootStateConfig =
            serde_json::from_str(r#"{"publish":true,"informWorkLoadManager":true}"#).unwrap();
        let provider = BootStateProvider::new(config);
        let actions = RecordingActions::default();
        let record = provider
            .transform(r#"{"timestamp":5,"location":"R0-N4","state":"offline"}"#)
            .unwrap()
            .remove(0);
        provider.act(record, &actions);

        assert_eq!(
            actions.calls(),
            vec![
                "change_node_state NODE_OFFLINE R0-N4 wlm=true",
                "publish_boot ucs_boot_event NODE_OFFLINE R0-N4",
            ]
        );
    }
}
