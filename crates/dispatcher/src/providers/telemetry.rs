//! Environmental telemetry provider
//!
//! Payload: one sample object or an array of them,
//! `{"timestamp", "location", "name", "value", "units"?}`.
//! Samples can be aggregated per `(location, name)` over a count or time
//! window; the record closing a window carries the min/max/average.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use contracts::{CommonRecord, Provider, ProviderError, RecordKind, SystemActions};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{json_type, ns_timestamp, required_str};

/// Window aggregation settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregationConfig {
    pub use_aggregation: bool,
    /// Samples per window when `use_time_window` is false
    pub window_size: usize,
    pub use_time_window: bool,
    pub time_window_seconds: u64,
    /// Slide the window by one sample instead of starting a fresh one
    pub use_moving_average: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            use_aggregation: true,
            window_size: 25,
            use_time_window: false,
            time_window_seconds: 600,
            use_moving_average: false,
        }
    }
}

impl AggregationConfig {
    fn window_ns(&self) -> i64 {
        i64::try_from(self.time_window_seconds)
            .unwrap_or(i64::MAX)
            .saturating_mul(1_000_000_000)
    }
}

/// `telemetry` provider configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetryConfig {
    pub publish: bool,
    pub publish_raw_topic: String,
    pub publish_aggregated_topic: String,
    #[serde(flatten)]
    pub aggregation: AggregationConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            publish: false,
            publish_raw_topic: "ucs_raw_data".to_string(),
            publish_aggregated_topic: "ucs_aggregate_data".to_string(),
            aggregation: AggregationConfig::default(),
        }
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    values: VecDeque<f64>,
    timestamps: VecDeque<i64>,
}

impl Accumulator {
    /// Add the record's value; sets its summary when the window closes
    fn add(&mut self, record: &mut CommonRecord, value: f64, config: &AggregationConfig) {
        self.values.push_back(value);
        self.timestamps.push_back(record.ns_timestamp());

        let ready = if config.use_time_window {
            match (self.timestamps.front(), self.timestamps.back()) {
                (Some(first), Some(last)) => last - first >= config.window_ns(),
                _ => false,
            }
        } else {
            self.values.len() >= config.window_size.max(1)
        };
        if !ready {
            return;
        }

        let (min, max, sum) = self.values.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), v| (min.min(*v), max.max(*v), sum + v),
        );
        record.set_summary(min, max, sum / self.values.len() as f64);

        if config.use_moving_average {
            self.values.pop_front();
            self.timestamps.pop_front();
        } else {
            self.values.clear();
            self.timestamps.clear();
        }
    }
}

/// Telemetry samples to `EnvironmentalData` records
pub struct TelemetryProvider {
    config: TelemetryConfig,
    accumulators: Mutex<HashMap<(String, String), Accumulator>>,
}

impl TelemetryProvider {
    pub const NAME: &'static str = "telemetry";

    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            accumulators: Mutex::new(HashMap::new()),
        }
    }

    fn sample(&self, item: &Map<String, Value>) -> Result<CommonRecord, ProviderError> {
        let ns = ns_timestamp(item.get("timestamp").unwrap_or(&Value::Null), "timestamp")?;
        let location = required_str(item, "location")?;
        let name = required_str(item, "name")?;
        let value = match item.get("value") {
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| ProviderError::invalid_field("value", n.to_string()))?,
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| ProviderError::invalid_field("value", format!("'{s}'")))?,
            Some(other) => {
                return Err(ProviderError::invalid_field("value", json_type(other)));
            }
            None => return Err(ProviderError::missing_field("value")),
        };
        let units = item.get("units").and_then(Value::as_str).unwrap_or_default();

        let mut record = CommonRecord::new(ns, location, RecordKind::EnvironmentalData);
        record.set_description(name);
        record.set_value(name, value, units);

        if self.config.aggregation.use_aggregation {
            let mut accumulators = self
                .accumulators
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            accumulators
                .entry((location.to_string(), name.to_string()))
                .or_default()
                .add(&mut record, value, &self.config.aggregation);
        }
        Ok(record)
    }
}

impl Provider for TelemetryProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn transform(&self, payload: &str) -> Result<Vec<CommonRecord>, ProviderError> {
        let items = match serde_json::from_str::<Value>(payload)? {
            Value::Object(item) => vec![Value::Object(item)],
            Value::Array(items) => items,
            other => {
                return Err(ProviderError::malformed(format!(
                    "expected a sample object or array, got {}",
                    json_type(&other)
                )));
            }
        };

        let mut records = Vec::with_capacity(items.len());
        for item in &items {
            let Some(item) = item.as_object() else {
                warn!("telemetry array element is not an object, skipped");
                continue;
            };
            match self.sample(item) {
                Ok(record) => records.push(record),
                Err(e) if items.len() > 1 => warn!(error = %e, "telemetry sample skipped"),
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }

    fn act(&self, record: CommonRecord, actions: &dyn SystemActions) {
        let Some(sample) = record.value() else {
            debug!(location = %record.location(), "record without value ignored");
            return;
        };
        let ns = record.ns_timestamp();
        let location = record.location();

        actions.store_normalized_data(&sample.data_type, location, ns, sample.value);
        if self.config.publish {
            actions.publish_normalized_data(
                &self.config.publish_raw_topic,
                &sample.data_type,
                location,
                ns,
                sample.value,
            );
        }

        if let Some(summary) = record.summary() {
            actions.store_aggregated_data(&sample.data_type, location, ns, summary);
            if self.config.publish {
                actions.publish_aggregated_data(
                    &self.config.publish_aggregated_topic,
                    &sample.data_type,
                    location,
                    ns,
                    summary,
                );
            }
        }
    }
}
