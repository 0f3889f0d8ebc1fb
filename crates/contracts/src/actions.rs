//! SystemActions - persistence/publish collaborator used by providers

use crate::{AggregateSummary, BootState};

/// Store and publish operations available to providers.
///
/// Every call is fire-and-forget: implementations log their own failures.
/// Timestamps are nanoseconds since the Unix epoch.
pub trait SystemActions: Send + Sync {
    fn store_normalized_data(&self, data_type: &str, location: &str, ns_timestamp: i64, value: f64);

    fn store_aggregated_data(
        &self,
        data_type: &str,
        location: &str,
        ns_timestamp: i64,
        summary: &AggregateSummary,
    );

    fn store_ras_event(&self, event_name: &str, instance_data: &str, location: &str, ns_timestamp: i64);

    fn publish_normalized_data(
        &self,
        topic: &str,
        data_type: &str,
        location: &str,
        ns_timestamp: i64,
        value: f64,
    );

    fn publish_aggregated_data(
        &self,
        topic: &str,
        data_type: &str,
        location: &str,
        ns_timestamp: i64,
        summary: &AggregateSummary,
    );

    fn publish_ras_event(
        &self,
        topic: &str,
        event_name: &str,
        instance_data: &str,
        location: &str,
        ns_timestamp: i64,
    );

    fn publish_boot_event(&self, topic: &str, state: BootState, location: &str, ns_timestamp: i64);

    /// Record a node state transition; `inform_wlm` also notifies the workload manager
    fn change_node_state(&self, state: BootState, location: &str, ns_timestamp: i64, inform_wlm: bool);

    fn upsert_inventory(&self, location: &str, inventory_json: &str, ns_timestamp: i64);

    fn delete_inventory(&self, location: &str, ns_timestamp: i64);

    /// Flush and release resources
    fn close(&self) {}
}
