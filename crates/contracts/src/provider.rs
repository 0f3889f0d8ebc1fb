//! Transform-and-action provider contract

use crate::{CommonRecord, ProviderError, SystemActions};

/// Pluggable payload transformer invoked by the dispatcher workers.
///
/// One instance is shared by all workers, so implementations guard any
/// internal state themselves.
pub trait Provider: Send + Sync {
    /// Provider name, used in logs
    fn name(&self) -> &str;

    /// Decode one raw payload into zero or more records.
    ///
    /// # Errors
    /// `ProviderError` when the payload cannot be decoded; the message is dropped.
    fn transform(&self, payload: &str) -> Result<Vec<CommonRecord>, ProviderError>;

    /// Perform the domain actions for one record.
    ///
    /// Failures of the underlying store/publish calls are the provider's
    /// concern and are not reported back.
    fn act(&self, record: CommonRecord, actions: &dyn SystemActions);
}
