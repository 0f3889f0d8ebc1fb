//! Token authentication capability

use crate::ContractError;

/// Supplies bearer tokens for outbound stream connections.
///
/// Fetched synchronously once per connection attempt; how tokens are
/// obtained or refreshed is up to the implementation.
pub trait TokenAuthentication: Send + Sync {
    /// Provider name, used in logs and errors
    fn name(&self) -> &str;

    /// Fetch a token.
    ///
    /// # Errors
    /// `ContractError::Token` when no token can be obtained; the current
    /// connection attempt is abandoned.
    fn token(&self) -> Result<String, ContractError>;
}
