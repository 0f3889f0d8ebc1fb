//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Profile name not present in the configuration
    #[error("unknown adapter profile '{0}'")]
    UnknownProfile(String),

    /// Provider class with no registered constructor
    #[error("no provider registered for class '{class}' (profile '{profile}')")]
    UnknownProvider { profile: String, class: String },

    /// Sink constructor failed
    #[error("failed to create sink for stream '{stream}': {message}")]
    SinkCreation { stream: String, message: String },

    /// Provider constructor failed
    #[error("failed to create provider '{class}': {message}")]
    ProviderCreation { class: String, message: String },

    /// A constructor is already registered under this name
    #[error("provider '{0}' is already registered")]
    DuplicateProvider(String),

    /// Configuration lookup error (from contract)
    #[error("configuration error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Cursor file could not be decoded or encoded
    #[error("cursor store error: {0}")]
    Cursor(#[from] serde_json::Error),
}

impl DispatcherError {
    pub fn sink_creation(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            stream: stream.into(),
            message: message.into(),
        }
    }

    pub fn provider_creation(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderCreation {
            class: class.into(),
            message: message.into(),
        }
    }
}

/// Dispatcher Result alias
pub type Result<T> = std::result::Result<T, DispatcherError>;
