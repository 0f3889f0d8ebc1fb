//! Layered error definitions
//!
//! Categorized by source: config / stream / token / provider

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Stream Errors =====
    /// Stream connection error
    #[error("stream '{stream}' connection error: {message}")]
    StreamConnection { stream: String, message: String },

    /// Sink creation error
    #[error("failed to create sink '{sink}': {message}")]
    SinkCreation { sink: String, message: String },

    // ===== Authentication Errors =====
    /// Token fetch error
    #[error("token provider '{provider}' failed: {message}")]
    Token { provider: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create stream connection error
    pub fn stream_connection(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StreamConnection {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create sink creation error
    pub fn sink_creation(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Create token error
    pub fn token(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Token {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Raised by `Provider::transform` when a payload cannot be decoded.
///
/// The dispatcher drops the offending message and keeps going.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Payload is not in the expected encoding
    #[error("malformed payload: {message}")]
    Malformed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A required field is missing from an otherwise valid payload
    #[error("missing field '{field}' in payload")]
    MissingField { field: String },

    /// A field is present but has an unusable value
    #[error("invalid value for '{field}': {message}")]
    InvalidField { field: String, message: String },

    /// Provider could not be configured
    #[error("provider configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// Create malformed payload error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
            source: None,
        }
    }

    /// Create missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create invalid field error
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed {
            message: format!("JSON decode error: {e}"),
            source: Some(Box::new(e)),
        }
    }
}
