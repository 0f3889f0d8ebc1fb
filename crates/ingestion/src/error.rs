//! Ingestion error types

use contracts::ContractError;
use thiserror::Error;

/// Errors raised while building sinks
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Required transport argument absent
    #[error("stream '{stream}': missing required argument '{argument}'")]
    MissingArgument {
        /// Stream name
        stream: String,
        /// Argument key
        argument: String,
    },

    /// Transport argument present but unusable
    #[error("stream '{stream}': argument '{argument}' could not be parsed: {message}")]
    InvalidArgument {
        /// Stream name
        stream: String,
        /// Argument key
        argument: String,
        /// Parse failure detail
        message: String,
    },

    /// Token provider could not be created
    #[error("failed to create token provider '{provider}': {message}")]
    TokenProvider {
        /// Provider name
        provider: String,
        /// Failure detail
        message: String,
    },

    /// A constructor is already registered under this name
    #[error("'{name}' is already registered")]
    DuplicateRegistration {
        /// Registered name
        name: String,
    },

    /// Contract-level error
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl IngestionError {
    pub fn missing_argument(stream: impl Into<String>, argument: impl Into<String>) -> Self {
        Self::MissingArgument {
            stream: stream.into(),
            argument: argument.into(),
        }
    }

    pub fn invalid_argument(
        stream: impl Into<String>,
        argument: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            stream: stream.into(),
            argument: argument.into(),
            message: message.into(),
        }
    }

    pub fn token_provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TokenProvider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;

/// Errors reported by one event-stream connection attempt
#[derive(Debug, Error)]
pub enum SseError {
    /// HTTP client could not be built (TLS setup and the like)
    #[error("HTTP client setup failed: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// Request could not be sent or the connection failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Response was not a 2xx `text/event-stream`
    #[error("unexpected response: status={status}, content-type='{content_type}'")]
    UnexpectedResponse { status: u16, content_type: String },

    /// Bearer token could not be obtained
    #[error("failed to obtain token: {0}")]
    Token(#[source] ContractError),

    /// Open stream failed while reading
    #[error("stream read failed: {0}")]
    Read(#[from] std::io::Error),
}

impl SseError {
    /// Retryable without closing the attempt (503 Service Unavailable)
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::UnexpectedResponse { status: 503, .. })
    }

    /// Protocol mismatch that closes the current attempt
    pub fn closes_attempt(&self) -> bool {
        matches!(self, Self::UnexpectedResponse { .. }) && !self.is_transient()
    }
}
