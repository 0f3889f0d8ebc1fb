//! Error types for CLI operations.

use std::path::Path;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Profile missing from the configuration
    #[error("Profile '{profile}' is not defined (available: {available})")]
    UnknownProfile { profile: String, available: String },

    /// Dispatcher thread failed or panicked
    #[error("Dispatcher execution failed: {message}")]
    DispatcherExecution { message: String },
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn unknown_profile<'a>(
        profile: impl Into<String>,
        available: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        Self::UnknownProfile {
            profile: profile.into(),
            available: available
                .into_iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    pub fn dispatcher_execution(message: impl Into<String>) -> Self {
        Self::DispatcherExecution {
            message: message.into(),
        }
    }
}
