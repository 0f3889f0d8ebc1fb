//! Raw inbound messages and connection lifecycle states

use serde::{Deserialize, Serialize};

/// A `(subject, payload)` pair as delivered by a stream sink.
///
/// Owned by exactly one thread at a time: the producing I/O thread until it
/// is queued, then the single worker that dequeues it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    subject: String,
    payload: String,
}

impl RawMessage {
    pub fn new(subject: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Split into `(subject, payload)`
    pub fn into_parts(self) -> (String, String) {
        (self.subject, self.payload)
    }
}

/// Lifecycle of one event-stream connection.
///
/// `Closed` is terminal: once entered no transition leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamConnectionState {
    #[default]
    Initial,
    Connecting,
    Open,
    Closed,
}

impl StreamConnectionState {
    /// Compact encoding used for lock-free state cells
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Initial => 0,
            Self::Connecting => 1,
            Self::Open => 2,
            Self::Closed => 3,
        }
    }

    /// Inverse of [`as_u8`](Self::as_u8); unknown values decode as `Closed`
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Initial,
            1 => Self::Connecting,
            2 => Self::Open,
            _ => Self::Closed,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Closed
    }
}

impl std::fmt::Display for StreamConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initial => "initial",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}
