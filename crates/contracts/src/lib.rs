//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the monitoring adapter.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data flow
//! - A `StreamSink` hands `(subject, payload)` pairs to its registered callback
//! - The dispatcher wraps them in `RawMessage` and queues them
//! - A `Provider` turns each payload into `CommonRecord`s and acts on them through `SystemActions`
//!
//! ## Time Model
//! - `CommonRecord` timestamps are nanoseconds since the Unix epoch (i64)

mod actions;
mod auth;
mod error;
mod listener_config;
mod message;
mod provider;
mod record;
mod stream_sink;

pub use actions::SystemActions;
pub use auth::TokenAuthentication;
pub use error::*;
pub use listener_config::*;
pub use message::{RawMessage, StreamConnectionState};
pub use provider::Provider;
pub use record::*;
pub use stream_sink::{SinkMessageCallback, StreamLocationCallback, StreamSink, TransportArguments};
