//! Server-Sent-Events transport: line parser and reconnecting client

mod client;
mod parser;

pub use client::{
    ConnectionStateCell, EventSourceHandlers, EventStreamClient, EventStreamConfig,
    DEFAULT_BUFFER_SIZE, DEFAULT_RETRY_DELAY,
};
pub use parser::{SseEvent, SseLineParser};
