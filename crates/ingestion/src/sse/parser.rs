//! Line oriented Server-Sent-Events parser
//!
//! Grammar handled:
//! - `:` comment lines are ignored
//! - `event:` sets the pending event name
//! - `data:` appends to the pending data, multiple lines joined with `\n`
//! - `id:` sets the last event id (kept across events for resumption)
//! - a blank line dispatches the pending event, or silently discards it when
//!   no data was collected
//!
//! Field values are trimmed. Unknown fields are ignored.

/// One dispatched event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// `event:` name, empty when the server sent none
    pub event: String,
    /// `data:` lines joined with `\n`
    pub data: String,
    /// Last id seen on the stream at dispatch time
    pub id: Option<String>,
}

/// Event being assembled from successive field lines
#[derive(Debug, Default)]
struct PendingEvent {
    event_name: String,
    data: Vec<String>,
}

impl PendingEvent {
    fn has_data(&self) -> bool {
        self.data.iter().any(|line| !line.trim().is_empty())
    }
}

/// Incremental parser fed one line at a time (without line terminator)
#[derive(Debug, Default)]
pub struct SseLineParser {
    pending: PendingEvent,
    last_event_id: Option<String>,
}

impl SseLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a known id, e.g. the resume cursor of a previous connection
    pub fn with_last_event_id(last_event_id: Option<String>) -> Self {
        Self {
            pending: PendingEvent::default(),
            last_event_id,
        }
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Feed one line; returns an event when the line completes one
    pub fn push_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.starts_with(':') {
            return None;
        }

        if line.trim().is_empty() {
            if !self.pending.has_data() {
                self.pending = PendingEvent::default();
                return None;
            }
            let pending = std::mem::take(&mut self.pending);
            return Some(SseEvent {
                event: pending.event_name,
                data: pending.data.join("\n"),
                id: self.last_event_id.clone(),
            });
        }

        if let Some(value) = line.strip_prefix("event:") {
            self.pending.event_name = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            self.pending.data.push(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("id:") {
            self.last_event_id = Some(value.trim().to_string());
        }

        None
    }
}
