//! Transport argument access and per-stream metrics

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::{TransportArguments, SUBJECTS_KEY};

use crate::error::{IngestionError, Result};

/// Subject that matches every event name
pub const WILDCARD_SUBJECT: &str = "*";

/// Typed view over one stream's flattened arguments
#[derive(Debug, Clone, Copy)]
pub struct ArgumentReader<'a> {
    stream: &'a str,
    args: &'a TransportArguments,
}

impl<'a> ArgumentReader<'a> {
    pub fn new(stream: &'a str, args: &'a TransportArguments) -> Self {
        Self { stream, args }
    }

    pub fn stream(&self) -> &'a str {
        self.stream
    }

    /// Non-blank value of `key`
    pub fn optional(&self, key: &str) -> Option<&'a str> {
        self.args
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, key: &str) -> Result<&'a str> {
        self.optional(key)
            .ok_or_else(|| IngestionError::missing_argument(self.stream, key))
    }

    /// Parse `key`, or return `default` when absent
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e: T::Err| IngestionError::invalid_argument(self.stream, key, e.to_string())),
            None => Ok(default),
        }
    }

    /// Millisecond argument as a Duration
    pub fn millis_or(&self, key: &str, default: Duration) -> Result<Duration> {
        match self.optional(key) {
            Some(_) => Ok(Duration::from_millis(self.parse_or(key, 0u64)?)),
            None => Ok(default),
        }
    }

    /// All `<prefix>.<name>` entries as `(name, value)` pairs, sorted by name
    pub fn with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        let prefix = format!("{prefix}.");
        let mut entries: Vec<(String, String)> = self
            .args
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(&prefix)
                    .filter(|name| !name.is_empty())
                    .map(|name| (name.to_string(), v.clone()))
            })
            .collect();
        entries.sort();
        entries
    }

    /// Comma separated `subjects`, defaulting to the wildcard
    pub fn subjects(&self) -> Vec<String> {
        let subjects: Vec<String> = self
            .optional(SUBJECTS_KEY)
            .unwrap_or(WILDCARD_SUBJECT)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if subjects.is_empty() {
            vec![WILDCARD_SUBJECT.to_string()]
        } else {
            subjects
        }
    }
}

/// True when `subject` passes a subject list
pub fn subject_allowed(subjects: &[String], subject: &str) -> bool {
    subjects
        .iter()
        .any(|s| s == WILDCARD_SUBJECT || s == subject)
}

/// Per-stream counters
#[derive(Debug, Default)]
pub struct StreamMetrics {
    /// Events handed to the callback delegate
    pub messages_delivered: AtomicU64,

    /// Events dropped by the subject filter or for lack of a delegate
    pub messages_dropped: AtomicU64,

    /// Successful connection opens
    pub connections_opened: AtomicU64,

    /// Errors reported by the transport
    pub errors: AtomicU64,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_delivered(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StreamMetricsSnapshot {
        StreamMetricsSnapshot {
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`StreamMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamMetricsSnapshot {
    pub messages_delivered: u64,
    pub messages_dropped: u64,
    pub connections_opened: u64,
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> TransportArguments {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_required_and_optional() {
        let args = args(&[("fullUrl", "http://h/s"), ("lastId", "  ")]);
        let reader = ArgumentReader::new("s1", &args);

        assert_eq!(reader.required("fullUrl").unwrap(), "http://h/s");
        assert_eq!(reader.optional("lastId"), None);
        let err = reader.required("lastId").unwrap_err();
        assert!(err.to_string().contains("'lastId'"));
    }

    #[test]
    fn test_parse_or() {
        let args = args(&[("inputBufferSize", "4096"), ("retryDelayMs", "abc")]);
        let reader = ArgumentReader::new("s1", &args);

        assert_eq!(reader.parse_or("inputBufferSize", 1024usize).unwrap(), 4096);
        assert_eq!(reader.parse_or("missing", 7u32).unwrap(), 7);
        assert!(matches!(
            reader.millis_or("retryDelayMs", Duration::from_secs(1)),
            Err(IngestionError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_subjects_default_and_split() {
        let empty = TransportArguments::new();
        assert_eq!(ArgumentReader::new("s", &empty).subjects(), vec!["*"]);

        let args = args(&[("subjects", "telemetry, events,,")]);
        assert_eq!(
            ArgumentReader::new("s", &args).subjects(),
            vec!["telemetry", "events"]
        );
    }

    #[test]
    fn test_with_prefix() {
        let args = args(&[
            ("requestHeaders.X-Cluster", "c1"),
            ("requestHeaders.Accept-Language", "en"),
            ("requestHeaders.", "ignored"),
            ("other", "x"),
        ]);
        let headers = ArgumentReader::new("s", &args).with_prefix("requestHeaders");
        assert_eq!(
            headers,
            vec![
                ("Accept-Language".to_string(), "en".to_string()),
                ("X-Cluster".to_string(), "c1".to_string()),
            ]
        );
    }

    #[test]
    fn test_subject_allowed() {
        let subjects = vec!["telemetry".to_string()];
        assert!(subject_allowed(&subjects, "telemetry"));
        assert!(!subject_allowed(&subjects, "logs"));
        assert!(subject_allowed(&["*".to_string()], "anything"));
    }
}
