//! Normalized log types shared by every backend.

use serde::{Deserialize, Serialize};

/// Structured part of a log entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogBody {
    /// Severity (`info`, `warning`, `error`, ...).
    #[serde(default)]
    pub level: String,
    /// Region the entry was emitted in, if known.
    #[serde(default)]
    pub region: Option<String>,
    /// Message text.
    #[serde(default)]
    pub message: String,
}

/// One normalized log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Unique within a query result.
    pub id: String,
    /// Microseconds since the Unix epoch.
    pub timestamp: i64,
    /// Flat message text.
    pub event_message: String,
    /// Structured body.
    pub body: LogBody,
}

impl LogEntry {
    /// Creates an entry whose event message equals its body message.
    pub fn new(
        id: impl Into<String>,
        timestamp: i64,
        level: impl Into<String>,
        region: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            id: id.into(),
            timestamp,
            event_message: message.clone(),
            body: LogBody {
                level: level.into(),
                region,
                message,
            },
        }
    }

    /// Case-insensitive substring match on the message fields.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.event_message.to_lowercase().contains(&needle)
            || self.body.message.to_lowercase().contains(&needle)
    }
}

/// One page of log entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    /// Entries in this page.
    pub entries: Vec<LogEntry>,
    /// Opaque continuation token.
    pub cursor: Option<String>,
    /// True iff `cursor` is set.
    pub has_more: bool,
}

impl LogPage {
    /// Creates a page; `has_more` follows `cursor`.
    #[must_use]
    pub fn new(entries: Vec<LogEntry>, cursor: Option<String>) -> Self {
        let has_more = cursor.is_some();
        Self {
            entries,
            cursor,
            has_more,
        }
    }

    /// Creates an empty final page.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// A named log stream and the backend that serves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSource {
    /// Logical source name.
    pub name: String,
    /// Backend name.
    pub backend: String,
}
