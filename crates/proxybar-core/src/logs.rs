//! Bounded buffer of supervised-process output.
//!
//! The buffer itself is not synchronized; the supervisor keeps it behind its
//! state lock so every append happens on one serialized path.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;

/// Marker prepended to error-stream lines in their formatted form.
pub const ERROR_MARKER: &str = "[ERROR] ";

/// One captured line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub text: String,
    pub is_error: bool,
}

impl LogEntry {
    pub fn new(text: impl Into<String>, is_error: bool) -> Self {
        Self {
            timestamp: Local::now(),
            text: text.into(),
            is_error,
        }
    }

    /// `[HH:MM:SS] text`, with the error marker for error-stream lines.
    pub fn formatted(&self) -> String {
        let marker = if self.is_error { ERROR_MARKER } else { "" };
        format!("[{}] {}{}", self.timestamp.format("%H:%M:%S"), marker, self.text)
    }
}

/// FIFO log buffer with a fixed capacity.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest beyond capacity.
    ///
    /// Returns the formatted line for the log-updated event.
    pub fn append(&mut self, entry: LogEntry) -> String {
        let line = entry.formatted();
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        line
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Current entries, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Current entries as formatted lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(LogEntry::formatted).collect()
    }

    /// The last `n` formatted lines, oldest first.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).map(LogEntry::formatted).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
