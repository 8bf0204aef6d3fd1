use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Default ring capacity. Matches the panel's "keep the newest 50 lines".
pub const DEFAULT_LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
}

/// One argument of a log call. Structured values are carried as-is and
/// only formatted when the line is assembled, so formatting stays
/// deterministic regardless of what the call site passed.
#[derive(Debug, Clone)]
pub enum LogValue {
    Text(String),
    Structured(Value),
}

impl LogValue {
    fn render(&self) -> String {
        match self {
            LogValue::Text(text) => text.clone(),
            LogValue::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| "<unserializable>".to_string())
            }
        }
    }
}

impl From<&str> for LogValue {
    fn from(text: &str) -> Self {
        LogValue::Text(text.to_string())
    }
}

impl From<String> for LogValue {
    fn from(text: String) -> Self {
        LogValue::Text(text)
    }
}

impl From<Value> for LogValue {
    fn from(value: Value) -> Self {
        LogValue::Structured(value)
    }
}

/// Captured log line. Immutable once created; destroyed only by eviction
/// or an explicit buffer clear.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Bounded FIFO of captured log lines, oldest first. Push is O(1); once
/// the buffer is full the oldest entry is dropped.
#[derive(Debug)]
pub struct LogBuffer {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, level: LogLevel, message: String) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(LogEntry {
            timestamp: Utc::now(),
            level,
            message,
        });
    }

    /// Current contents in insertion order (oldest first).
    pub fn entries(&self) -> Vec<LogEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

fn format_parts(parts: &[LogValue]) -> String {
    parts
        .iter()
        .map(LogValue::render)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fan-out logger: every record goes to the tracing sink and, formatted,
/// into the ring buffer. Call sites receive this by injection instead of
/// the process sink being patched underneath them. Neither path can fail,
/// so logging through here never propagates an error to the call site.
///
/// The ring captures `info` and `error` only; `warn` goes to the tracing
/// sink alone.
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    buffer: Arc<LogBuffer>,
}

impl ConsoleLogger {
    pub fn new(buffer: Arc<LogBuffer>) -> Self {
        Self { buffer }
    }

    pub fn buffer(&self) -> &Arc<LogBuffer> {
        &self.buffer
    }

    pub fn info(&self, parts: &[LogValue]) {
        let message = format_parts(parts);
        tracing::info!("{}", message);
        self.buffer.push(LogLevel::Info, message);
    }

    pub fn error(&self, parts: &[LogValue]) {
        let message = format_parts(parts);
        tracing::error!("{}", message);
        self.buffer.push(LogLevel::Error, message);
    }

    /// Forwarded to the tracing sink only; never captured by the ring.
    pub fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }
}
