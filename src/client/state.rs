use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Data availability: is there a settled result for this query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Pending,
    Error,
    Success,
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryStatus::Pending => "pending",
            QueryStatus::Error => "error",
            QueryStatus::Success => "success",
        };
        f.write_str(s)
    }
}

/// In-flight activity, independent of whether data is present. `Paused`
/// marks the backoff window between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Fetching,
    Paused,
    Idle,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchStatus::Fetching => "fetching",
            FetchStatus::Paused => "paused",
            FetchStatus::Idle => "idle",
        };
        f.write_str(s)
    }
}

/// Per-entry state. Mutated only through the transition methods below,
/// which keep status, timestamps and failure bookkeeping consistent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryState {
    pub status: QueryStatus,
    pub fetch_status: FetchStatus,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub data_updated_at: Option<DateTime<Utc>>,
    pub error_updated_at: Option<DateTime<Utc>>,
    pub failure_count: u32,
}

impl QueryState {
    pub fn new() -> Self {
        Self {
            status: QueryStatus::Pending,
            fetch_status: FetchStatus::Idle,
            data: None,
            error: None,
            data_updated_at: None,
            error_updated_at: None,
            failure_count: 0,
        }
    }

    pub fn fetch_started(&mut self) {
        self.fetch_status = FetchStatus::Fetching;
    }

    /// A failed attempt with retries remaining: the entry pauses until
    /// the next attempt. Never fatal, always recoverable by retry.
    pub fn attempt_failed(&mut self, reason: String, attempt: u32) {
        self.failure_count = attempt;
        self.error = Some(reason);
        self.fetch_status = FetchStatus::Paused;
    }

    pub fn fetch_resumed(&mut self) {
        self.fetch_status = FetchStatus::Fetching;
    }

    pub fn fetch_succeeded(&mut self, data: Value) {
        self.status = QueryStatus::Success;
        self.fetch_status = FetchStatus::Idle;
        self.data = Some(data);
        self.error = None;
        self.failure_count = 0;
        self.data_updated_at = Some(Utc::now());
    }

    /// Retry budget exhausted: the entry settles in `Error`. The failure
    /// count includes this final attempt.
    pub fn fetch_failed(&mut self, reason: String) {
        self.status = QueryStatus::Error;
        self.fetch_status = FetchStatus::Idle;
        self.failure_count += 1;
        self.error = Some(reason);
        self.error_updated_at = Some(Utc::now());
    }
}

impl Default for QueryState {
    fn default() -> Self {
        Self::new()
    }
}
