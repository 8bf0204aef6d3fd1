use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use super::log::ConsoleLogger;
use crate::client::key::QueryKey;

/// One recorded transition. Consecutive entries for a key are never
/// value-equal; `ms_since_previous` is 0 for the first entry of a key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateHistoryEntry {
    pub state: Value,
    pub timestamp: DateTime<Utc>,
    pub ms_since_previous: f64,
}

fn canonical(state: &Value) -> String {
    serde_json::to_string(state).unwrap_or_else(|_| "<unserializable>".to_string())
}

/// Records state transitions per query key, deduplicated by value
/// equality against the immediately preceding entry. Polling an unchanged
/// state therefore appends nothing, which bounds history size to the
/// number of genuine transitions.
#[derive(Debug)]
pub struct QueryStateTracker {
    history: Mutex<HashMap<String, Vec<StateHistoryEntry>>>,
    logger: ConsoleLogger,
}

impl QueryStateTracker {
    pub fn new(logger: ConsoleLogger) -> Self {
        Self {
            history: Mutex::new(HashMap::new()),
            logger,
        }
    }

    pub fn track_state_change(&self, key: &QueryKey, new_state: Value) {
        let key = key.canonical();
        let new_canonical = canonical(&new_state);

        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        let entries = history.entry(key.clone()).or_default();

        let previous = entries.last();
        if previous.map(|entry| canonical(&entry.state)) == Some(new_canonical) {
            return;
        }

        let now = Utc::now();
        let ms_since_previous = previous
            .map(|entry| {
                (now - entry.timestamp)
                    .num_milliseconds()
                    .max(0) as f64
            })
            .unwrap_or(0.0);
        let from = previous.map(|entry| entry.state.clone());

        entries.push(StateHistoryEntry {
            state: new_state.clone(),
            timestamp: now,
            ms_since_previous,
        });
        drop(history);

        self.logger.info(&[
            format!("State change for {}:", key).into(),
            json!({
                "from": from,
                "to": new_state,
                "msSincePrevious": ms_since_previous,
            })
            .into(),
        ]);
    }

    /// History for one key, oldest first. Unknown keys yield an empty
    /// sequence, never an error.
    pub fn state_history(&self, key: &QueryKey) -> Vec<StateHistoryEntry> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.get(&key.canonical()).cloned().unwrap_or_default()
    }

    pub fn all_history(&self) -> HashMap<String, Vec<StateHistoryEntry>> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.clone()
    }

    pub fn clear(&self) {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.clear();
        drop(history);
        self.logger.info(&["State history cleared".into()]);
    }
}
