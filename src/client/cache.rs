use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::key::QueryKey;
use super::state::QueryState;
use crate::console::log::ConsoleLogger;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
    Added,
    Updated,
    Removed,
    Cleared,
    Invalidated,
}

/// Change notification. `key` is absent for cache-wide events.
///
/// Observer-count changes do not emit an event; consumers that need to
/// see those must poll (the snapshot poller's interval trigger exists for
/// exactly this reason).
#[derive(Debug, Clone)]
pub struct CacheEvent {
    pub kind: CacheEventKind,
    pub key: Option<QueryKey>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Freshness window: an entry with data older than this is stale.
    pub stale_time: Duration,
    /// Retry attempts after the initial failure before settling in error.
    pub retry: u32,
    /// Backoff between attempts; the entry reports `paused` while waiting.
    pub retry_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            retry: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug)]
struct Entry {
    state: QueryState,
    invalidated: bool,
    observers: usize,
}

impl Entry {
    fn new() -> Self {
        Self {
            state: QueryState::new(),
            invalidated: false,
            observers: 0,
        }
    }
}

/// Read-only projection of one cache entry at a point in time.
#[derive(Debug, Clone)]
pub struct CacheEntryView {
    pub key: QueryKey,
    pub state: QueryState,
    pub is_stale: bool,
    pub observer_count: usize,
}

struct CacheInner {
    entries: Mutex<BTreeMap<QueryKey, Entry>>,
    events: broadcast::Sender<CacheEvent>,
    config: ClientConfig,
    logger: ConsoleLogger,
}

impl CacheInner {
    fn emit(&self, kind: CacheEventKind, key: Option<QueryKey>) {
        // Delivery is best-effort; no receivers is not an error.
        let _ = self.events.send(CacheEvent { kind, key });
    }

    fn is_stale(&self, entry: &Entry) -> bool {
        if entry.invalidated {
            return true;
        }
        match (entry.state.data.as_ref(), entry.state.data_updated_at) {
            (Some(_), Some(updated_at)) => match chrono::Duration::from_std(self.config.stale_time)
            {
                Ok(window) => updated_at
                    .checked_add_signed(window)
                    .map_or(false, |expires_at| expires_at <= Utc::now()),
                // Window too large to represent: data never goes stale.
                Err(_) => false,
            },
            _ => true,
        }
    }

    fn view(&self, key: &QueryKey, entry: &Entry) -> CacheEntryView {
        CacheEntryView {
            key: key.clone(),
            state: entry.state.clone(),
            is_stale: self.is_stale(entry),
            observer_count: entry.observers,
        }
    }

    fn begin_fetch(&self, key: &QueryKey) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let added = !entries.contains_key(key);
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        entry.state.fetch_started();
        drop(entries);
        self.emit(
            if added {
                CacheEventKind::Added
            } else {
                CacheEventKind::Updated
            },
            Some(key.clone()),
        );
        added
    }

    fn record_attempt_failure(&self, key: &QueryKey, reason: String, attempt: u32) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(key) {
            entry.state.attempt_failed(reason, attempt);
        }
        drop(entries);
        self.emit(CacheEventKind::Updated, Some(key.clone()));
    }

    fn resume_fetch(&self, key: &QueryKey) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(key) {
            entry.state.fetch_resumed();
        }
        drop(entries);
        self.emit(CacheEventKind::Updated, Some(key.clone()));
    }

    fn settle_success(&self, key: &QueryKey, data: Value) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(key) {
            entry.state.fetch_succeeded(data);
            entry.invalidated = false;
        }
        drop(entries);
        self.emit(CacheEventKind::Updated, Some(key.clone()));
        self.logger
            .info(&[format!("Fetch succeeded for {}", key).into()]);
    }

    fn settle_error(&self, key: &QueryKey, reason: String) {
        let failure_count;
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            match entries.get_mut(key) {
                Some(entry) => {
                    entry.state.fetch_failed(reason.clone());
                    failure_count = entry.state.failure_count;
                }
                None => return,
            }
        }
        self.emit(CacheEventKind::Updated, Some(key.clone()));
        self.logger.error(&[format!(
            "Fetch failed for {} after {} failed attempt(s): {}",
            key, failure_count, reason
        )
        .into()]);
    }
}

/// In-process query client: the collaborator the debug console observes.
/// Cheap to clone; all clones share one cache.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<CacheInner>,
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.entries().len())
            .finish()
    }
}

impl QueryClient {
    pub fn new(config: ClientConfig, logger: ConsoleLogger) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(BTreeMap::new()),
                events,
                config,
                logger,
            }),
        }
    }

    /// Change-notification subscription. Dropping the receiver is the
    /// unsubscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    /// All entries, ordered by key so repeated listings are stable.
    pub fn entries(&self) -> Vec<CacheEntryView> {
        let entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .map(|(key, entry)| self.inner.view(key, entry))
            .collect()
    }

    pub fn entry(&self, key: &QueryKey) -> Option<CacheEntryView> {
        let entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).map(|entry| self.inner.view(key, entry))
    }

    /// Seeds an entry with settled data, creating it if needed.
    pub fn set_query_data<T: Serialize>(&self, key: &QueryKey, data: T) {
        let data = serde_json::to_value(data).unwrap_or(Value::Null);
        let mut entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        entry.state.fetch_succeeded(data);
        entry.invalidated = false;
        drop(entries);
        self.inner.emit(CacheEventKind::Updated, Some(key.clone()));
    }

    /// Registers a UI binding on an entry, creating the entry if absent.
    /// Deliberately does not notify; see `CacheEvent`.
    pub fn observe(&self, key: &QueryKey) {
        let mut entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.entry(key.clone()).or_insert_with(Entry::new).observers += 1;
    }

    pub fn unobserve(&self, key: &QueryKey) {
        let mut entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(key) {
            entry.observers = entry.observers.saturating_sub(1);
        }
    }

    /// Bulk-clear: drops every entry.
    pub fn clear(&self) {
        let mut entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
        drop(entries);
        self.inner.emit(CacheEventKind::Cleared, None);
    }

    /// Bulk-invalidate: marks every entry stale without touching data.
    pub fn invalidate_all(&self) {
        let mut entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        for entry in entries.values_mut() {
            entry.invalidated = true;
        }
        drop(entries);
        self.inner.emit(CacheEventKind::Invalidated, None);
    }

    pub fn remove(&self, key: &QueryKey) {
        let mut entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        let removed = entries.remove(key).is_some();
        drop(entries);
        if removed {
            self.inner.emit(CacheEventKind::Removed, Some(key.clone()));
        }
    }

    /// Dispatches an async fetch for `key`. Fire-and-forget from the
    /// caller's perspective: control returns immediately and the entry's
    /// state transitions (and log lines) land as the fetch settles.
    ///
    /// The fetcher is invoked once per attempt. Failed attempts pause for
    /// `retry_delay` and retry until the budget is spent, then the entry
    /// settles in `Error` with its failure count and reason.
    pub fn fetch_query<F, Fut, T, E>(&self, key: QueryKey, fetcher: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Serialize + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.begin_fetch(&key);
            let retry = inner.config.retry;
            let retry_delay = inner.config.retry_delay;
            let mut attempt = 0u32;

            loop {
                match fetcher().await {
                    Ok(value) => {
                        let data = serde_json::to_value(&value).unwrap_or(Value::Null);
                        inner.settle_success(&key, data);
                        break;
                    }
                    Err(err) => {
                        let reason = err.to_string();
                        if attempt >= retry {
                            inner.settle_error(&key, reason);
                            break;
                        }
                        attempt += 1;
                        inner.record_attempt_failure(&key, reason, attempt);
                        tokio::time::sleep(retry_delay).await;
                        inner.resume_fetch(&key);
                    }
                }
            }
        })
    }
}
