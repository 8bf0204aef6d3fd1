use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::cache::{CacheEntryView, CacheEvent, QueryClient};
use crate::client::state::{FetchStatus, QueryStatus};
use crate::console::log::ConsoleLogger;

/// Interval of the unconditional re-snapshot tick.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Point-in-time projection of one cache entry, recomputed on every poll.
/// Has no identity beyond the listing that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCacheSnapshot {
    pub query_key: String,
    pub status: QueryStatus,
    pub fetch_status: FetchStatus,
    pub data_updated_at: Option<DateTime<Utc>>,
    pub error_updated_at: Option<DateTime<Utc>>,
    pub is_stale: bool,
    pub observer_count: usize,
}

fn project(view: CacheEntryView) -> QueryCacheSnapshot {
    QueryCacheSnapshot {
        query_key: view.key.canonical(),
        status: view.state.status,
        fetch_status: view.state.fetch_status,
        data_updated_at: view.state.data_updated_at,
        error_updated_at: view.state.error_updated_at,
        is_stale: view.is_stale,
        observer_count: view.observer_count,
    }
}

struct PollerShared {
    snapshots: Mutex<Vec<QueryCacheSnapshot>>,
    auto_refresh: AtomicBool,
    client: Mutex<QueryClient>,
    logger: ConsoleLogger,
}

impl PollerShared {
    fn refresh(&self) {
        let client = {
            let guard = self.client.lock().unwrap_or_else(|e| e.into_inner());
            guard.clone()
        };
        let snapshots: Vec<QueryCacheSnapshot> =
            client.entries().into_iter().map(project).collect();

        let summary: Vec<_> = snapshots
            .iter()
            .map(|snap| {
                json!({
                    "key": snap.query_key,
                    "status": snap.status,
                    "fetchStatus": snap.fetch_status,
                    "isStale": snap.is_stale,
                    "observers": snap.observer_count,
                })
            })
            .collect();

        {
            let mut current = self.snapshots.lock().unwrap_or_else(|e| e.into_inner());
            *current = snapshots;
        }
        self.logger
            .info(&["Query cache updated:".into(), json!(summary).into()]);
    }

    fn auto_refresh(&self) -> bool {
        self.auto_refresh.load(Ordering::Relaxed)
    }
}

/// Maintains the current snapshot table of the observed cache.
///
/// Two triggers re-snapshot, both gated by the auto-refresh flag: cache
/// change notifications, and a fixed 1000ms interval. The interval is not
/// redundant with the subscription: observer-count changes do not emit a
/// notification, so only the timer picks them up.
///
/// Dropping the poller cancels the timer and the subscription; nothing
/// leaks past teardown. In-flight fetches belong to the client and are
/// not cancelled.
pub struct CacheSnapshotPoller {
    shared: Arc<PollerShared>,
    cancel: CancellationToken,
    subscription: CancellationToken,
}

impl CacheSnapshotPoller {
    pub fn new(client: QueryClient, logger: ConsoleLogger) -> Self {
        let shared = Arc::new(PollerShared {
            snapshots: Mutex::new(Vec::new()),
            auto_refresh: AtomicBool::new(true),
            client: Mutex::new(client.clone()),
            logger,
        });
        // Initial load before any trigger fires.
        shared.refresh();

        let cancel = CancellationToken::new();
        let subscription = cancel.child_token();

        spawn_interval_task(Arc::clone(&shared), cancel.clone());
        spawn_subscription_task(Arc::clone(&shared), client.subscribe(), subscription.clone());

        Self {
            shared,
            cancel,
            subscription,
        }
    }

    /// Current rows, in listing order.
    pub fn snapshots(&self) -> Vec<QueryCacheSnapshot> {
        let snapshots = self
            .shared
            .snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        snapshots.clone()
    }

    /// Manual re-snapshot, independent of the auto-refresh flag.
    pub fn refresh(&self) {
        self.shared.refresh();
    }

    pub fn auto_refresh(&self) -> bool {
        self.shared.auto_refresh()
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        self.shared.auto_refresh.store(enabled, Ordering::Relaxed);
    }

    /// Swaps the observed client: the old subscription is torn down and a
    /// new one established, followed by an immediate re-snapshot.
    pub fn set_client(&mut self, client: QueryClient) {
        self.subscription.cancel();
        {
            let mut guard = self.shared.client.lock().unwrap_or_else(|e| e.into_inner());
            *guard = client.clone();
        }
        self.subscription = self.cancel.child_token();
        spawn_subscription_task(
            Arc::clone(&self.shared),
            client.subscribe(),
            self.subscription.clone(),
        );
        self.shared.refresh();
    }

    /// Delegates to the client's bulk-clear, then re-snapshots immediately
    /// rather than waiting for a trigger.
    pub fn clear_cache(&self) {
        self.shared
            .logger
            .info(&["Clearing all query cache".into()]);
        let client = {
            let guard = self.shared.client.lock().unwrap_or_else(|e| e.into_inner());
            guard.clone()
        };
        client.clear();
        self.shared.refresh();
    }

    /// Delegates to the client's bulk-invalidate. The resulting change
    /// notification drives the re-snapshot; none is forced here.
    pub fn invalidate_all(&self) {
        self.shared.logger.info(&["Invalidating all queries".into()]);
        let client = {
            let guard = self.shared.client.lock().unwrap_or_else(|e| e.into_inner());
            guard.clone()
        };
        client.invalidate_all();
    }
}

impl Drop for CacheSnapshotPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn spawn_interval_task(shared: Arc<PollerShared>, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut cadence = interval(POLL_INTERVAL);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = cadence.tick() => {
                    if shared.auto_refresh() {
                        shared.refresh();
                    }
                }
            }
        }
    });
}

fn spawn_subscription_task(
    shared: Arc<PollerShared>,
    mut events: broadcast::Receiver<CacheEvent>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Ok(_) => {
                        if shared.auto_refresh() {
                            shared.refresh();
                        }
                    }
                    // Missed notifications are fine; the interval tick
                    // catches the table up.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    });
}
