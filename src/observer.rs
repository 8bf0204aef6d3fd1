use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::client::cache::QueryClient;
use crate::client::key::QueryKey;
use crate::client::state::{FetchStatus, QueryState};
use crate::console::context::DebugContext;
use crate::console::log::ConsoleLogger;

/// Freshness of the observed entry from this binding's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Fresh,
    Stale,
    Inactive,
}

/// Instrumentation attached to every observation pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub render_count: u64,
    pub last_update: DateTime<Utc>,
    pub query_hash: String,
    pub cache_status: CacheStatus,
    pub fetch_status: FetchStatus,
}

#[derive(Debug, Clone)]
pub struct DebugQueryResult {
    pub state: QueryState,
    pub is_stale: bool,
    pub observer_count: usize,
    pub debug_info: DebugInfo,
}

/// Wraps one query binding with instrumentation: counts observation
/// passes, logs every state transition into the tracker, and projects
/// `DebugInfo` alongside the plain query result.
///
/// The render counter belongs to this instance alone; it resets only
/// when the instance is dropped and a new one is built.
pub struct DebugQueryObserver {
    client: QueryClient,
    key: QueryKey,
    debug_name: String,
    ctx: DebugContext,
    render_count: u64,
    last_update: DateTime<Utc>,
}

impl DebugQueryObserver {
    pub fn new(
        client: QueryClient,
        key: QueryKey,
        debug_name: Option<&str>,
        ctx: DebugContext,
    ) -> Self {
        client.observe(&key);
        Self {
            client,
            key,
            debug_name: debug_name.unwrap_or("DebugQuery").to_string(),
            ctx,
            render_count: 0,
            last_update: Utc::now(),
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    /// Dispatches a fetch for this binding's key and times it. The fetch
    /// itself is fire-and-forget; the timing sample is recorded when it
    /// settles.
    pub fn fetch<F, Fut, T, E>(&self, fetcher: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Serialize + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let timing = self
            .ctx
            .metrics
            .start_timing(&self.key.canonical(), "fetch");
        let join = self.client.fetch_query(self.key.clone(), fetcher);
        tokio::spawn(async move {
            let _ = join.await;
            timing.end();
        });
    }

    /// One observation pass: reads the entry, records the transition (if
    /// any) and returns the result with `DebugInfo` attached.
    pub fn observe(&mut self) -> DebugQueryResult {
        self.render_count += 1;
        self.ctx.logger.info(&[
            format!("[{}] render #{}", self.debug_name, self.render_count).into(),
            json!({ "queryKey": self.key.canonical(), "timestamp": Utc::now() }).into(),
        ]);

        let view = self.client.entry(&self.key);
        let (state, is_stale, observer_count) = match view {
            Some(view) => (view.state, view.is_stale, view.observer_count),
            None => (QueryState::new(), true, 0),
        };

        if let Some(updated_at) = state.data_updated_at {
            if updated_at > self.last_update {
                self.last_update = updated_at;
            }
        }

        let state_value = serde_json::to_value(&state).unwrap_or(serde_json::Value::Null);
        self.ctx.tracker.track_state_change(&self.key, state_value);

        if let Some(error) = &state.error {
            self.ctx.logger.error(&[
                format!("[{}] error observed:", self.debug_name).into(),
                json!({
                    "error": error,
                    "errorUpdatedAt": state.error_updated_at,
                    "failureCount": state.failure_count,
                })
                .into(),
            ]);
        }

        let cache_status = if observer_count == 0 {
            CacheStatus::Inactive
        } else if is_stale {
            CacheStatus::Stale
        } else {
            CacheStatus::Fresh
        };

        let debug_info = DebugInfo {
            render_count: self.render_count,
            last_update: self.last_update,
            query_hash: self.key.canonical(),
            cache_status,
            fetch_status: state.fetch_status,
        };

        DebugQueryResult {
            state,
            is_stale,
            observer_count,
            debug_info,
        }
    }
}

impl Drop for DebugQueryObserver {
    fn drop(&mut self) {
        self.client.unobserve(&self.key);
    }
}

/// Dumps every inspectable facet of a query result as grouped log lines.
pub fn log_query_internals(logger: &ConsoleLogger, result: &DebugQueryResult, label: &str) {
    logger.info(&[
        format!("[{}] status information:", label).into(),
        json!({
            "status": result.state.status,
            "fetchStatus": result.state.fetch_status,
            "isStale": result.is_stale,
            "observers": result.observer_count,
        })
        .into(),
    ]);

    logger.info(&[
        format!("[{}] timing information:", label).into(),
        json!({
            "dataUpdatedAt": result.state.data_updated_at,
            "errorUpdatedAt": result.state.error_updated_at,
        })
        .into(),
    ]);

    logger.info(&[
        format!("[{}] retry information:", label).into(),
        json!({
            "failureCount": result.state.failure_count,
            "failureReason": result.state.error,
        })
        .into(),
    ]);

    if let Some(data) = &result.state.data {
        logger.info(&[format!("[{}] data:", label).into(), data.clone().into()]);
    }
    if let Some(error) = &result.state.error {
        logger.error(&[format!("[{}] error: {}", label, error).into()]);
    }
}
