use std::fmt::Write as _;
use std::path::PathBuf;

use serde_json::json;

use super::poller::CacheSnapshotPoller;
use crate::client::cache::QueryClient;
use crate::console::context::DebugContext;
use crate::console::log::{LogEntry, LogLevel};
use crate::console::tools::DebugTools;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelMode {
    Collapsed,
    Expanded,
}

/// The debug panel: owns the poller, fronts the console's recorders, and
/// renders the whole thing as text. Collapsed mode shows only a summary
/// affordance; there is no partial state between the two modes.
pub struct DebugPanel {
    ctx: DebugContext,
    poller: CacheSnapshotPoller,
    tools: Option<DebugTools>,
    mode: PanelMode,
}

impl DebugPanel {
    pub fn new(ctx: DebugContext, client: QueryClient, tools: Option<DebugTools>) -> Self {
        let poller = CacheSnapshotPoller::new(client, ctx.logger.clone());
        Self {
            ctx,
            poller,
            tools,
            mode: PanelMode::Collapsed,
        }
    }

    pub fn mode(&self) -> PanelMode {
        self.mode
    }

    pub fn toggle(&mut self) {
        self.mode = match self.mode {
            PanelMode::Collapsed => PanelMode::Expanded,
            PanelMode::Expanded => PanelMode::Collapsed,
        };
    }

    pub fn poller(&self) -> &CacheSnapshotPoller {
        &self.poller
    }

    pub fn poller_mut(&mut self) -> &mut CacheSnapshotPoller {
        &mut self.poller
    }

    /// Empties the log ring only; metrics and state history are untouched.
    /// The confirmation line lands in the freshly cleared buffer.
    pub fn clear_logs(&self) {
        self.ctx.log_buffer.clear();
        self.ctx.logger.info(&["Debug logs cleared".into()]);
    }

    /// Delegates to the debug tools when installed; otherwise reports a
    /// no-op warning. Never fails either way.
    pub fn export_debug_data(&self) -> Option<PathBuf> {
        match &self.tools {
            Some(tools) => Some(tools.export_data()),
            None => {
                self.ctx.logger.warn("Debug tools not available");
                None
            }
        }
    }

    pub fn show_debug_instructions(&self) {
        match &self.tools {
            Some(tools) => tools.add_logs(),
            None => self.ctx.logger.warn("Debug tools not available"),
        }
    }

    pub fn invalidate_all(&self) {
        self.poller.invalidate_all();
    }

    pub fn clear_cache(&self) {
        self.poller.clear_cache();
    }

    pub fn render(&self) -> String {
        let logs = self.ctx.log_buffer.entries();
        let snapshots = self.poller.snapshots();

        if self.mode == PanelMode::Collapsed {
            return format!(
                "[debug panel] collapsed: {} log(s), {} quer{} cached\n",
                logs.len(),
                snapshots.len(),
                if snapshots.len() == 1 { "y" } else { "ies" },
            );
        }

        let mut out = String::new();
        out.push_str("=== debug panel ===\n");
        out.push_str("actions: invalidate-all | clear-cache | export | clear-logs\n\n");

        let _ = writeln!(out, "logs ({}):", logs.len());
        if logs.is_empty() {
            out.push_str("  (no logs yet)\n");
        } else {
            for entry in &logs {
                let _ = writeln!(out, "  {}", render_log_line(entry));
            }
        }

        let _ = writeln!(out, "\nquery cache ({} entries):", snapshots.len());
        if snapshots.is_empty() {
            out.push_str("  (no active queries - trigger a fetch to see state here)\n");
        } else {
            let _ = writeln!(
                out,
                "  {:<32} {:<8} {:<9} {:<6} {:>9}  {}",
                "key", "status", "fetch", "data", "observers", "updated"
            );
            for snap in &snapshots {
                let updated = snap
                    .data_updated_at
                    .map(|at| at.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                let _ = writeln!(
                    out,
                    "  {:<32} {:<8} {:<9} {:<6} {:>9}  {}",
                    snap.query_key,
                    snap.status.to_string(),
                    snap.fetch_status.to_string(),
                    if snap.is_stale { "stale" } else { "fresh" },
                    snap.observer_count,
                    updated,
                );
            }
        }

        let summary = json!({
            "totalQueries": snapshots.len(),
            "autoRefresh": self.poller.auto_refresh(),
            "timestamp": chrono::Utc::now(),
        });
        let _ = writeln!(
            out,
            "\nsummary: {}",
            serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "<unserializable>".into())
        );

        out
    }
}

fn render_log_line(entry: &LogEntry) -> String {
    let time = entry.timestamp.format("%H:%M:%S");
    match entry.level {
        LogLevel::Info => format!("[{}] {}", time, entry.message),
        LogLevel::Error => format!("[{}] ERROR: {}", time, entry.message),
    }
}
