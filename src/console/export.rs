use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::context::DebugContext;
use super::metrics::MetricSample;
use super::tracker::StateHistoryEntry;
use crate::error::ExportError;

/// The export artifact: everything the console recorded plus environment
/// metadata, in one JSON document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugReport {
    pub performance: HashMap<String, Vec<MetricSample>>,
    pub state_history: HashMap<String, Vec<StateHistoryEntry>>,
    pub timestamp: DateTime<Utc>,
    pub user_agent: String,
    pub url: String,
}

/// Snapshot of the recorders at call time.
pub fn collect_debug_data(ctx: &DebugContext) -> DebugReport {
    DebugReport {
        performance: ctx.metrics.metrics(None),
        state_history: ctx.tracker.all_history(),
        timestamp: Utc::now(),
        user_agent: ctx.environment.user_agent.clone(),
        url: ctx.environment.url.clone(),
    }
}

pub fn export_file_name(at: DateTime<Utc>) -> String {
    format!("debug-{}.json", at.timestamp_millis())
}

/// Serializes and writes a report to `path`.
pub async fn write_report(report: &DebugReport, path: &Path) -> Result<(), ExportError> {
    let body = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, body).await.map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Collects a report and writes it to `dir` as `debug-<epoch-ms>.json`.
///
/// The write is fire-and-forget: the target path is returned immediately
/// and completion or failure is logged when the write settles. Nothing in
/// this path can panic the caller.
pub fn export_debug_data(ctx: &DebugContext, dir: &Path) -> PathBuf {
    let report = collect_debug_data(ctx);
    let path = dir.join(export_file_name(report.timestamp));
    let logger = ctx.logger.clone();

    let target = path.clone();
    tokio::spawn(async move {
        match write_report(&report, &target).await {
            Ok(()) => logger.info(&[format!("Debug data exported to {}", target.display()).into()]),
            Err(err) => logger.error(&[format!("Debug data export failed: {}", err).into()]),
        }
    });

    path
}
