use std::path::PathBuf;

use super::context::DebugContext;
use super::export::{collect_debug_data, export_debug_data, DebugReport};

/// Process-wide debug tool surface. The embedder decides whether to build
/// one; everything that uses it holds an `Option<DebugTools>` and must
/// tolerate absence with a warning rather than a failure.
#[derive(Debug, Clone)]
pub struct DebugTools {
    ctx: DebugContext,
    export_dir: PathBuf,
}

impl DebugTools {
    pub fn new(ctx: DebugContext, export_dir: PathBuf) -> Self {
        Self { ctx, export_dir }
    }

    pub fn collect_data(&self) -> DebugReport {
        collect_debug_data(&self.ctx)
    }

    /// Fire-and-forget export into the configured directory. Returns the
    /// target path; completion is logged asynchronously.
    pub fn export_data(&self) -> PathBuf {
        export_debug_data(&self.ctx, &self.export_dir)
    }

    /// Logs the guide for instrumenting the query fetch path by hand.
    pub fn add_logs(&self) {
        self.ctx.logger.info(&[
            "To trace the fetch path, add log lines at these points in src/client/cache.rs:"
                .into(),
        ]);
        self.ctx.logger.info(&[concat!(
            "at the top of fetch_query: log the query key and retry budget;\n",
            "after begin_fetch: log the entry's previous status;\n",
            "in the retry loop: log each attempt number and failure reason;\n",
            "before settle_success/settle_error: log the final state and timings",
        )
        .into()]);
    }
}
