use std::sync::Arc;

use serde::Serialize;

use super::log::{ConsoleLogger, LogBuffer, DEFAULT_LOG_CAPACITY};
use super::metrics::PerformanceMonitor;
use super::tracker::QueryStateTracker;

/// Embedder-supplied metadata stamped onto exported debug reports.
#[derive(Debug, Clone, Serialize)]
pub struct Environment {
    pub user_agent: String,
    pub url: String,
}

/// The one shared instance of the debug console's recorders. Constructed
/// once at process start and passed to whatever needs it; there is no
/// hidden global. No teardown is required, the context lives as long as
/// the process (tests simply build a fresh one).
#[derive(Debug, Clone)]
pub struct DebugContext {
    pub logger: ConsoleLogger,
    pub log_buffer: Arc<LogBuffer>,
    pub metrics: Arc<PerformanceMonitor>,
    pub tracker: Arc<QueryStateTracker>,
    pub environment: Environment,
}

impl DebugContext {
    pub fn new(environment: Environment) -> Self {
        Self::with_log_capacity(environment, DEFAULT_LOG_CAPACITY)
    }

    pub fn with_log_capacity(environment: Environment, capacity: usize) -> Self {
        let log_buffer = Arc::new(LogBuffer::new(capacity));
        let logger = ConsoleLogger::new(Arc::clone(&log_buffer));
        Self {
            metrics: Arc::new(PerformanceMonitor::new(logger.clone())),
            tracker: Arc::new(QueryStateTracker::new(logger.clone())),
            logger,
            log_buffer,
            environment,
        }
    }
}
