use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::log::ConsoleLogger;

/// One completed timing measurement. Offsets are milliseconds since the
/// monitor's construction instant. The composite key a sample was
/// recorded under lives in the surrounding map; the sample does not
/// repeat it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub start_time: f64,
    pub end_time: f64,
    pub duration_ms: f64,
    pub timestamp: DateTime<Utc>,
}

/// Records timing samples keyed by `<query key>-<operation>`. One shared
/// instance lives in the `DebugContext`; samples are only removed by
/// `clear`.
#[derive(Debug)]
pub struct PerformanceMonitor {
    origin: Instant,
    samples: Mutex<HashMap<String, Vec<MetricSample>>>,
    logger: ConsoleLogger,
}

impl PerformanceMonitor {
    pub fn new(logger: ConsoleLogger) -> Self {
        Self {
            origin: Instant::now(),
            samples: Mutex::new(HashMap::new()),
            logger,
        }
    }

    /// Begins a measurement for `operation` on `query_key`. The returned
    /// handle owns the start instant; the sample is recorded when the
    /// handle is ended.
    pub fn start_timing(self: &Arc<Self>, query_key: &str, operation: &str) -> TimingHandle {
        TimingHandle {
            monitor: Arc::clone(self),
            key: format!("{}-{}", query_key, operation),
            operation: operation.to_string(),
            query_key: query_key.to_string(),
            start: Instant::now(),
        }
    }

    /// All recorded samples, optionally narrowed to composite keys that
    /// start with `prefix`.
    pub fn metrics(&self, prefix: Option<&str>) -> HashMap<String, Vec<MetricSample>> {
        let samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        match prefix {
            Some(prefix) => samples
                .iter()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, values)| (key.clone(), values.clone()))
                .collect(),
            None => samples.clone(),
        }
    }

    /// Drops every recorded sample. Not reversible.
    pub fn clear(&self) {
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        samples.clear();
        drop(samples);
        self.logger.info(&["Performance metrics cleared".into()]);
    }

    fn offset_ms(&self, instant: Instant) -> f64 {
        instant.duration_since(self.origin).as_secs_f64() * 1000.0
    }

    fn record(&self, key: &str, start: Instant) -> f64 {
        let end = Instant::now();
        let start_ms = self.offset_ms(start);
        let end_ms = self.offset_ms(end);
        let duration_ms = end_ms - start_ms;

        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        samples.entry(key.to_string()).or_default().push(MetricSample {
            start_time: start_ms,
            end_time: end_ms,
            duration_ms,
            timestamp: Utc::now(),
        });
        duration_ms
    }
}

/// Closes over one fixed start instant.
#[derive(Debug)]
pub struct TimingHandle {
    monitor: Arc<PerformanceMonitor>,
    key: String,
    operation: String,
    query_key: String,
    start: Instant,
}

impl TimingHandle {
    /// Records a sample and returns its duration in milliseconds.
    ///
    /// Calling `end` more than once appends one sample per call, all
    /// sharing this handle's start instant. Inherited contract: callers
    /// that re-measure rely on getting multiple appended samples.
    pub fn end(&self) -> f64 {
        let duration_ms = self.monitor.record(&self.key, self.start);
        self.monitor.logger.info(&[format!(
            "{} for {}: {:.2}ms",
            self.operation, self.query_key, duration_ms
        )
        .into()]);
        duration_ms
    }
}
