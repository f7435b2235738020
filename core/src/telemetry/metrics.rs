use serde::Serialize;
use std::sync::Mutex;

/// Rows seen and kept by one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub stage: &'static str,
    pub rows_in: usize,
    pub rows_out: usize,
}

pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Default)]
struct Metrics {
    stages: Vec<StageCounts>,
    errors: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_stage(&self, stage: &'static str, rows_in: usize, rows_out: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.stages.push(StageCounts {
                stage,
                rows_in,
                rows_out,
            });
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.errors += 1;
        }
    }

    /// Clears counts left over from a previous run.
    pub fn reset(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.stages.clear();
            metrics.errors = 0;
        }
    }

    pub fn snapshot(&self) -> (Vec<StageCounts>, usize) {
        if let Ok(metrics) = self.inner.lock() {
            (metrics.stages.clone(), metrics.errors)
        } else {
            (Vec::new(), 0)
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
