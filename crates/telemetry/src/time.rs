// Path: crates/telemetry/src/time.rs
use crate::sinks::CoverageMetricsSink;
use std::time::Instant;

/// Reports the lifetime of the guard as a snapshot flush duration.
pub struct FlushTimer<'a> {
    sink: &'a dyn CoverageMetricsSink,
    start: Instant,
}

impl<'a> FlushTimer<'a> {
    pub fn new(sink: &'a dyn CoverageMetricsSink) -> Self {
        Self {
            sink,
            start: Instant::now(),
        }
    }
}

impl Drop for FlushTimer<'_> {
    fn drop(&mut self) {
        self.sink
            .observe_flush_duration(self.start.elapsed().as_secs_f64());
    }
}
