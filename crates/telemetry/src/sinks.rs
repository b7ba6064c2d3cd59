// Path: crates/telemetry/src/sinks.rs
//! Defines abstract traits for metrics reporting, decoupling core logic from the backend.

use once_cell::sync::OnceCell;

// --- Static Sink Access ---

/// A no-op sink for use in tests or when telemetry is disabled.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

/// A lazily-initialized static reference to the global `MetricsSink` implementation.
pub static SINK: OnceCell<&'static dyn MetricsSink> = OnceCell::new();
static NOP_SINK: NopSink = NopSink;

/// Returns the configured coverage metrics sink, or a no-op sink if none was installed.
pub fn coverage_metrics() -> &'static dyn CoverageMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns the configured blob-store metrics sink, or a no-op sink if none was installed.
pub fn store_metrics() -> &'static dyn StoreMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

// --- Trait Definitions ---

/// A sink for metrics emitted by the coverage registry.
pub trait CoverageMetricsSink: Send + Sync + std::fmt::Debug {
    /// Counts an `is_synced` query, labelled by whether it was covered.
    fn inc_coverage_queries(&self, covered: bool);
    /// Counts a `mark_synced` call that changed coverage.
    fn inc_marked_synced(&self);
    /// Counts a `mark_unsynced` call.
    fn inc_marked_unsynced(&self);
    /// Sets the gauge for the number of cubes currently stored across all buckets.
    fn set_stored_cubes(&self, count: u64);
    /// Counts a snapshot written to the backing store.
    fn inc_flushes(&self);
    /// Counts a snapshot that could not be written.
    fn inc_flush_failures(&self);
    /// Observes how long a snapshot write took.
    fn observe_flush_duration(&self, duration_secs: f64);
    /// Counts a persisted snapshot that was rejected on load.
    fn inc_load_failures(&self);
}
impl CoverageMetricsSink for NopSink {
    fn inc_coverage_queries(&self, _covered: bool) {}
    fn inc_marked_synced(&self) {}
    fn inc_marked_unsynced(&self) {}
    fn set_stored_cubes(&self, _count: u64) {}
    fn inc_flushes(&self) {}
    fn inc_flush_failures(&self) {}
    fn observe_flush_duration(&self, _duration_secs: f64) {}
    fn inc_load_failures(&self) {}
}

/// A sink for metrics related to the keyed blob store.
pub trait StoreMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments the total number of bytes written to the store.
    fn inc_bytes_written_total(&self, bytes: u64);
    /// Increments the total number of bytes read from the store.
    fn inc_bytes_read_total(&self, bytes: u64);
    /// Counts a failed store operation, labelled by operation name.
    fn inc_store_errors(&self, op: &str);
}
impl StoreMetricsSink for NopSink {
    fn inc_bytes_written_total(&self, _bytes: u64) {}
    fn inc_bytes_read_total(&self, _bytes: u64) {}
    fn inc_store_errors(&self, _op: &str) {}
}

/// A unified trait for a sink that can handle all metric types.
pub trait MetricsSink: CoverageMetricsSink + StoreMetricsSink {}
impl<T: CoverageMetricsSink + StoreMetricsSink> MetricsSink for T {}
