// Path: crates/telemetry/src/prometheus.rs
//! A concrete implementation of the metrics sinks using the Prometheus crate.

use crate::sinks::*;
use once_cell::sync::OnceCell;
use prometheus::{
    exponential_buckets, register_gauge, register_histogram, register_int_counter,
    register_int_counter_vec, Encoder, Gauge, Histogram, IntCounter, IntCounterVec, TextEncoder,
};

// --- Metric Statics ---
// Collectors are registered exactly once by `install`.

static COVERAGE_QUERIES_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static COVERAGE_MARKED_SYNCED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static COVERAGE_MARKED_UNSYNCED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static COVERAGE_STORED_CUBES: OnceCell<Gauge> = OnceCell::new();
static COVERAGE_FLUSHES_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static COVERAGE_FLUSH_FAILURES_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static COVERAGE_FLUSH_DURATION_SECONDS: OnceCell<Histogram> = OnceCell::new();
static COVERAGE_LOAD_FAILURES_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static STORE_BYTES_WRITTEN_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static STORE_BYTES_READ_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static STORE_ERRORS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();

#[derive(Debug, Clone, Copy)]
pub struct PrometheusSink;

/// Runs the expression against a collector if `install()` has registered it.
/// Before installation the sink silently drops observations.
macro_rules! with_metric {
    ($metric:ident, |$m:ident| $body:expr) => {
        if let Some($m) = $metric.get() {
            $body;
        }
    };
}

impl CoverageMetricsSink for PrometheusSink {
    fn inc_coverage_queries(&self, covered: bool) {
        let label = if covered { "covered" } else { "missed" };
        with_metric!(COVERAGE_QUERIES_TOTAL, |m| m.with_label_values(&[label]).inc());
    }
    fn inc_marked_synced(&self) {
        with_metric!(COVERAGE_MARKED_SYNCED_TOTAL, |m| m.inc());
    }
    fn inc_marked_unsynced(&self) {
        with_metric!(COVERAGE_MARKED_UNSYNCED_TOTAL, |m| m.inc());
    }
    fn set_stored_cubes(&self, count: u64) {
        with_metric!(COVERAGE_STORED_CUBES, |m| m.set(count as f64));
    }
    fn inc_flushes(&self) {
        with_metric!(COVERAGE_FLUSHES_TOTAL, |m| m.inc());
    }
    fn inc_flush_failures(&self) {
        with_metric!(COVERAGE_FLUSH_FAILURES_TOTAL, |m| m.inc());
    }
    fn observe_flush_duration(&self, duration_secs: f64) {
        with_metric!(COVERAGE_FLUSH_DURATION_SECONDS, |m| m.observe(duration_secs));
    }
    fn inc_load_failures(&self) {
        with_metric!(COVERAGE_LOAD_FAILURES_TOTAL, |m| m.inc());
    }
}

impl StoreMetricsSink for PrometheusSink {
    fn inc_bytes_written_total(&self, bytes: u64) {
        with_metric!(STORE_BYTES_WRITTEN_TOTAL, |m| m.inc_by(bytes));
    }
    fn inc_bytes_read_total(&self, bytes: u64) {
        with_metric!(STORE_BYTES_READ_TOTAL, |m| m.inc_by(bytes));
    }
    fn inc_store_errors(&self, op: &str) {
        with_metric!(STORE_ERRORS_TOTAL, |m| m.with_label_values(&[op]).inc());
    }
}

fn set_once<T>(cell: &OnceCell<T>, value: T) -> Result<(), prometheus::Error> {
    cell.set(value)
        .map_err(|_| prometheus::Error::Msg("prometheus sink already installed".into()))
}

/// Registers all collectors with the default Prometheus registry and returns
/// the sink to store in [`SINK`].
pub fn install() -> Result<&'static dyn MetricsSink, prometheus::Error> {
    set_once(
        &COVERAGE_QUERIES_TOTAL,
        register_int_counter_vec!(
            "syncreg_coverage_queries_total",
            "Total is_synced queries, by outcome.",
            &["outcome"]
        )?,
    )?;
    set_once(
        &COVERAGE_MARKED_SYNCED_TOTAL,
        register_int_counter!(
            "syncreg_marked_synced_total",
            "Total mark_synced calls that extended coverage."
        )?,
    )?;
    set_once(
        &COVERAGE_MARKED_UNSYNCED_TOTAL,
        register_int_counter!(
            "syncreg_marked_unsynced_total",
            "Total mark_unsynced calls."
        )?,
    )?;
    set_once(
        &COVERAGE_STORED_CUBES,
        register_gauge!(
            "syncreg_stored_cubes",
            "Number of cubes currently stored across all dimension buckets."
        )?,
    )?;
    set_once(
        &COVERAGE_FLUSHES_TOTAL,
        register_int_counter!(
            "syncreg_flushes_total",
            "Total registry snapshots written to the backing store."
        )?,
    )?;
    set_once(
        &COVERAGE_FLUSH_FAILURES_TOTAL,
        register_int_counter!(
            "syncreg_flush_failures_total",
            "Total registry snapshots that failed to write."
        )?,
    )?;
    set_once(
        &COVERAGE_FLUSH_DURATION_SECONDS,
        register_histogram!(
            "syncreg_flush_duration_seconds",
            "Latency of a registry snapshot write.",
            exponential_buckets(0.0005, 2.0, 14)?
        )?,
    )?;
    set_once(
        &COVERAGE_LOAD_FAILURES_TOTAL,
        register_int_counter!(
            "syncreg_load_failures_total",
            "Total persisted snapshots rejected on load."
        )?,
    )?;
    set_once(
        &STORE_BYTES_WRITTEN_TOTAL,
        register_int_counter!(
            "syncreg_store_bytes_written_total",
            "Total bytes written to the blob store."
        )?,
    )?;
    set_once(
        &STORE_BYTES_READ_TOTAL,
        register_int_counter!(
            "syncreg_store_bytes_read_total",
            "Total bytes read from the blob store."
        )?,
    )?;
    set_once(
        &STORE_ERRORS_TOTAL,
        register_int_counter_vec!(
            "syncreg_store_errors_total",
            "Total failed blob store operations, by operation.",
            &["op"]
        )?,
    )?;

    static PROMETHEUS_SINK: PrometheusSink = PrometheusSink;
    Ok(&PROMETHEUS_SINK)
}

/// Renders every registered metric family in the Prometheus text exposition format.
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buf)?;
    String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
