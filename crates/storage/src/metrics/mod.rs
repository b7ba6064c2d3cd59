// Path: crates/storage/src/metrics/mod.rs
use once_cell::sync::OnceCell;
use syncreg_telemetry::sinks::{NopSink, StoreMetricsSink};

static NOP_SINK: NopSink = NopSink;
/// Overrides the global telemetry sink for this crate only.
pub static SINK: OnceCell<&'static dyn StoreMetricsSink> = OnceCell::new();

pub fn metrics() -> &'static dyn StoreMetricsSink {
    match SINK.get() {
        Some(sink) => *sink,
        None if syncreg_telemetry::sinks::SINK.get().is_some() => {
            syncreg_telemetry::store_metrics()
        }
        None => &NOP_SINK,
    }
}
