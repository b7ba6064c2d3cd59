// Path: crates/telemetry/src/init.rs
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Output encoding for log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line, for log shippers.
    #[default]
    Json,
    /// Human-readable single-line records.
    Compact,
}

/// Initializes the global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG` and falls back to `default_directive`
/// (e.g. `"info"` or `"syncreg=debug"`). Records emitted through the `log`
/// facade are bridged into the same subscriber.
pub fn init_tracing(format: LogFormat, default_directive: &str) -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))?;
    tracing_log::LogTracer::init()?;
    match format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339());
            tracing::subscriber::set_global_default(Registry::default().with(filter).with(layer))?;
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(true);
            tracing::subscriber::set_global_default(Registry::default().with(filter).with(layer))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installs_only_once() {
        assert!(init_tracing(LogFormat::Json, "info").is_ok());
        // The global subscriber and the log bridge can only be installed once.
        assert!(init_tracing(LogFormat::Compact, "debug").is_err());
    }
}
