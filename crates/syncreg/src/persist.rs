// Path: crates/syncreg/src/persist.rs

//! Debounced persistence of a [`CoverageRegistry`] into a [`BlobStore`].
//!
//! Every coverage change marks the registry dirty and wakes a background
//! task. The task waits out the debounce window, snapshots the registry under
//! its lock and hands the bytes to the store on the blocking pool. Writes are
//! serialized and each one snapshots the state current at that moment, so the
//! last mutation always reaches the store.

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::notifier::ChangeNotifier;
use crate::registry::CoverageRegistry;
use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use syncreg_storage::BlobStore;
use syncreg_telemetry::coverage_metrics;
use syncreg_telemetry::time::FlushTimer;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Forwards changes to the caller's notifier and schedules a flush.
struct FlushTrigger {
    dirty: Arc<AtomicBool>,
    wake: Arc<Notify>,
    inner: Arc<dyn ChangeNotifier>,
}

impl ChangeNotifier for FlushTrigger {
    fn on_coverage_changed(&self, more_synchronized: bool, less_synchronized: bool) {
        self.dirty.store(true, Ordering::Release);
        self.wake.notify_one();
        self.inner
            .on_coverage_changed(more_synchronized, less_synchronized);
    }
}

struct SnapshotWriter {
    registry: Arc<CoverageRegistry>,
    store: Arc<dyn BlobStore>,
    key: String,
    /// Serializes writes so that a later snapshot is never overtaken by an earlier one.
    lock: tokio::sync::Mutex<()>,
}

impl SnapshotWriter {
    async fn write(&self) -> Result<(), RegistryError> {
        let _guard = self.lock.lock().await;
        let metrics = coverage_metrics();
        let _timer = FlushTimer::new(metrics);

        let bytes = self.registry.to_bytes();
        let len = bytes.len();
        let store = self.store.clone();
        let key = self.key.clone();
        let result = match tokio::task::spawn_blocking(move || store.put(&key, &bytes)).await {
            Ok(put) => put.map_err(RegistryError::from),
            Err(e) => Err(RegistryError::Task(e.to_string())),
        };

        match &result {
            Ok(()) => {
                metrics.inc_flushes();
                tracing::debug!(target: "syncreg", key = %self.key, bytes = len, "coverage snapshot written");
            }
            Err(e) => {
                metrics.inc_flush_failures();
                tracing::warn!(target: "syncreg", key = %self.key, error = %e, "failed to write coverage snapshot");
            }
        }
        result
    }
}

/// A [`CoverageRegistry`] bound to a blob-store key.
///
/// Dereferences to the registry for queries and mutations. Must be created
/// inside a tokio runtime.
pub struct PersistentRegistry {
    registry: Arc<CoverageRegistry>,
    writer: Arc<SnapshotWriter>,
    dirty: Arc<AtomicBool>,
    stop: Arc<Notify>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl PersistentRegistry {
    /// Opens the registry stored under `key`.
    ///
    /// A missing blob starts an empty registry, and so does an unreadable
    /// one after the failure is logged.
    pub async fn open(
        store: Arc<dyn BlobStore>,
        key: impl Into<String>,
        config: &RegistryConfig,
        notifier: Arc<dyn ChangeNotifier>,
    ) -> Self {
        let key = key.into();
        let dirty = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let stop = Arc::new(Notify::new());
        let trigger = FlushTrigger {
            dirty: dirty.clone(),
            wake: wake.clone(),
            inner: notifier,
        };
        let registry = Arc::new(CoverageRegistry::with_config(config, Arc::new(trigger)));

        let loaded = {
            let store = store.clone();
            let key = key.clone();
            tokio::task::spawn_blocking(move || store.get(&key)).await
        };
        match loaded {
            Ok(Ok(Some(bytes))) => {
                // a rejected snapshot is logged and counted by the registry itself
                if registry.load_bytes(&bytes).is_ok() {
                    tracing::info!(target: "syncreg", %key, stored = registry.stored_cubes(), "coverage registry restored");
                }
            }
            Ok(Ok(None)) => {
                tracing::debug!(target: "syncreg", %key, "no stored coverage registry, starting empty");
            }
            Ok(Err(e)) => {
                coverage_metrics().inc_load_failures();
                tracing::warn!(target: "syncreg", %key, error = %e, "could not read coverage registry, starting empty");
            }
            Err(e) => {
                coverage_metrics().inc_load_failures();
                tracing::warn!(target: "syncreg", %key, error = %e, "coverage registry load task failed, starting empty");
            }
        }

        let writer = Arc::new(SnapshotWriter {
            registry: registry.clone(),
            store,
            key,
            lock: tokio::sync::Mutex::new(()),
        });
        let flusher = tokio::spawn(flush_loop(
            writer.clone(),
            dirty.clone(),
            wake,
            stop.clone(),
            config.flush_debounce(),
        ));

        Self {
            registry,
            writer,
            dirty,
            stop,
            flusher: Mutex::new(Some(flusher)),
        }
    }

    pub fn registry(&self) -> &Arc<CoverageRegistry> {
        &self.registry
    }

    pub fn key(&self) -> &str {
        &self.writer.key
    }

    /// Writes the current state now, without waiting for the debounce window.
    pub async fn flush(&self) -> Result<(), RegistryError> {
        self.dirty.store(false, Ordering::Release);
        self.writer.write().await
    }

    /// Stops the background task and writes the final state.
    pub async fn close(&self) -> Result<(), RegistryError> {
        let flusher = self.flusher.lock().take();
        let Some(flusher) = flusher else {
            return Ok(());
        };
        self.stop.notify_one();
        if let Err(e) = flusher.await {
            tracing::warn!(target: "syncreg", key = %self.key(), error = %e, "flush task ended abnormally");
        }
        self.flush().await
    }

    /// Stops the background task without writing. Used when the stored blob is about to be deleted.
    pub(crate) async fn discard(&self) {
        let flusher = self.flusher.lock().take();
        if let Some(flusher) = flusher {
            self.stop.notify_one();
            if let Err(e) = flusher.await {
                tracing::warn!(target: "syncreg", key = %self.key(), error = %e, "flush task ended abnormally");
            }
        }
        self.dirty.store(false, Ordering::Release);
    }
}

impl Deref for PersistentRegistry {
    type Target = CoverageRegistry;

    fn deref(&self) -> &Self::Target {
        &self.registry
    }
}

impl Drop for PersistentRegistry {
    fn drop(&mut self) {
        if let Some(flusher) = self.flusher.get_mut().take() {
            flusher.abort();
            if self.dirty.load(Ordering::Acquire) {
                tracing::warn!(target: "syncreg", key = %self.writer.key, "dropped without close, latest coverage not persisted");
            }
        }
    }
}

async fn flush_loop(
    writer: Arc<SnapshotWriter>,
    dirty: Arc<AtomicBool>,
    wake: Arc<Notify>,
    stop: Arc<Notify>,
    debounce: Duration,
) {
    loop {
        tokio::select! {
            _ = wake.notified() => {}
            _ = stop.notified() => break,
        }
        tokio::select! {
            _ = tokio::time::sleep(debounce) => {}
            _ = stop.notified() => break,
        }
        // Cleared before the snapshot so that changes racing the write schedule another one.
        if dirty.swap(false, Ordering::AcqRel) {
            // failures are logged and counted by the writer
            let _ = writer.write().await;
        }
    }
    tracing::debug!(target: "syncreg", key = %writer.key, "flush task stopped");
}
