// Path: crates/syncreg/src/connections.rs

//! One coverage registry per remote connection.

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::notifier::ChangeNotifier;
use crate::persist::PersistentRegistry;
use dashmap::DashMap;
use std::sync::Arc;
use syncreg_storage::BlobStore;

/// Lazily opened registries keyed by connection id, all backed by one store.
pub struct ConnectionRegistries {
    store: Arc<dyn BlobStore>,
    config: RegistryConfig,
    notifier: Arc<dyn ChangeNotifier>,
    registries: DashMap<String, Arc<PersistentRegistry>>,
    /// Held while a registry is opened or removed, so each connection is opened once.
    open_lock: tokio::sync::Mutex<()>,
}

impl ConnectionRegistries {
    pub fn new(store: Arc<dyn BlobStore>, config: RegistryConfig, notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self {
            store,
            config,
            notifier,
            registries: DashMap::new(),
            open_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the registry of `connection_id`, opening it from the store on first use.
    pub async fn registry_for(&self, connection_id: &str) -> Arc<PersistentRegistry> {
        if let Some(registry) = self.registries.get(connection_id) {
            return registry.value().clone();
        }
        let _guard = self.open_lock.lock().await;
        if let Some(registry) = self.registries.get(connection_id) {
            return registry.value().clone();
        }

        let key = self.config.storage_key(connection_id);
        let registry = Arc::new(
            PersistentRegistry::open(self.store.clone(), key, &self.config, self.notifier.clone()).await,
        );
        self.registries
            .insert(connection_id.to_owned(), registry.clone());
        registry
    }

    /// Forgets all coverage of a removed connection and deletes its stored blob.
    ///
    /// Holders of the old registry see it emptied; their later changes are not persisted.
    pub async fn clear_registry_for_connection(&self, connection_id: &str) -> Result<(), RegistryError> {
        let _guard = self.open_lock.lock().await;
        if let Some((_, registry)) = self.registries.remove(connection_id) {
            registry.discard().await;
            registry.clear();
        }

        let store = self.store.clone();
        let key = self.config.storage_key(connection_id);
        tracing::info!(target: "syncreg", %key, "clearing coverage registry for connection");
        tokio::task::spawn_blocking(move || store.delete(&key))
            .await
            .map_err(|e| RegistryError::Task(e.to_string()))??;
        Ok(())
    }

    /// Closes every open registry, writing its final state. Returns the first failure.
    pub async fn close_all(&self) -> Result<(), RegistryError> {
        let _guard = self.open_lock.lock().await;
        let registries: Vec<(String, Arc<PersistentRegistry>)> = self
            .registries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        self.registries.clear();

        let mut first_error = None;
        for (connection_id, registry) in registries {
            if let Err(e) = registry.close().await {
                tracing::warn!(target: "syncreg", %connection_id, error = %e, "failed to close coverage registry");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Ids of the connections with an open registry, sorted.
    pub fn connection_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.registries.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube::Cube;
    use crate::notifier::NopNotifier;
    use syncreg_storage::{MemoryBlobStore, RedbBlobStore};

    fn proj(value: i64) -> Cube {
        Cube::builder().include_one("proj", value).build()
    }

    fn config() -> RegistryConfig {
        RegistryConfig {
            flush_debounce_ms: 60_000,
            ..RegistryConfig::default()
        }
    }

    #[tokio::test]
    async fn registries_are_opened_once_per_connection() {
        let store = Arc::new(MemoryBlobStore::new());
        let connections = ConnectionRegistries::new(store, config(), Arc::new(NopNotifier));

        let a = connections.registry_for("a").await;
        let again = connections.registry_for("a").await;
        let b = connections.registry_for("b").await;
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(b.key(), "syncreg/b");

        a.mark_synced(&proj(1));
        assert!(!b.is_synced(&proj(1)));
        assert_eq!(connections.connection_ids(), vec!["a".to_owned(), "b".to_owned()]);
        connections.close_all().await.unwrap();
        assert!(connections.connection_ids().is_empty());
    }

    #[tokio::test]
    async fn clearing_a_connection_deletes_its_blob() {
        let store = Arc::new(MemoryBlobStore::new());
        let connections = ConnectionRegistries::new(store.clone(), config(), Arc::new(NopNotifier));

        let a = connections.registry_for("a").await;
        let b = connections.registry_for("b").await;
        a.mark_synced(&proj(1));
        b.mark_synced(&proj(1));
        a.flush().await.unwrap();
        b.flush().await.unwrap();
        assert_eq!(store.len(), 2);

        connections.clear_registry_for_connection("a").await.unwrap();
        assert!(store.get("syncreg/a").unwrap().is_none());
        assert!(!a.is_synced(&proj(1)));

        let reopened = connections.registry_for("a").await;
        assert!(!Arc::ptr_eq(&a, &reopened));
        assert!(!reopened.is_synced(&proj(1)));
        assert!(b.is_synced(&proj(1)));

        // clearing an unknown connection is fine
        connections.clear_registry_for_connection("zzz").await.unwrap();
        connections.close_all().await.unwrap();
    }

    #[tokio::test]
    async fn coverage_survives_restart_on_redb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coverage.redb");
        {
            let store = Arc::new(RedbBlobStore::open(&path).unwrap());
            let connections = ConnectionRegistries::new(store, config(), Arc::new(NopNotifier));
            let registry = connections.registry_for("jira").await;
            registry.mark_synced(&Cube::builder().include("proj", [1, 2]).exclude_one("status", 6).build());
            connections.close_all().await.unwrap();
        }

        let store = Arc::new(RedbBlobStore::open(&path).unwrap());
        let connections = ConnectionRegistries::new(store, config(), Arc::new(NopNotifier));
        let registry = connections.registry_for("jira").await;
        assert!(registry.is_synced(
            &Cube::builder().include_one("proj", 2).include_one("status", 1).build()
        ));
        assert!(!registry.is_synced(&proj(2)));
        connections.close_all().await.unwrap();
    }
}
