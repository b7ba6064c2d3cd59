// Path: crates/storage/src/memory.rs

use crate::blob::{BlobStore, StorageError};
use crate::metrics::metrics;
use ahash::AHashMap;
use parking_lot::RwLock;

/// A process-local [`BlobStore`]. Contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<AHashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let out = self.blobs.read().get(key).cloned();
        if let Some(bytes) = &out {
            metrics().inc_bytes_read_total(bytes.len() as u64);
        }
        Ok(out)
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.blobs.write().insert(key.to_owned(), bytes.to_vec());
        metrics().inc_bytes_written_total(bytes.len() as u64);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.blobs.write().remove(key);
        Ok(())
    }
}
