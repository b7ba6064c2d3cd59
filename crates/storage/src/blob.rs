// Path: crates/storage/src/blob.rs

//! The keyed blob-store contract.

use thiserror::Error;

/// Represents errors that can occur within the blob store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A generic error originating from the underlying backend (e.g., redb).
    #[error("backend error: {0}")]
    Backend(String),
}

/// A store of opaque byte blobs addressed by string keys.
///
/// Implementations must be safe to share between threads. Calls may block on
/// disk I/O, so async callers should run them on a blocking pool.
pub trait BlobStore: Send + Sync {
    /// Returns the blob stored under `key`, or `None` if nothing was stored.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stores `bytes` under `key`, replacing any previous blob.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Removes the blob stored under `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}
