// Path: crates/storage/src/redb_blob_store.rs
use crate::blob::{BlobStore, StorageError};
use crate::metrics::metrics;
use redb::{Database, ReadTransaction, ReadableTable, TableDefinition, WriteTransaction};
use std::path::Path;
use std::sync::Arc;

/// key = blob key (UTF-8), value = raw blob bytes
const BLOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("BLOBS");

fn backend(op: &'static str, e: impl std::fmt::Display) -> StorageError {
    metrics().inc_store_errors(op);
    StorageError::Backend(format!("{op}: {e}"))
}

/// A [`BlobStore`] persisted in a single redb database file.
#[derive(Clone)]
pub struct RedbBlobStore {
    db: Arc<Database>,
}

impl RedbBlobStore {
    /// Opens (or creates) the database at `path` and ensures the blob table exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| backend("open", e))?;
        {
            let w = db.begin_write().map_err(|e| backend("open", e))?;
            w.open_table(BLOBS).map_err(|e| backend("open", e))?;
            w.commit().map_err(|e| backend("open", e))?;
        }
        tracing::debug!(target: "storage", path = %path.as_ref().display(), "opened redb blob store");
        Ok(Self { db: Arc::new(db) })
    }

    fn read_txn(&self, op: &'static str) -> Result<ReadTransaction<'_>, StorageError> {
        self.db.begin_read().map_err(|e| backend(op, e))
    }

    fn write_txn(&self, op: &'static str) -> Result<WriteTransaction<'_>, StorageError> {
        self.db.begin_write().map_err(|e| backend(op, e))
    }
}

impl BlobStore for RedbBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let r = self.read_txn("get")?;
        let t = r.open_table(BLOBS).map_err(|e| backend("get", e))?;
        let out = t
            .get(key)
            .map_err(|e| backend("get", e))?
            .map(|v| v.value().to_vec());
        if let Some(bytes) = &out {
            metrics().inc_bytes_read_total(bytes.len() as u64);
        }
        Ok(out)
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let w = self.write_txn("put")?;
        {
            let mut t = w.open_table(BLOBS).map_err(|e| backend("put", e))?;
            t.insert(key, bytes).map_err(|e| backend("put", e))?;
        }
        w.commit().map_err(|e| backend("put", e))?;
        metrics().inc_bytes_written_total(bytes.len() as u64);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let w = self.write_txn("delete")?;
        {
            let mut t = w.open_table(BLOBS).map_err(|e| backend("delete", e))?;
            t.remove(key).map_err(|e| backend("delete", e))?;
        }
        w.commit().map_err(|e| backend("delete", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn blobs_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("syncreg.redb");

        {
            let store = RedbBlobStore::open(&path).unwrap();
            store.put("syncreg/jira", &[0xC0, 0xBE, 0x50, 0xFF]).unwrap();
            store.put("syncreg/other", b"x").unwrap();
            store.delete("syncreg/other").unwrap();
        }

        let store = RedbBlobStore::open(&path).unwrap();
        assert_eq!(
            store.get("syncreg/jira").unwrap(),
            Some(vec![0xC0, 0xBE, 0x50, 0xFF])
        );
        assert!(store.get("syncreg/other").unwrap().is_none());
    }

    #[test]
    fn delete_missing_key_is_ok() {
        let dir = tempdir().unwrap();
        let store = RedbBlobStore::open(dir.path().join("db.redb")).unwrap();
        store.delete("nothing-here").unwrap();
    }
}
