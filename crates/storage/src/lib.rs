// Path: crates/storage/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! Keyed blob storage for registry snapshots.
//!
//! The registry only ever needs "read the blob stored under a key" and "write
//! a blob under a key". [`BlobStore`] captures that contract; [`MemoryBlobStore`]
//! serves tests and ephemeral sessions, [`RedbBlobStore`] persists to a single
//! redb database file.

pub mod blob;
pub mod memory;
pub mod metrics;
pub mod redb_blob_store;

pub use blob::{BlobStore, StorageError};
pub use memory::MemoryBlobStore;
pub use redb_blob_store::RedbBlobStore;
