// Path: crates/syncreg/src/lib.rs
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

//! # Sync Registry
//!
//! Remembers which query regions of a remote data source have been fully
//! synchronized into the local store, so that a query falling inside a known
//! region can be answered locally instead of re-fetching.
//!
//! ## Key Features
//!
//! *   **Hypercube regions:** A [`Cube`] constrains attributes by included and
//!     excluded value sets. Coverage is the union of all cubes marked synced.
//!
//! *   **Subsumption instead of duplication:** Marking a region synced drops
//!     stored regions it swallows, and is skipped when an existing region
//!     already covers it.
//!
//! *   **Under-claiming bias:** Whenever subsumption cannot be proven the
//!     answer is "not covered". A false negative costs a redundant fetch; a
//!     false positive would hide remote data.
//!
//! *   **Compact persistence:** Registries serialize to a small binary
//!     format (see [`codec`]) and are written to a [`syncreg_storage::BlobStore`]
//!     by a debounced background task.

mod bucket;
pub mod codec;
pub mod config;
pub mod connections;
pub mod cube;
pub mod error;
pub mod notifier;
pub mod persist;
pub mod registry;

pub use bucket::{DimensionBucket, MAX_CUBES, MAX_VALUES_COUNT};
pub use config::RegistryConfig;
pub use connections::ConnectionRegistries;
pub use cube::{Axis, Cube, CubeBuilder};
pub use error::{ConfigError, ErrorCode, FormatError, RegistryError};
pub use notifier::{BroadcastNotifier, ChangeNotifier, CoverageChange, FnNotifier, NopNotifier};
pub use persist::PersistentRegistry;
pub use registry::{CoverageRegistry, CoverageState, DEFAULT_MAX_DIMENSIONS};
