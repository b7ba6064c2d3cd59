// Path: crates/syncreg/src/registry.rs

//! The coverage registry: answers "was this region already fully fetched?".
//!
//! Synchronized cubes are partitioned into one [`DimensionBucket`] per
//! dimensionality `1..=max_dimensions`, plus a flag for full (universal)
//! coverage. A single mutex guards the flag and every bucket, because
//! `mark_synced` must check all buckets for an existing covering claim and
//! mutate them as one step.

use crate::bucket::DimensionBucket;
use crate::codec::{decode_registry, encode_registry, MAX_BUCKETS};
use crate::config::RegistryConfig;
use crate::cube::Cube;
use crate::error::{FormatError, RegistryError};
use crate::notifier::{ChangeNotifier, NopNotifier};
use parking_lot::Mutex;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;
use syncreg_telemetry::coverage_metrics;

/// Highest dimensionality with its own bucket unless configured otherwise.
pub const DEFAULT_MAX_DIMENSIONS: usize = 8;

/// Coarse state of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageState {
    /// Nothing is known to be synchronized.
    Empty,
    /// Some regions are synchronized.
    PartiallyCovered,
    /// Everything is synchronized.
    FullyCovered,
}

struct RegistryState {
    all_synchronized: bool,
    /// `buckets[d - 1]` holds the `d`-dimensional cubes.
    buckets: Vec<DimensionBucket>,
}

impl RegistryState {
    fn empty(max_dimensions: usize) -> Self {
        Self {
            all_synchronized: false,
            buckets: (1..=max_dimensions).map(DimensionBucket::new).collect(),
        }
    }

    fn clear_buckets(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    fn stored_cubes(&self) -> usize {
        self.buckets.iter().map(DimensionBucket::cube_count).sum()
    }
}

pub struct CoverageRegistry {
    state: Mutex<RegistryState>,
    max_dimensions: usize,
    notifier: Arc<dyn ChangeNotifier>,
}

impl fmt::Debug for CoverageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverageRegistry")
            .field("max_dimensions", &self.max_dimensions)
            .finish_non_exhaustive()
    }
}

impl Default for CoverageRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSIONS, Arc::new(NopNotifier))
    }
}

impl CoverageRegistry {
    /// Creates an empty registry. `max_dimensions` is clamped to `1..=100`.
    pub fn new(max_dimensions: usize, notifier: Arc<dyn ChangeNotifier>) -> Self {
        let max_dimensions = max_dimensions.clamp(1, MAX_BUCKETS as usize);
        Self {
            state: Mutex::new(RegistryState::empty(max_dimensions)),
            max_dimensions,
            notifier,
        }
    }

    pub fn with_config(config: &RegistryConfig, notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self::new(config.max_dimensions, notifier)
    }

    pub fn max_dimensions(&self) -> usize {
        self.max_dimensions
    }

    /// Returns true if the region described by `cube` is known to be synchronized.
    pub fn is_synced(&self, cube: &Cube) -> bool {
        let covered = {
            let state = self.state.lock();
            if state.all_synchronized {
                true
            } else if cube.is_universal() {
                false
            } else {
                // buckets of lower dimensionality may hold a broader claim
                state
                    .buckets
                    .iter()
                    .take(cube.dimensions())
                    .any(|bucket| bucket.encompasses(cube))
            }
        };
        coverage_metrics().inc_coverage_queries(covered);
        covered
    }

    /// Records that the region described by `cube` is fully synchronized.
    pub fn mark_synced(&self, cube: &Cube) {
        let (changed, stored) = {
            let mut state = self.state.lock();
            let changed = if cube.is_universal() {
                let transition = !state.all_synchronized;
                state.all_synchronized = true;
                state.clear_buckets();
                transition
            } else if state.all_synchronized {
                false
            } else {
                Self::add_synced(&mut state, cube)
            };
            (changed, state.stored_cubes())
        };

        if changed {
            tracing::debug!(target: "syncreg", %cube, "marked synchronized");
            let metrics = coverage_metrics();
            metrics.inc_marked_synced();
            metrics.set_stored_cubes(stored as u64);
            self.notifier.on_coverage_changed(true, false);
        }
    }

    /// Adds a non-universal cube; returns false if coverage is unchanged.
    fn add_synced(state: &mut RegistryState, cube: &Cube) -> bool {
        let dimensions = cube.dimensions();
        // must run before anything is removed
        if state
            .buckets
            .iter()
            .take(dimensions)
            .any(|bucket| bucket.encompasses(cube))
        {
            tracing::trace!(target: "syncreg", %cube, "already covered");
            return false;
        }

        // A refused claim must not cost the narrower claims it would replace.
        if let Some(target) = state.buckets.get(dimensions - 1) {
            if !target.can_add(cube) {
                tracing::warn!(
                    target: "syncreg",
                    %cube,
                    cubes = target.cube_count(),
                    "bucket is full, coverage not stored"
                );
                return false;
            }
        }

        // Only cubes with at least as many axes can be swallowed by `cube`.
        for bucket in state.buckets.iter_mut().skip(dimensions - 1) {
            bucket.remove_encompassed_by(cube);
        }
        match state.buckets.get_mut(dimensions - 1) {
            Some(bucket) => {
                bucket.add_cube(cube);
            }
            None => {
                tracing::debug!(
                    target: "syncreg",
                    %cube,
                    "cube exceeds the maximum dimensionality, coverage not stored"
                );
            }
        }
        true
    }

    /// Records that the region described by `cube` may have changed remotely.
    pub fn mark_unsynced(&self, cube: &Cube) {
        let stored = {
            let mut state = self.state.lock();
            state.all_synchronized = false;
            if cube.is_universal() {
                state.clear_buckets();
            } else {
                let dimensions = cube.dimensions();
                for bucket in &mut state.buckets {
                    if bucket.dimensions() <= dimensions {
                        bucket.remove_encompassing(cube);
                    }
                    if bucket.dimensions() >= dimensions {
                        bucket.remove_encompassed_by(cube);
                    }
                }
            }
            state.stored_cubes()
        };

        tracing::debug!(target: "syncreg", %cube, "marked unsynchronized");
        let metrics = coverage_metrics();
        metrics.inc_marked_unsynced();
        metrics.set_stored_cubes(stored as u64);
        self.notifier.on_coverage_changed(false, true);
    }

    /// Drops all coverage.
    pub fn clear(&self) {
        let dropped = {
            let mut state = self.state.lock();
            let dropped = state.all_synchronized || state.stored_cubes() > 0;
            state.all_synchronized = false;
            state.clear_buckets();
            dropped
        };
        if dropped {
            coverage_metrics().set_stored_cubes(0);
            self.notifier.on_coverage_changed(false, true);
        }
    }

    pub fn state(&self) -> CoverageState {
        let state = self.state.lock();
        if state.all_synchronized {
            CoverageState::FullyCovered
        } else if state.stored_cubes() > 0 {
            CoverageState::PartiallyCovered
        } else {
            CoverageState::Empty
        }
    }

    /// Total number of cubes held across all buckets.
    pub fn stored_cubes(&self) -> usize {
        self.state.lock().stored_cubes()
    }

    /// Encodes a consistent snapshot of the registry.
    pub fn to_bytes(&self) -> Vec<u8> {
        let state = self.state.lock();
        let mut buf = Vec::with_capacity(64);
        encode_registry(&mut buf, state.all_synchronized, &state.buckets);
        buf
    }

    /// Writes a snapshot to `writer`. Encoding happens under the lock, the write outside it.
    pub fn save(&self, mut writer: impl Write) -> std::io::Result<()> {
        let bytes = self.to_bytes();
        writer.write_all(&bytes)?;
        writer.flush()
    }

    /// Replaces the registry contents with a snapshot read from `reader`.
    ///
    /// On failure the registry is left empty and the error is returned.
    /// Loading never notifies.
    pub fn load(&self, mut reader: impl Read) -> Result<(), RegistryError> {
        let mut bytes = Vec::new();
        if let Err(e) = reader.read_to_end(&mut bytes) {
            self.reset_after_failed_load(&e);
            return Err(e.into());
        }
        self.load_bytes(&bytes)?;
        Ok(())
    }

    /// Replaces the registry contents with a decoded snapshot.
    pub fn load_bytes(&self, bytes: &[u8]) -> Result<(), FormatError> {
        let mut cursor = bytes;
        match decode_registry(&mut cursor, self.max_dimensions) {
            Ok((all_synchronized, buckets)) => {
                if !cursor.is_empty() {
                    tracing::debug!(target: "syncreg", trailing = cursor.len(), "ignoring trailing bytes");
                }
                let stored = {
                    let mut state = self.state.lock();
                    state.all_synchronized = all_synchronized;
                    state.buckets = buckets;
                    state.stored_cubes()
                };
                coverage_metrics().set_stored_cubes(stored as u64);
                tracing::debug!(target: "syncreg", all_synchronized, stored, "loaded coverage registry");
                Ok(())
            }
            Err(e) => {
                self.reset_after_failed_load(&e);
                Err(e)
            }
        }
    }

    fn reset_after_failed_load(&self, error: &dyn fmt::Display) {
        *self.state.lock() = RegistryState::empty(self.max_dimensions);
        tracing::warn!(target: "syncreg", %error, "could not load coverage registry, starting empty");
        let metrics = coverage_metrics();
        metrics.inc_load_failures();
        metrics.set_stored_cubes(0);
    }

    /// Logs the whole registry at debug level.
    pub fn dump(&self) {
        let state = self.state.lock();
        tracing::debug!(target: "syncreg", all_synchronized = state.all_synchronized, "=== coverage registry");
        for bucket in state.buckets.iter().filter(|b| !b.is_empty()) {
            bucket.dump();
        }
    }

    /// Every stored cube, lowest dimensionality first.
    pub fn cubes(&self) -> Vec<Cube> {
        let state = self.state.lock();
        state.buckets.iter().flat_map(DimensionBucket::iter).collect()
    }
}
