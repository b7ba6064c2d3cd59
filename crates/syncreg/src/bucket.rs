// Path: crates/syncreg/src/bucket.rs

//! Storage for all synchronized cubes of one fixed dimensionality.
//!
//! Cubes are kept in flat parallel arrays rather than as individual objects:
//!
//! * `attributes` holds `dimensions` attribute ids per cube, row-major;
//! * `value_index` holds four integers per (cube, dimension) slot:
//!   `[included_start, included_count, excluded_start, excluded_count]`,
//!   with `-1, -1` marking an absent list;
//! * `values` is a shared pool the index pairs point into. Each referenced run
//!   is sorted ascending without duplicates.
//!
//! Removing a cube shifts later rows down but leaves its values in the pool.
//! The pool is rebuilt once stale values outnumber live ones.

use crate::codec::{get_i32, get_string, get_svarint, get_varint, put_string, put_svarint, put_varint};
use crate::cube::Cube;
use crate::error::FormatError;
use bytes::{Buf, BufMut};

/// A persisted bucket must hold fewer cubes than this.
pub const MAX_CUBES: usize = 10_000;
/// A persisted bucket must hold fewer pooled values than this.
pub const MAX_VALUES_COUNT: usize = 100_000;

const ABSENT: i32 = -1;
/// Stale values tolerated in the pool before a rebuild is considered.
const COMPACTION_FLOOR: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionBucket {
    dimensions: usize,
    cube_count: usize,
    attributes: Vec<Option<String>>,
    value_index: Vec<i32>,
    values: Vec<i64>,
    /// Number of pool entries referenced by `value_index`.
    live_values: usize,
}

/// Included and excluded runs of one slot.
type SlotRuns<'a> = (Option<&'a [i64]>, Option<&'a [i64]>);

impl DimensionBucket {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            cube_count: 0,
            attributes: Vec::new(),
            value_index: Vec::new(),
            values: Vec::new(),
            live_values: 0,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn cube_count(&self) -> usize {
        self.cube_count
    }

    /// Physical size of the value pool, stale entries included.
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cube_count == 0
    }

    /// Appends `cube` to the bucket.
    ///
    /// Returns `false` and leaves the bucket untouched when the cube has the
    /// wrong dimensionality or the bucket would outgrow what the persisted
    /// format accepts. Dropping a claim only under-reports coverage.
    pub fn add_cube(&mut self, cube: &Cube) -> bool {
        debug_assert_eq!(cube.dimensions(), self.dimensions, "cube offered to the wrong bucket");
        if cube.dimensions() != self.dimensions {
            tracing::error!(
                target: "syncreg",
                cube = %cube,
                bucket = self.dimensions,
                "refusing cube of wrong dimensionality"
            );
            return false;
        }
        if !self.can_add(cube) {
            tracing::warn!(
                target: "syncreg",
                bucket = self.dimensions,
                cubes = self.cube_count,
                values = self.live_values,
                "bucket is full, coverage claim dropped"
            );
            return false;
        }
        let needed = values_needed(cube);
        if self.values.len() + needed >= MAX_VALUES_COUNT {
            self.compact_values();
        }

        self.attributes.reserve(self.dimensions);
        self.value_index.reserve(self.dimensions * 4);
        for axis in cube.axes() {
            self.attributes.push(Some(axis.attribute().to_owned()));
            let (start, count) = self.push_run(axis.included());
            self.value_index.extend([start, count]);
            let (start, count) = self.push_run(axis.excluded());
            self.value_index.extend([start, count]);
        }
        self.cube_count += 1;
        self.live_values += needed;
        true
    }

    /// Whether [`add_cube`](Self::add_cube) would accept `cube`, counting
    /// stale pool entries as reclaimable.
    pub fn can_add(&self, cube: &Cube) -> bool {
        cube.dimensions() == self.dimensions
            && self.cube_count + 1 < MAX_CUBES
            && self.live_values + values_needed(cube) < MAX_VALUES_COUNT
    }

    fn push_run(&mut self, run: Option<&[i64]>) -> (i32, i32) {
        match run {
            Some(run) if !run.is_empty() => {
                let start = self.values.len() as i32;
                self.values.extend_from_slice(run);
                (start, run.len() as i32)
            }
            _ => (ABSENT, ABSENT),
        }
    }

    pub fn clear(&mut self) {
        self.cube_count = 0;
        self.attributes = Vec::new();
        self.value_index = Vec::new();
        self.values = Vec::new();
        self.live_values = 0;
    }

    /// Returns true if some stored cube is at least as general as `sample`.
    pub fn encompasses(&self, sample: &Cube) -> bool {
        (0..self.cube_count).any(|i| self.encompasses_at(i, sample))
    }

    /// Removes every stored cube that `sample` encompasses. Returns how many were removed.
    pub fn remove_encompassed_by(&mut self, sample: &Cube) -> usize {
        let mut removed = 0;
        let mut i = 0;
        while i < self.cube_count {
            if self.encompassed_by_at(i, sample) {
                self.remove(i);
                removed += 1;
            } else {
                i += 1;
            }
        }
        removed
    }

    /// Removes every stored cube that encompasses `sample`. Returns how many were removed.
    pub fn remove_encompassing(&mut self, sample: &Cube) -> usize {
        let mut removed = 0;
        let mut i = 0;
        while i < self.cube_count {
            if self.encompasses_at(i, sample) {
                self.remove(i);
                removed += 1;
            } else {
                i += 1;
            }
        }
        removed
    }

    /// Removes the cube at `index`, shifting later cubes down by one row.
    pub fn remove(&mut self, index: usize) {
        if index >= self.cube_count {
            return;
        }
        let first = index * self.dimensions;
        let last = first + self.dimensions;
        let freed: usize = self
            .value_index
            .get(first * 4..last * 4)
            .map_or(0, |slots| {
                slots
                    .chunks_exact(2)
                    .map(|pair| match pair {
                        [start, count] if *start >= 0 && *count > 0 => *count as usize,
                        _ => 0,
                    })
                    .sum()
            });
        self.attributes.drain(first..last);
        self.value_index.drain(first * 4..last * 4);
        self.cube_count -= 1;
        self.live_values = self.live_values.saturating_sub(freed);

        let stale = self.values.len().saturating_sub(self.live_values);
        if stale > COMPACTION_FLOOR && stale > self.live_values {
            self.compact_values();
        }
    }

    /// Rebuilds the value pool so that it holds only referenced runs.
    pub fn compact_values(&mut self) {
        let mut compacted = Vec::with_capacity(self.live_values);
        for pair in self.value_index.chunks_exact_mut(2) {
            let [start, count] = pair else {
                continue;
            };
            if *start < 0 || *count <= 0 {
                continue;
            }
            let from = *start as usize;
            match self.values.get(from..from + *count as usize) {
                Some(run) => {
                    *start = compacted.len() as i32;
                    compacted.extend_from_slice(run);
                }
                None => {
                    tracing::error!(target: "syncreg", start = *start, count = *count, "dangling value run");
                    *start = ABSENT;
                    *count = ABSENT;
                }
            }
        }
        tracing::debug!(
            target: "syncreg",
            bucket = self.dimensions,
            before = self.values.len(),
            after = compacted.len(),
            "compacted value pool"
        );
        self.live_values = compacted.len();
        self.values = compacted;
    }

    fn run(&self, start: i32, count: i32) -> Option<Option<&[i64]>> {
        if start < 0 || count <= 0 {
            return Some(None);
        }
        let start = start as usize;
        self.values.get(start..start + count as usize).map(Some)
    }

    /// The runs stored for `slot`, or `None` if the slot's index is corrupt.
    fn slot_runs(&self, slot: usize) -> Option<SlotRuns<'_>> {
        match self.value_index.get(slot * 4..slot * 4 + 4)? {
            [is, ic, es, ec] => Some((self.run(*is, *ic)?, self.run(*es, *ec)?)),
            _ => None,
        }
    }

    fn find_attribute(&self, cube_index: usize, attribute: &str) -> Option<usize> {
        let first = cube_index * self.dimensions;
        (first..first + self.dimensions)
            .find(|&slot| matches!(self.attributes.get(slot), Some(Some(a)) if a == attribute))
    }

    /// True if the stored cube at `cube_index` encompasses `sample`: every
    /// stored dimension is present in the sample and at least as general.
    fn encompasses_at(&self, cube_index: usize, sample: &Cube) -> bool {
        let first = cube_index * self.dimensions;
        for slot in first..first + self.dimensions {
            // A hole or an attribute the sample lacks makes the stored cube more specific.
            let Some(Some(attribute)) = self.attributes.get(slot) else {
                return false;
            };
            let Some(axis) = sample.axis(attribute) else {
                return false;
            };
            let Some((included, excluded)) = self.slot_runs(slot) else {
                return false;
            };
            if !dimension_encompasses(included, excluded, axis.included(), axis.excluded()) {
                return false;
            }
        }
        true
    }

    /// True if `sample` encompasses the stored cube at `cube_index`: every
    /// sample dimension is present in the stored cube and at least as general.
    fn encompassed_by_at(&self, cube_index: usize, sample: &Cube) -> bool {
        for axis in sample.axes() {
            let Some(slot) = self.find_attribute(cube_index, axis.attribute()) else {
                return false;
            };
            let Some((included, excluded)) = self.slot_runs(slot) else {
                return false;
            };
            if !dimension_encompasses(axis.included(), axis.excluded(), included, excluded) {
                return false;
            }
        }
        true
    }

    /// Reconstructs the stored cube at `index`.
    pub fn cube(&self, index: usize) -> Option<Cube> {
        if index >= self.cube_count {
            return None;
        }
        let first = index * self.dimensions;
        let mut builder = Cube::builder();
        for slot in first..first + self.dimensions {
            let Some(Some(attribute)) = self.attributes.get(slot) else {
                continue;
            };
            let (included, excluded) = self.slot_runs(slot)?;
            builder = builder.unconstrained(attribute.as_str());
            if let Some(values) = included {
                builder = builder.include(attribute.as_str(), values.iter().copied());
            }
            if let Some(values) = excluded {
                builder = builder.exclude(attribute.as_str(), values.iter().copied());
            }
        }
        Some(builder.build())
    }

    pub fn iter(&self) -> impl Iterator<Item = Cube> + '_ {
        (0..self.cube_count).filter_map(move |i| self.cube(i))
    }

    /// Logs every stored cube at debug level.
    pub fn dump(&self) {
        tracing::debug!(target: "syncreg", "=== D-{} {{ cubes: {}", self.dimensions, self.cube_count);
        for (i, cube) in self.iter().enumerate() {
            tracing::debug!(target: "syncreg", "===    {i}: {cube}");
        }
        tracing::debug!(target: "syncreg", "=== }}");
    }

    /// Writes this bucket's record (see [`crate::codec`]).
    pub fn serialize(&self, buf: &mut impl BufMut) {
        put_varint(buf, self.dimensions as u64);
        put_varint(buf, self.cube_count as u64);
        put_varint(buf, self.values.len() as u64);
        for attribute in &self.attributes {
            put_string(buf, attribute.as_deref());
        }
        for entry in &self.value_index {
            put_svarint(buf, i64::from(*entry));
        }
        for value in &self.values {
            put_svarint(buf, *value);
        }
    }

    /// Reads a bucket record into a bucket of the given dimensionality.
    pub fn deserialize(buf: &mut impl Buf, dimensions: usize) -> Result<Self, FormatError> {
        let dims = get_varint(buf)?;
        if dims != dimensions as u64 {
            return Err(FormatError::DimensionMismatch {
                expected: dimensions,
                got: dims,
            });
        }
        let cube_count = get_varint(buf)?;
        if cube_count >= MAX_CUBES as u64 {
            return Err(FormatError::CubeCount(cube_count));
        }
        let value_count = get_varint(buf)?;
        if value_count >= MAX_VALUES_COUNT as u64 {
            return Err(FormatError::ValueCount(value_count));
        }
        let cube_count = cube_count as usize;
        let value_count = value_count as usize;

        let slots = cube_count * dimensions;
        let attributes = (0..slots)
            .map(|_| get_string(buf))
            .collect::<Result<Vec<_>, _>>()?;
        let value_index = (0..slots * 4)
            .map(|_| get_i32(buf))
            .collect::<Result<Vec<_>, _>>()?;
        let values = (0..value_count)
            .map(|_| get_svarint(buf))
            .collect::<Result<Vec<_>, _>>()?;

        let live_values = validate_runs(&value_index, &values)?;
        Ok(Self {
            dimensions,
            cube_count,
            attributes,
            value_index,
            values,
            live_values,
        })
    }
}

fn values_needed(cube: &Cube) -> usize {
    cube.axes()
        .iter()
        .map(|a| a.included().map_or(0, <[i64]>::len) + a.excluded().map_or(0, <[i64]>::len))
        .sum()
}

/// Checks that every index pair is absent or points at a sorted, unique run
/// inside the pool. Returns the number of referenced values.
fn validate_runs(value_index: &[i32], values: &[i64]) -> Result<usize, FormatError> {
    let mut live = 0;
    for (pair_no, pair) in value_index.chunks_exact(2).enumerate() {
        let &[start, count] = pair else {
            continue;
        };
        if start == ABSENT && count == ABSENT {
            continue;
        }
        let out_of_range = FormatError::ValueIndex {
            offset: pair_no * 2,
            start: i64::from(start),
            count: i64::from(count),
        };
        if start < 0 || count <= 0 {
            return Err(out_of_range);
        }
        let (from, to) = (start as usize, start as usize + count as usize);
        let run = values.get(from..to).ok_or(out_of_range)?;
        if !run.windows(2).all(|w| matches!(w, [a, b] if a < b)) {
            return Err(FormatError::UnsortedValues { start: from, end: to });
        }
        live += run.len();
    }
    Ok(live)
}

/// Returns true if the "super" dimension admits every value the "sub" dimension admits.
///
/// Whenever the answer cannot be proven from the lists alone the result is
/// `false`: reporting a region as uncovered only costs a redundant fetch.
fn dimension_encompasses(
    super_included: Option<&[i64]>,
    super_excluded: Option<&[i64]>,
    sub_included: Option<&[i64]>,
    sub_excluded: Option<&[i64]>,
) -> bool {
    if let Some(super_excluded) = super_excluded {
        match (sub_included, sub_excluded) {
            // sub admits values that super forbids
            (Some(sub_included), _) if has_intersection(sub_included, super_excluded) => return false,
            (Some(_), _) => {}
            // sub must forbid at least what super forbids
            (None, Some(sub_excluded)) if !contains_all(sub_excluded, super_excluded) => return false,
            (None, Some(_)) => {}
            // sub is unconstrained on this attribute
            (None, None) => return false,
        }
    }

    if let Some(super_included) = super_included {
        match (sub_included, sub_excluded) {
            (Some(sub_included), _) => {
                if !contains_all(super_included, sub_included) {
                    return false;
                }
            }
            // a set defined by exclusion cannot be checked against an include list
            // without knowing the full value domain
            (None, _) => return false,
        }
    }
    true
}

/// Whether two ascending slices share a value.
fn has_intersection(a: &[i64], b: &[i64]) -> bool {
    let (mut i, mut j) = (a.iter().peekable(), b.iter().peekable());
    while let (Some(x), Some(y)) = (i.peek(), j.peek()) {
        match x.cmp(y) {
            std::cmp::Ordering::Less => {
                i.next();
            }
            std::cmp::Ordering::Greater => {
                j.next();
            }
            std::cmp::Ordering::Equal => return true,
        }
    }
    false
}

/// Whether ascending `superset` contains every value of ascending `subset`.
fn contains_all(superset: &[i64], subset: &[i64]) -> bool {
    let mut rest = superset.iter();
    subset
        .iter()
        .all(|needle| rest.by_ref().find(|v| *v >= needle) == Some(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inc(attr: &str, values: &[i64]) -> Cube {
        Cube::builder().include(attr, values.iter().copied()).build()
    }

    fn exc(attr: &str, values: &[i64]) -> Cube {
        Cube::builder().exclude(attr, values.iter().copied()).build()
    }

    fn bucket_with(cubes: &[Cube]) -> DimensionBucket {
        let dims = cubes.first().map_or(1, Cube::dimensions);
        let mut bucket = DimensionBucket::new(dims);
        for cube in cubes {
            assert!(bucket.add_cube(cube));
        }
        bucket
    }

    #[test]
    fn sorted_set_helpers() {
        assert!(has_intersection(&[1, 4, 9], &[2, 4]));
        assert!(!has_intersection(&[1, 3], &[2, 4]));
        assert!(!has_intersection(&[], &[2]));

        assert!(contains_all(&[1, 2, 3, 5], &[2, 5]));
        assert!(contains_all(&[1, 2], &[]));
        assert!(!contains_all(&[1, 2, 3], &[2, 4]));
        assert!(!contains_all(&[], &[1]));
    }

    #[test]
    fn include_lists_are_compared_by_subset() {
        let bucket = bucket_with(&[inc("proj", &[1, 2, 3])]);
        assert!(bucket.encompasses(&inc("proj", &[1, 3])));
        assert!(bucket.encompasses(&inc("proj", &[1, 2, 3])));
        assert!(!bucket.encompasses(&inc("proj", &[3, 4])));
    }

    #[test]
    fn exclusion_against_inclusion_is_not_provable() {
        let bucket = bucket_with(&[inc("proj", &[1, 2, 3])]);
        assert!(!bucket.encompasses(&exc("proj", &[4])));
    }

    #[test]
    fn excluded_values_must_not_be_included_by_sample() {
        let bucket = bucket_with(&[exc("proj", &[5, 7])]);
        assert!(bucket.encompasses(&inc("proj", &[1, 2])));
        assert!(!bucket.encompasses(&inc("proj", &[2, 7])));
    }

    #[test]
    fn sample_must_exclude_at_least_as_much() {
        let bucket = bucket_with(&[exc("proj", &[5, 7])]);
        assert!(bucket.encompasses(&exc("proj", &[5, 6, 7])));
        assert!(!bucket.encompasses(&exc("proj", &[5])));
    }

    #[test]
    fn missing_attribute_in_sample_is_not_encompassed() {
        let bucket = bucket_with(&[inc("proj", &[1])]);
        assert!(!bucket.encompasses(&inc("type", &[1])));
        assert!(!bucket.encompasses(&Cube::universal()));
    }

    #[test]
    fn lower_dimension_bucket_encompasses_wider_sample() {
        let bucket = bucket_with(&[inc("proj", &[1, 2])]);
        let sample = Cube::builder()
            .include_one("proj", 1)
            .include("type", [3, 4])
            .build();
        assert!(bucket.encompasses(&sample));
    }

    #[test]
    fn remove_encompassed_by_keeps_cursor_on_shift() {
        let mut bucket = bucket_with(&[
            inc("proj", &[1]),
            inc("proj", &[2]),
            inc("proj", &[9]),
            inc("proj", &[3]),
        ]);
        let removed = bucket.remove_encompassed_by(&inc("proj", &[1, 2, 3]));
        assert_eq!(removed, 3);
        assert_eq!(bucket.cube_count(), 1);
        assert_eq!(bucket.cube(0), Some(inc("proj", &[9])));
    }

    #[test]
    fn remove_encompassing_drops_broad_claims() {
        let mut bucket = bucket_with(&[inc("proj", &[1, 2, 3]), inc("proj", &[4]), exc("proj", &[4])]);
        let removed = bucket.remove_encompassing(&inc("proj", &[2]));
        assert_eq!(removed, 2);
        let left: Vec<Cube> = bucket.iter().collect();
        assert_eq!(left, vec![inc("proj", &[4])]);
    }

    #[test]
    fn remove_shifts_rows_and_keeps_pool() {
        let a = Cube::builder().include("proj", [1, 2]).exclude_one("type", 5).build();
        let b = Cube::builder().include_one("proj", 3).include_one("type", 6).build();
        let c = Cube::builder().exclude_one("proj", 4).include("type", [7, 8]).build();
        let mut bucket = bucket_with(&[a.clone(), b, c.clone()]);
        let pool = bucket.value_count();

        bucket.remove(1);
        assert_eq!(bucket.cube_count(), 2);
        assert_eq!(bucket.cube(0), Some(a));
        assert_eq!(bucket.cube(1), Some(c));
        assert_eq!(bucket.value_count(), pool);

        bucket.remove(7);
        assert_eq!(bucket.cube_count(), 2);
    }

    #[test]
    fn stale_values_are_reclaimed() {
        let mut bucket = DimensionBucket::new(1);
        let wide: Vec<i64> = (0..2000).collect();
        assert!(bucket.add_cube(&inc("proj", &wide)));
        assert!(bucket.add_cube(&inc("type", &[42])));
        assert_eq!(bucket.value_count(), 2001);

        bucket.remove(0);
        assert_eq!(bucket.value_count(), 1);
        assert!(bucket.encompasses(&inc("type", &[42])));
        assert!(!bucket.encompasses(&inc("proj", &[1])));
    }

    #[test]
    fn clear_empties_bucket() {
        let mut bucket = bucket_with(&[inc("proj", &[1])]);
        bucket.clear();
        assert!(bucket.is_empty());
        assert_eq!(bucket.value_count(), 0);
        assert!(!bucket.encompasses(&inc("proj", &[1])));
        assert_eq!(bucket.dimensions(), 1);
    }

    #[test]
    fn serialize_deserialize_preserves_answers() {
        let mut bucket = bucket_with(&[
            Cube::builder().include("proj", [-3, 10]).exclude_one("type", 5).build(),
            Cube::builder().include_one("proj", 11).include_one("type", 2).build(),
        ]);
        bucket.remove(0);
        bucket
            .add_cube(&Cube::builder().include_one("proj", 12).exclude("type", [1, 2]).build());

        let mut buf = Vec::new();
        bucket.serialize(&mut buf);
        let mut cursor = &buf[..];
        let decoded = DimensionBucket::deserialize(&mut cursor, 2).unwrap();
        assert!(!cursor.has_remaining());
        assert_eq!(decoded, bucket);
        assert!(decoded.encompasses(
            &Cube::builder().include_one("proj", 12).include_one("type", 3).build()
        ));
    }

    #[test]
    fn deserialize_rejects_dimension_mismatch() {
        let bucket = bucket_with(&[inc("proj", &[1])]);
        let mut buf = Vec::new();
        bucket.serialize(&mut buf);
        let mut cursor = &buf[..];
        assert_eq!(
            DimensionBucket::deserialize(&mut cursor, 2),
            Err(FormatError::DimensionMismatch { expected: 2, got: 1 })
        );
    }

    #[test]
    fn deserialize_rejects_absurd_counts() {
        let mut buf = Vec::new();
        put_varint(&mut buf, 1);
        put_varint(&mut buf, MAX_CUBES as u64);
        let mut cursor = &buf[..];
        assert_eq!(
            DimensionBucket::deserialize(&mut cursor, 1),
            Err(FormatError::CubeCount(MAX_CUBES as u64))
        );

        let mut buf = Vec::new();
        put_varint(&mut buf, 1);
        put_varint(&mut buf, 0);
        put_varint(&mut buf, MAX_VALUES_COUNT as u64);
        let mut cursor = &buf[..];
        assert_eq!(
            DimensionBucket::deserialize(&mut cursor, 1),
            Err(FormatError::ValueCount(MAX_VALUES_COUNT as u64))
        );
    }

    #[test]
    fn deserialize_rejects_dangling_and_unsorted_runs() {
        // one 1-cube with an included run pointing past the pool
        let mut buf = Vec::new();
        put_varint(&mut buf, 1);
        put_varint(&mut buf, 1);
        put_varint(&mut buf, 1);
        put_string(&mut buf, Some("proj"));
        for entry in [0, 2, -1, -1] {
            put_svarint(&mut buf, entry);
        }
        put_svarint(&mut buf, 7);
        let mut cursor = &buf[..];
        assert!(matches!(
            DimensionBucket::deserialize(&mut cursor, 1),
            Err(FormatError::ValueIndex { offset: 0, .. })
        ));

        let mut buf = Vec::new();
        put_varint(&mut buf, 1);
        put_varint(&mut buf, 1);
        put_varint(&mut buf, 2);
        put_string(&mut buf, Some("proj"));
        for entry in [0, 2, -1, -1] {
            put_svarint(&mut buf, entry);
        }
        put_svarint(&mut buf, 7);
        put_svarint(&mut buf, 7);
        let mut cursor = &buf[..];
        assert_eq!(
            DimensionBucket::deserialize(&mut cursor, 1),
            Err(FormatError::UnsortedValues { start: 0, end: 2 })
        );
    }

    #[test]
    fn holes_never_encompass() {
        let mut buf = Vec::new();
        put_varint(&mut buf, 1);
        put_varint(&mut buf, 1);
        put_varint(&mut buf, 0);
        put_string(&mut buf, None);
        for entry in [-1, -1, -1, -1] {
            put_svarint(&mut buf, entry);
        }
        let mut cursor = &buf[..];
        let bucket = DimensionBucket::deserialize(&mut cursor, 1).unwrap();
        assert_eq!(bucket.cube_count(), 1);
        assert!(!bucket.encompasses(&inc("proj", &[1])));
        assert_eq!(bucket.cube(0), Some(Cube::universal()));
    }

    #[test]
    fn unconstrained_axis_is_stored_as_absent_lists() {
        let stored = Cube::builder().unconstrained("proj").build();
        let bucket = bucket_with(&[stored.clone()]);
        assert_eq!(bucket.value_count(), 0);
        assert_eq!(bucket.cube(0), Some(stored));

        assert!(bucket.encompasses(&inc("proj", &[4])));
        assert!(bucket.encompasses(&exc("proj", &[4])));
        assert!(!bucket.encompasses(&inc("type", &[4])));
        assert!(!bucket.encompasses(&Cube::universal()));

        let mut buf = Vec::new();
        bucket.serialize(&mut buf);
        let mut cursor = &buf[..];
        assert_eq!(DimensionBucket::deserialize(&mut cursor, 1).unwrap(), bucket);
    }

    #[test]
    fn constrained_claim_does_not_cover_unconstrained_sample() {
        let bucket = bucket_with(&[inc("proj", &[1, 2])]);
        let any_proj = Cube::builder().unconstrained("proj").build();
        assert!(!bucket.encompasses(&any_proj));

        let mut bucket = bucket_with(&[exc("proj", &[3])]);
        assert!(!bucket.encompasses(&any_proj));
        assert_eq!(bucket.remove_encompassed_by(&any_proj), 1);
    }

    #[test]
    fn full_bucket_refuses_without_changes() {
        let mut bucket = DimensionBucket::new(1);
        for v in 0..(MAX_CUBES as i64 - 1) {
            assert!(bucket.add_cube(&inc("proj", &[v])));
        }
        let extra = inc("type", &[1]);
        assert!(!bucket.can_add(&extra));
        let before = bucket.clone();
        assert!(!bucket.add_cube(&extra));
        assert_eq!(bucket, before);

        bucket.remove(0);
        assert!(bucket.can_add(&extra));
    }

    #[test]
    fn value_pool_limit_counts_only_live_values() {
        let run = |len: i64| -> Vec<i64> { (0..len).collect() };
        let mut bucket = DimensionBucket::new(1);
        assert!(bucket.add_cube(&inc("proj", &run(30_000))));
        assert!(bucket.add_cube(&inc("type", &run(40_000))));
        assert!(!bucket.can_add(&inc("status", &run(30_000))));

        // stale values do not outnumber live ones, so the pool is kept as is
        bucket.remove(0);
        assert_eq!(bucket.value_count(), 70_000);

        let wide = inc("proj", &run(50_000));
        assert!(bucket.can_add(&wide));
        assert!(bucket.add_cube(&wide));
        assert_eq!(bucket.value_count(), 90_000);
        assert!(bucket.encompasses(&inc("type", &[39_999])));
        assert!(bucket.encompasses(&inc("proj", &[49_999])));
    }
}
