// Path: crates/syncreg/src/cube.rs

//! Query-region descriptors.
//!
//! A [`Cube`] constrains a set of attributes, each by an optional sorted set
//! of included values and an optional sorted set of excluded values. A cube
//! with no axes is the universal region.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One attribute of a [`Cube`], with its optional value constraints.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Axis {
    attribute: String,
    included: Option<Vec<i64>>,
    excluded: Option<Vec<i64>>,
}

impl Axis {
    /// The attribute id this axis constrains.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Sorted, unique values the attribute is restricted to, if any.
    pub fn included(&self) -> Option<&[i64]> {
        self.included.as_deref()
    }

    /// Sorted, unique values the attribute must not take, if any.
    pub fn excluded(&self) -> Option<&[i64]> {
        self.excluded.as_deref()
    }

    /// Whether `value` lies inside this axis' constraint.
    pub fn allows(&self, value: i64) -> bool {
        if let Some(excluded) = &self.excluded {
            if excluded.binary_search(&value).is_ok() {
                return false;
            }
        }
        match &self.included {
            Some(included) => included.binary_search(&value).is_ok(),
            None => true,
        }
    }

    fn write_values(f: &mut fmt::Formatter<'_>, sign: char, values: Option<&[i64]>) -> fmt::Result {
        let Some(values) = values else {
            return Ok(());
        };
        write!(f, "{sign}")?;
        for (i, v) in values.iter().enumerate() {
            if i != 0 {
                write!(f, ",")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// An immutable query-region descriptor.
///
/// Axes are ordered by attribute id, each attribute appears at most once, and
/// value lists are sorted ascending without duplicates. Empty value lists are
/// normalised to absent ones. An axis left with neither list still counts as a
/// dimension: it names an attribute the region is unconstrained on, and a
/// stored region with that axis only covers queries that mention the attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Cube {
    axes: Vec<Axis>,
}

impl Cube {
    /// The zero-dimension cube, covering every possible query.
    pub fn universal() -> Self {
        Self::default()
    }

    pub fn builder() -> CubeBuilder {
        CubeBuilder::default()
    }

    /// Number of axes, unconstrained ones included.
    pub fn dimensions(&self) -> usize {
        self.axes.len()
    }

    pub fn is_universal(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn axis(&self, attribute: &str) -> Option<&Axis> {
        self.axes
            .binary_search_by(|a| a.attribute.as_str().cmp(attribute))
            .ok()
            .and_then(|i| self.axes.get(i))
    }

    pub fn contains_axis(&self, attribute: &str) -> bool {
        self.axis(attribute).is_some()
    }

    pub fn contains_any_axis<'a>(&self, attributes: impl IntoIterator<Item = &'a str>) -> bool {
        attributes.into_iter().any(|a| self.contains_axis(a))
    }

    /// Whether an item whose `attribute` equals `value` may lie inside this cube.
    /// Attributes the cube does not constrain allow every value.
    pub fn allows(&self, attribute: &str, value: i64) -> bool {
        self.axis(attribute).map_or(true, |axis| axis.allows(value))
    }

    /// Returns the region admitted by both cubes.
    ///
    /// When the values left on some axis become empty, a `precise` intersection
    /// returns `None` (no item can satisfy both), while an imprecise one drops
    /// that axis and returns a wider approximation.
    pub fn intersect(&self, other: &Cube, precise: bool) -> Option<Cube> {
        let mut axes: BTreeMap<String, AxisSets> = self
            .axes
            .iter()
            .map(|a| (a.attribute.clone(), AxisSets::from_axis(a)))
            .collect();

        for axis in &other.axes {
            let Some(current) = axes.get_mut(&axis.attribute) else {
                axes.insert(axis.attribute.clone(), AxisSets::from_axis(axis));
                continue;
            };
            if current.narrow(axis).is_none() {
                if precise {
                    return None;
                }
                axes.remove(&axis.attribute);
            }
        }

        Some(Cube::from_sets(axes))
    }

    fn from_sets(sets: BTreeMap<String, AxisSets>) -> Self {
        let axes = sets
            .into_iter()
            .map(|(attribute, sets)| Axis {
                attribute,
                included: sets
                    .included
                    .filter(|s| !s.is_empty())
                    .map(|s| s.into_iter().collect()),
                excluded: sets
                    .excluded
                    .filter(|s| !s.is_empty())
                    .map(|s| s.into_iter().collect()),
            })
            .collect();
        Self { axes }
    }
}

impl fmt::Display for Cube {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cube(")?;
        for (i, axis) in self.axes.iter().enumerate() {
            if i != 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", axis.attribute)?;
            Axis::write_values(f, '+', axis.included())?;
            Axis::write_values(f, '-', axis.excluded())?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, Default)]
struct AxisSets {
    included: Option<BTreeSet<i64>>,
    excluded: Option<BTreeSet<i64>>,
}

impl AxisSets {
    fn from_axis(axis: &Axis) -> Self {
        Self {
            included: axis.included.as_ref().map(|v| v.iter().copied().collect()),
            excluded: axis.excluded.as_ref().map(|v| v.iter().copied().collect()),
        }
    }

    /// Restricts these sets by `other`; `None` once no value is left.
    fn narrow(&mut self, other: &Axis) -> Option<()> {
        if let Some(other_included) = &other.included {
            let narrowed: BTreeSet<i64> = match &self.included {
                Some(mine) => other_included
                    .iter()
                    .copied()
                    .filter(|v| mine.contains(v))
                    .collect(),
                None => other_included
                    .iter()
                    .copied()
                    .filter(|v| self.excluded.as_ref().map_or(true, |ex| !ex.contains(v)))
                    .collect(),
            };
            if narrowed.is_empty() {
                return None;
            }
            self.included = Some(narrowed);
        }

        if let Some(other_excluded) = &other.excluded {
            self.excluded
                .get_or_insert_with(BTreeSet::new)
                .extend(other_excluded.iter().copied());
            if let Some(included) = &mut self.included {
                included.retain(|v| other_excluded.binary_search(v).is_err());
                if included.is_empty() {
                    return None;
                }
            }
        }
        Some(())
    }
}

/// Accumulates axis constraints and produces a normalised [`Cube`].
#[derive(Debug, Clone, Default)]
pub struct CubeBuilder {
    axes: BTreeMap<String, AxisSets>,
}

impl CubeBuilder {
    /// Restricts `attribute` to `values` (added to any values already included).
    pub fn include(mut self, attribute: impl Into<String>, values: impl IntoIterator<Item = i64>) -> Self {
        self.axes
            .entry(attribute.into())
            .or_default()
            .included
            .get_or_insert_with(BTreeSet::new)
            .extend(values);
        self
    }

    /// Forbids `values` for `attribute` (added to any values already excluded).
    pub fn exclude(mut self, attribute: impl Into<String>, values: impl IntoIterator<Item = i64>) -> Self {
        self.axes
            .entry(attribute.into())
            .or_default()
            .excluded
            .get_or_insert_with(BTreeSet::new)
            .extend(values);
        self
    }

    /// Adds `attribute` as a dimension without constraining its values.
    pub fn unconstrained(mut self, attribute: impl Into<String>) -> Self {
        self.axes.entry(attribute.into()).or_default();
        self
    }

    pub fn include_one(self, attribute: impl Into<String>, value: i64) -> Self {
        self.include(attribute, [value])
    }

    pub fn exclude_one(self, attribute: impl Into<String>, value: i64) -> Self {
        self.exclude(attribute, [value])
    }

    /// Builds the cube. Included values that are also excluded are dropped
    /// from the include list, unless nothing would be left.
    pub fn build(mut self) -> Cube {
        for sets in self.axes.values_mut() {
            if let (Some(included), Some(excluded)) = (&mut sets.included, &sets.excluded) {
                if included.iter().any(|v| !excluded.contains(v)) {
                    included.retain(|v| !excluded.contains(v));
                }
            }
        }
        Cube::from_sets(self.axes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sorts_dedups_and_merges() {
        let cube = Cube::builder()
            .include("proj", [20, 10, 20])
            .include("proj", [5])
            .exclude("status", [3, 1])
            .build();

        assert_eq!(cube.dimensions(), 2);
        let proj = cube.axis("proj").unwrap();
        assert_eq!(proj.included(), Some(&[5, 10, 20][..]));
        assert_eq!(proj.excluded(), None);
        assert_eq!(cube.axis("status").unwrap().excluded(), Some(&[1, 3][..]));
        assert_eq!(cube.axes()[0].attribute(), "proj");
    }

    #[test]
    fn attribute_without_values_stays_a_dimension() {
        let cube = Cube::builder()
            .include("a", [])
            .exclude("b", [])
            .unconstrained("c")
            .include_one("d", 1)
            .build();
        assert_eq!(cube.dimensions(), 4);
        for attribute in ["a", "b", "c"] {
            let axis = cube.axis(attribute).unwrap();
            assert_eq!(axis.included(), None);
            assert_eq!(axis.excluded(), None);
            assert!(axis.allows(42));
        }
        assert!(cube.contains_any_axis(["x", "c"]));
        assert!(!cube.contains_any_axis(["x", "y"]));

        let only = Cube::builder().include("a", Vec::<i64>::new()).build();
        assert!(!only.is_universal());
        assert_eq!(only.dimensions(), 1);
        assert_eq!(only.to_string(), "cube(a)");
    }

    #[test]
    fn allows_checks_both_lists() {
        let cube = Cube::builder()
            .include("a", [1, 2, 3])
            .exclude("a", [2])
            .exclude_one("b", 7)
            .build();
        assert!(cube.allows("a", 1));
        assert!(!cube.allows("a", 2));
        assert!(!cube.allows("a", 4));
        assert!(cube.allows("b", 8));
        assert!(!cube.allows("b", 7));
        assert!(cube.allows("unconstrained", 99));

        let a = cube.axis("a").unwrap();
        assert_eq!(a.included(), Some(&[1, 3][..]));
        assert_eq!(a.excluded(), Some(&[2][..]));
    }

    #[test]
    fn fully_excluded_include_list_is_kept() {
        let cube = Cube::builder().include_one("a", 2).exclude_one("a", 2).build();
        assert_eq!(cube.axis("a").unwrap().included(), Some(&[2][..]));
        assert!(!cube.allows("a", 2));
    }

    #[test]
    fn intersect_narrows_and_copies_axes() {
        let a = Cube::builder().include("proj", [1, 2, 3]).build();
        let b = Cube::builder()
            .include("proj", [2, 3, 4])
            .exclude("proj", [3])
            .include_one("type", 9)
            .build();

        let both = a.intersect(&b, true).unwrap();
        assert_eq!(
            both,
            Cube::builder()
                .include_one("proj", 2)
                .exclude_one("proj", 3)
                .include_one("type", 9)
                .build()
        );
    }

    #[test]
    fn intersect_with_empty_result() {
        let a = Cube::builder().include_one("proj", 1).include_one("type", 2).build();
        let b = Cube::builder().include_one("proj", 5).build();

        assert!(a.intersect(&b, true).is_none());
        assert_eq!(
            a.intersect(&b, false),
            Some(Cube::builder().include_one("type", 2).build())
        );
    }

    #[test]
    fn intersect_included_against_excluded() {
        let a = Cube::builder().exclude("proj", [1, 2]).build();
        let b = Cube::builder().include("proj", [2, 3]).build();
        let both = a.intersect(&b, true).unwrap();
        assert!(both.allows("proj", 3));
        assert!(!both.allows("proj", 2));
        assert!(!both.allows("proj", 4));

        let c = Cube::builder().include_one("proj", 1).build();
        assert!(a.intersect(&c, true).is_none());
    }

    #[test]
    fn display_lists_signed_values() {
        let cube = Cube::builder()
            .include("proj", [10, 20])
            .exclude_one("proj", 30)
            .exclude_one("status", 3)
            .build();
        assert_eq!(cube.to_string(), "cube(proj+10,20-30; status-3)");
        assert_eq!(Cube::universal().to_string(), "cube()");
    }
}
