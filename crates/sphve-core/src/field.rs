//! The canonical particle field table and the [`FieldSet`] bitset.
//!
//! Every per-particle column the pipeline can ever touch has a fixed slot
//! in [`FIELD_NAMES`]. A [`FieldId`] is the index of that slot; the order of
//! the table is the canonical column order used for file output.

use std::fmt;

/// Number of columns in the particle field table.
pub const FIELD_COUNT: usize = 46;

/// Name of each particle column, indexed by [`FieldId`].
pub const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "x", "y", "z", "x_m1", "y_m1", "z_m1", "vx", "vy", "vz", "rho", "u", "p", "prho", "h", "m",
    "c", "ax", "ay", "az", "du", "du_m1", "c11", "c12", "c13", "c22", "c23", "c33", "mue", "mui",
    "temp", "cv", "xm", "kx", "divv", "curlv", "alpha", "gradh", "keys", "nc", "dV11", "dV12",
    "dV13", "dV22", "dV23", "dV33", "rankTime",
];

/// Scalar type stored in a particle column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Double-precision real (`f64`).
    Real,
    /// Single-precision real (`f32`), used for masses and previous-step deltas.
    Real32,
    /// Space-filling-curve key (`u64`).
    Key,
    /// Per-particle count (`u32`).
    Count,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Real => "f64",
            Self::Real32 => "f32",
            Self::Key => "u64",
            Self::Count => "u32",
        };
        f.write_str(s)
    }
}

/// Index of a column in the particle field table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub u8);

#[allow(missing_docs)]
impl FieldId {
    pub const X: Self = Self(0);
    pub const Y: Self = Self(1);
    pub const Z: Self = Self(2);
    pub const X_M1: Self = Self(3);
    pub const Y_M1: Self = Self(4);
    pub const Z_M1: Self = Self(5);
    pub const VX: Self = Self(6);
    pub const VY: Self = Self(7);
    pub const VZ: Self = Self(8);
    pub const RHO: Self = Self(9);
    pub const U: Self = Self(10);
    pub const P: Self = Self(11);
    pub const PRHO: Self = Self(12);
    pub const H: Self = Self(13);
    pub const M: Self = Self(14);
    pub const C: Self = Self(15);
    pub const AX: Self = Self(16);
    pub const AY: Self = Self(17);
    pub const AZ: Self = Self(18);
    pub const DU: Self = Self(19);
    pub const DU_M1: Self = Self(20);
    pub const C11: Self = Self(21);
    pub const C12: Self = Self(22);
    pub const C13: Self = Self(23);
    pub const C22: Self = Self(24);
    pub const C23: Self = Self(25);
    pub const C33: Self = Self(26);
    pub const MUE: Self = Self(27);
    pub const MUI: Self = Self(28);
    pub const TEMP: Self = Self(29);
    pub const CV: Self = Self(30);
    pub const XM: Self = Self(31);
    pub const KX: Self = Self(32);
    pub const DIVV: Self = Self(33);
    pub const CURLV: Self = Self(34);
    pub const ALPHA: Self = Self(35);
    pub const GRADH: Self = Self(36);
    pub const KEYS: Self = Self(37);
    pub const NC: Self = Self(38);
    pub const DV11: Self = Self(39);
    pub const DV12: Self = Self(40);
    pub const DV13: Self = Self(41);
    pub const DV22: Self = Self(42);
    pub const DV23: Self = Self(43);
    pub const DV33: Self = Self(44);
    pub const RANK_TIME: Self = Self(45);
}

impl FieldId {
    /// Column index into the field table.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Field name as used in checkpoints and configuration.
    pub fn name(self) -> &'static str {
        FIELD_NAMES[self.index()]
    }

    /// Look up a field by name.
    pub fn from_name(name: &str) -> Option<Self> {
        FIELD_NAMES
            .iter()
            .position(|&n| n == name)
            .map(|i| Self(i as u8))
    }

    /// Build a field id from a column index, if it is in range.
    pub fn from_index(index: usize) -> Option<Self> {
        (index < FIELD_COUNT).then_some(Self(index as u8))
    }

    /// Scalar type of this column.
    pub fn kind(self) -> FieldKind {
        match self {
            Self::KEYS => FieldKind::Key,
            Self::NC => FieldKind::Count,
            Self::M | Self::X_M1 | Self::Y_M1 | Self::Z_M1 | Self::DU | Self::DU_M1 => {
                FieldKind::Real32
            }
            _ => FieldKind::Real,
        }
    }

    /// Iterate over every field in canonical column order.
    pub fn all() -> impl Iterator<Item = FieldId> {
        (0..FIELD_COUNT as u8).map(FieldId)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match FIELD_NAMES.get(self.index()) {
            Some(name) => f.write_str(name),
            None => write!(f, "#{}", self.0),
        }
    }
}

/// A set of particle fields, stored as a single 64-bit word.
///
/// Used to declare which fields a pipeline phase reads, which fields a
/// halo exchange carries, and which fields a registry snapshot holds.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FieldSet {
    bits: u64,
}

impl FieldSet {
    /// Create an empty field set.
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Build a set from a slice of field ids.
    pub fn of(fields: &[FieldId]) -> Self {
        fields.iter().copied().collect()
    }

    /// Insert a field into the set.
    pub fn insert(&mut self, field: FieldId) {
        self.bits |= 1u64 << field.0;
    }

    /// Remove a field from the set.
    pub fn remove(&mut self, field: FieldId) {
        self.bits &= !(1u64 << field.0);
    }

    /// Check whether the set contains a field.
    pub fn contains(&self, field: FieldId) -> bool {
        self.bits & (1u64 << field.0) != 0
    }

    /// Return the union of two sets (`self | other`).
    pub fn union(&self, other: &Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Return the intersection of two sets (`self & other`).
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            bits: self.bits & other.bits,
        }
    }

    /// Return the fields in `self` but not in `other`.
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            bits: self.bits & !other.bits,
        }
    }

    /// Check whether every field of `self` is also in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.bits & !other.bits == 0
    }

    /// Returns `true` if the set contains no fields.
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Number of fields in the set.
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Iterate over the fields in ascending column order.
    pub fn iter(&self) -> FieldSetIter {
        FieldSetIter { bits: self.bits }
    }
}

impl fmt::Debug for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(FieldId::name)).finish()
    }
}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(field.name())?;
        }
        Ok(())
    }
}

impl FromIterator<FieldId> for FieldSet {
    fn from_iter<I: IntoIterator<Item = FieldId>>(iter: I) -> Self {
        let mut set = Self::empty();
        for field in iter {
            set.insert(field);
        }
        set
    }
}

impl IntoIterator for FieldSet {
    type Item = FieldId;
    type IntoIter = FieldSetIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`FieldSet`], yielding ids in ascending order.
pub struct FieldSetIter {
    bits: u64,
}

impl Iterator for FieldSetIter {
    type Item = FieldId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bits == 0 {
            return None;
        }
        let bit = self.bits.trailing_zeros();
        self.bits &= self.bits - 1;
        Some(FieldId(bit as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn names_round_trip_through_ids() {
        for field in FieldId::all() {
            assert_eq!(FieldId::from_name(field.name()), Some(field));
        }
        assert_eq!(FieldId::from_name("prho"), Some(FieldId::PRHO));
        assert_eq!(FieldId::from_name("dV33"), Some(FieldId::DV33));
        assert_eq!(FieldId::from_name("density"), None);
    }

    #[test]
    fn named_constants_match_table() {
        assert_eq!(FieldId::KEYS.name(), "keys");
        assert_eq!(FieldId::NC.name(), "nc");
        assert_eq!(FieldId::GRADH.name(), "gradh");
        assert_eq!(FieldId::RANK_TIME.name(), "rankTime");
    }

    #[test]
    fn kinds_follow_storage_types() {
        assert_eq!(FieldId::KEYS.kind(), FieldKind::Key);
        assert_eq!(FieldId::NC.kind(), FieldKind::Count);
        assert_eq!(FieldId::M.kind(), FieldKind::Real32);
        assert_eq!(FieldId::DU_M1.kind(), FieldKind::Real32);
        assert_eq!(FieldId::VX.kind(), FieldKind::Real);
    }

    #[test]
    fn display_lists_names() {
        let set = FieldSet::of(&[FieldId::VX, FieldId::X, FieldId::ALPHA]);
        assert_eq!(set.to_string(), "x, vx, alpha");
    }

    #[test]
    fn from_index_rejects_out_of_range() {
        assert_eq!(FieldId::from_index(0), Some(FieldId::X));
        assert_eq!(FieldId::from_index(FIELD_COUNT), None);
    }

    fn arb_field_set() -> impl Strategy<Value = FieldSet> {
        prop::collection::vec(0u8..FIELD_COUNT as u8, 0..24)
            .prop_map(|ids| ids.into_iter().map(FieldId).collect::<FieldSet>())
    }

    proptest! {
        #[test]
        fn union_commutative(a in arb_field_set(), b in arb_field_set()) {
            prop_assert_eq!(a.union(&b), b.union(&a));
        }

        #[test]
        fn difference_removes_common(a in arb_field_set(), b in arb_field_set()) {
            let diff = a.difference(&b);
            for field in diff.iter() {
                prop_assert!(a.contains(field));
                prop_assert!(!b.contains(field));
            }
        }

        #[test]
        fn subset_of_union(a in arb_field_set(), b in arb_field_set()) {
            prop_assert!(a.is_subset(&a.union(&b)));
        }

        #[test]
        fn remove_undoes_insert(a in arb_field_set(), id in 0u8..FIELD_COUNT as u8) {
            let mut set = a;
            let had = set.contains(FieldId(id));
            set.insert(FieldId(id));
            set.remove(FieldId(id));
            prop_assert!(!set.contains(FieldId(id)));
            prop_assert_eq!(set.len() + usize::from(had), a.len());
        }

        #[test]
        fn len_matches_iter_count(a in arb_field_set()) {
            prop_assert_eq!(a.len(), a.iter().count());
        }
    }
}
