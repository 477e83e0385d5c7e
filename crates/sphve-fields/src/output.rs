//! Selection of the columns written by output routines.

use indexmap::IndexMap;
use sphve_core::FieldId;

/// Requested output columns, keyed by name.
///
/// Names that are not part of the particle field table are kept as
/// unresolvable entries so the output routine can report them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutputSelection {
    entries: IndexMap<String, Option<FieldId>>,
}

impl OutputSelection {
    /// Select `names`, dropping duplicates.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        let entries = names
            .iter()
            .map(|n| {
                let n = n.as_ref();
                (n.to_string(), FieldId::from_name(n))
            })
            .collect();
        Self { entries }
    }

    /// Number of selected names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in selection order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Selected names that resolve to a column.
    pub fn resolved(&self) -> impl Iterator<Item = (&str, FieldId)> {
        self.entries
            .iter()
            .filter_map(|(n, f)| f.map(|f| (n.as_str(), f)))
    }

    /// Selected names that do not resolve to any column.
    pub fn unresolvable(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, f)| f.is_none())
            .map(|(n, _)| n.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_unknown_names_separately() {
        let sel = OutputSelection::new(&["rho", "bogus", "x", "rho"]);
        assert_eq!(sel.len(), 3);
        let resolved: Vec<_> = sel.resolved().collect();
        assert_eq!(resolved, vec![("rho", FieldId::RHO), ("x", FieldId::X)]);
        assert_eq!(sel.unresolvable().collect::<Vec<_>>(), vec!["bogus"]);
    }
}
