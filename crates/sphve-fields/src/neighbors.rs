//! Fixed-stride neighbor lists for the locally owned particles.

/// Neighbor indices for `n` owned particles with at most `ngmax` each.
///
/// Row `i` belongs to owned particle `first + i`; the valid prefix length
/// of each row is stored in the `nc` column.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NeighborList {
    ngmax: usize,
    rows: usize,
    indices: Vec<u32>,
}

impl NeighborList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize to `rows` rows of `ngmax` entries.
    pub fn resize(&mut self, rows: usize, ngmax: usize) {
        self.rows = rows;
        self.ngmax = ngmax;
        crate::column::reallocate(&mut self.indices, rows * ngmax);
    }

    /// Row capacity.
    pub fn ngmax(&self) -> usize {
        self.ngmax
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// The first `count` entries of row `row`.
    pub fn row(&self, row: usize, count: usize) -> &[u32] {
        let start = row * self.ngmax;
        &self.indices[start..start + count.min(self.ngmax)]
    }

    /// All rows as mutable `ngmax`-sized chunks.
    pub fn rows_mut(&mut self) -> std::slice::ChunksExactMut<'_, u32> {
        self.indices.chunks_exact_mut(self.ngmax.max(1))
    }

    /// Raw storage.
    pub fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_strided() {
        let mut nl = NeighborList::new();
        nl.resize(3, 4);
        for (r, row) in nl.rows_mut().enumerate() {
            row[0] = r as u32 * 10;
            row[1] = r as u32 * 10 + 1;
        }
        assert_eq!(nl.row(2, 2), &[20, 21]);
        assert_eq!(nl.row(1, 9).len(), 4);
    }
}
