//! Plain geometric data shared between the domain, the kernels and the
//! gravity solver: the simulation box and the cached octree view.

/// Boundary condition along one axis of the simulation box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boundary {
    /// Particles leaving the box are left where they are.
    Open,
    /// Coordinates wrap around to the opposite face.
    Periodic,
}

/// Axis-aligned simulation box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimBox {
    /// Lower corner.
    pub lo: [f64; 3],
    /// Upper corner.
    pub hi: [f64; 3],
    /// Boundary condition per axis.
    pub boundary: [Boundary; 3],
}

impl SimBox {
    /// Open box spanning `[lo, hi]` on every axis.
    pub fn cube(lo: f64, hi: f64) -> Self {
        Self {
            lo: [lo; 3],
            hi: [hi; 3],
            boundary: [Boundary::Open; 3],
        }
    }

    /// Fully periodic box spanning `[lo, hi]` on every axis.
    pub fn periodic_cube(lo: f64, hi: f64) -> Self {
        Self {
            lo: [lo; 3],
            hi: [hi; 3],
            boundary: [Boundary::Periodic; 3],
        }
    }

    /// Edge lengths.
    pub fn lengths(&self) -> [f64; 3] {
        [
            self.hi[0] - self.lo[0],
            self.hi[1] - self.lo[1],
            self.hi[2] - self.lo[2],
        ]
    }

    /// Apply the minimum-image convention to a separation vector.
    pub fn min_image(&self, d: [f64; 3]) -> [f64; 3] {
        let l = self.lengths();
        let mut out = d;
        for a in 0..3 {
            if self.boundary[a] == Boundary::Periodic && l[a] > 0.0 {
                out[a] -= l[a] * (out[a] / l[a]).round();
            }
        }
        out
    }

    /// Map a coordinate back into the box on periodic axes.
    pub fn wrap(&self, axis: usize, v: f64) -> f64 {
        if self.boundary[axis] != Boundary::Periodic {
            return v;
        }
        let l = self.hi[axis] - self.lo[axis];
        if l <= 0.0 {
            return v;
        }
        let mut w = (v - self.lo[axis]) % l;
        if w < 0.0 {
            w += l;
        }
        self.lo[axis] + w
    }
}

/// A node of the domain's octree, as seen by the gravity solver.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeNode {
    /// Geometric centre of the cell.
    pub center: [f64; 3],
    /// Half edge length of the cell.
    pub half_size: f64,
    /// First particle index (inclusive) covered by the cell.
    pub start: usize,
    /// Last particle index (exclusive) covered by the cell.
    pub end: usize,
    /// Index of the first child, children are stored contiguously.
    pub first_child: Option<usize>,
    /// Number of children.
    pub num_children: usize,
}

impl TreeNode {
    /// Whether the node has no children.
    pub fn is_leaf(&self) -> bool {
        self.first_child.is_none()
    }

    /// Particle index range covered by the node.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// The dataset's cached view of the domain's tree topology.
///
/// Nodes are stored in breadth-first order so that iterating in reverse
/// visits every child before its parent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OctreeView {
    /// Tree nodes, the root is at index 0 when the tree is non-empty.
    pub nodes: Vec<TreeNode>,
}

impl OctreeView {
    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the view holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of leaf cells.
    pub fn num_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_image_only_on_periodic_axes() {
        let mut b = SimBox::periodic_cube(0.0, 1.0);
        b.boundary[2] = Boundary::Open;
        let d = b.min_image([0.9, -0.8, 0.9]);
        assert!((d[0] + 0.1).abs() < 1e-12);
        assert!((d[1] - 0.2).abs() < 1e-12);
        assert!((d[2] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn wrap_maps_into_box() {
        let b = SimBox::periodic_cube(-0.5, 0.5);
        assert!((b.wrap(0, 0.75) + 0.25).abs() < 1e-12);
        assert!((b.wrap(1, -0.75) - 0.25).abs() < 1e-12);
        assert_eq!(SimBox::cube(0.0, 1.0).wrap(0, 3.0), 3.0);
    }
}
