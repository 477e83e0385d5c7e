//! Domain trait compliance checks.
//!
//! These functions verify that a [`Domain`] implementation satisfies the
//! invariants the step pipeline relies on after a sync. Reused by every
//! domain's test module and by the test fixtures.

use crate::domain::Domain;

/// Assert `start_index <= end_index <= n_particles_with_halos`.
pub fn assert_range_ordered(domain: &dyn Domain) {
    let (first, last, n) = (
        domain.start_index(),
        domain.end_index(),
        domain.n_particles_with_halos(),
    );
    assert!(
        first <= last && last <= n,
        "owned range [{first}, {last}) not inside [0, {n})"
    );
    assert_eq!(domain.n_particles(), last - first);
}

/// Assert that the box has positive extent on every axis.
pub fn assert_box_non_degenerate(domain: &dyn Domain) {
    let b = domain.sim_box();
    for (axis, l) in b.lengths().into_iter().enumerate() {
        assert!(l > 0.0, "box has non-positive extent {l} on axis {axis}");
    }
}

/// Assert that the tree's leaves cover the resident particles exactly
/// once and that every child lies inside its parent.
pub fn assert_tree_covers_particles(domain: &dyn Domain) {
    let tree = domain.octree_properties();
    if tree.is_empty() {
        assert_eq!(domain.n_particles_with_halos(), 0, "non-empty domain without a tree");
        return;
    }
    let root = &tree.nodes[0];
    assert_eq!(root.range(), 0..domain.n_particles_with_halos());
    let mut covered = vec![0u32; domain.n_particles_with_halos()];
    for (idx, node) in tree.nodes.iter().enumerate() {
        match node.first_child {
            None => {
                for i in node.range() {
                    covered[i] += 1;
                }
            }
            Some(fc) => {
                assert!(fc > idx, "child {fc} stored before parent {idx}");
                for child in &tree.nodes[fc..fc + node.num_children] {
                    assert!(child.start >= node.start && child.end <= node.end);
                    for a in 0..3 {
                        let gap = (child.center[a] - node.center[a]).abs();
                        assert!(gap <= node.half_size + 1e-12, "child escapes parent on axis {a}");
                    }
                }
            }
        }
    }
    assert!(covered.iter().all(|&c| c == 1), "leaves do not partition the particles");
}

/// Run every compliance check on a synced domain.
pub fn run_full_compliance(domain: &dyn Domain) {
    assert_range_ordered(domain);
    assert_box_non_degenerate(domain);
    assert_tree_covers_particles(domain);
    assert!(domain.check_range().is_ok());
}
