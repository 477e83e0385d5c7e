//! Octree construction over Morton-sorted particles.

use sphve_core::{OctreeView, SimBox, TreeNode};

use crate::morton::{self, KEY_BITS};

/// Origin and edge length of the cube enclosing `sim_box`.
pub fn root_cube(sim_box: &SimBox) -> ([f64; 3], f64) {
    let l = sim_box.lengths();
    (sim_box.lo, l[0].max(l[1]).max(l[2]))
}

/// Build a breadth-first octree over `keys`, which must be sorted.
///
/// Cells holding more than `bucket_size` particles are split until the
/// key resolution is exhausted. Empty octants produce no node.
pub fn build(keys: &[u64], sim_box: &SimBox, bucket_size: usize) -> OctreeView {
    if keys.is_empty() {
        return OctreeView::default();
    }
    let (origin, size) = root_cube(sim_box);
    let mut nodes = vec![node(origin, size, 0, 0, 0, keys.len())];
    let mut prefixes = vec![(0u32, 0u64)];
    let bucket_size = bucket_size.max(1);

    let mut i = 0;
    while i < nodes.len() {
        let (level, prefix) = prefixes[i];
        let (start, end) = (nodes[i].start, nodes[i].end);
        if end - start > bucket_size && level < KEY_BITS {
            let first_child = nodes.len();
            let mut lo = start;
            for octant in 0..8u64 {
                let child = prefix << 3 | octant;
                let hi = lo + keys[lo..end].partition_point(|&k| morton::prefix(k, level + 1) <= child);
                if hi > lo {
                    nodes.push(node(origin, size, level + 1, child, lo, hi));
                    prefixes.push((level + 1, child));
                }
                lo = hi;
            }
            nodes[i].first_child = Some(first_child);
            nodes[i].num_children = nodes.len() - first_child;
        }
        i += 1;
    }
    OctreeView { nodes }
}

fn node(origin: [f64; 3], size: f64, level: u32, prefix: u64, start: usize, end: usize) -> TreeNode {
    let cell = size / f64::from(1u32 << level);
    let c = morton::decode(prefix);
    TreeNode {
        center: [
            origin[0] + (c[0] as f64 + 0.5) * cell,
            origin[1] + (c[1] as f64 + 0.5) * cell,
            origin[2] + (c[2] as f64 + 0.5) * cell,
        ],
        half_size: 0.5 * cell,
        start,
        end,
        first_child: None,
        num_children: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted_keys(points: &[[f64; 3]], b: &SimBox) -> Vec<u64> {
        let (origin, size) = root_cube(b);
        let mut keys: Vec<u64> = points.iter().map(|&p| morton::key_of(p, origin, size)).collect();
        keys.sort_unstable();
        keys
    }

    #[test]
    fn single_bucket_is_one_leaf() {
        let b = SimBox::cube(0.0, 1.0);
        let keys = sorted_keys(&[[0.1; 3], [0.9; 3]], &b);
        let tree = build(&keys, &b, 4);
        assert_eq!(tree.len(), 1);
        assert!(tree.nodes[0].is_leaf());
        assert_eq!(tree.nodes[0].center, [0.5; 3]);
    }

    #[test]
    fn children_partition_parent_range() {
        let b = SimBox::cube(0.0, 1.0);
        let mut points = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                for k in 0..6 {
                    points.push([(i as f64 + 0.5) / 6.0, (j as f64 + 0.5) / 6.0, (k as f64 + 0.5) / 6.0]);
                }
            }
        }
        let keys = sorted_keys(&points, &b);
        let tree = build(&keys, &b, 8);
        assert!(tree.len() > 1);
        let leaf_total: usize = tree.nodes.iter().filter(|n| n.is_leaf()).map(|n| n.end - n.start).sum();
        assert_eq!(leaf_total, points.len());
        for (idx, n) in tree.nodes.iter().enumerate() {
            if let Some(fc) = n.first_child {
                assert!(fc > idx);
                let kids = &tree.nodes[fc..fc + n.num_children];
                assert_eq!(kids[0].start, n.start);
                assert_eq!(kids[kids.len() - 1].end, n.end);
                for w in kids.windows(2) {
                    assert_eq!(w[0].end, w[1].start);
                }
                for kid in kids {
                    assert!((kid.half_size - 0.5 * n.half_size).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn empty_input_gives_empty_tree() {
        assert!(build(&[], &SimBox::cube(0.0, 1.0), 8).is_empty());
    }
}
