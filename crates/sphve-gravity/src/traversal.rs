//! Tree walk accumulating accelerations and potentials.

use rayon::prelude::*;
use sphve_core::OctreeView;

use crate::moments::Multipole;

/// Opening angle unless configured otherwise.
pub const DEFAULT_THETA: f64 = 0.5;

/// Constants of a traversal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GravityParams {
    /// Gravitational constant.
    pub g: f64,
    /// Plummer softening length of direct interactions.
    pub eps: f64,
    /// Opening angle of the acceptance criterion.
    pub theta: f64,
}

/// Softened pairwise contribution of particle `j` at `x`.
pub fn direct(x: [f64; 3], xj: [f64; 3], mj: f64, params: &GravityParams) -> ([f64; 3], f64) {
    let d = [x[0] - xj[0], x[1] - xj[1], x[2] - xj[2]];
    let r2 = d[0] * d[0] + d[1] * d[1] + d[2] * d[2] + params.eps * params.eps;
    if r2 == 0.0 {
        return ([0.0; 3], 0.0);
    }
    let inv_r = 1.0 / r2.sqrt();
    let f = -params.g * mj * inv_r * inv_r * inv_r;
    ([f * d[0], f * d[1], f * d[2]], -params.g * mj * inv_r)
}

/// Acceleration and potential of particle `i`.
///
/// A cell is accepted as a multipole when its edge length over the
/// distance to its centre of mass is below `theta`; leaves that are not
/// accepted are summed particle by particle, skipping `i` itself.
pub fn walk(
    tree: &OctreeView,
    moments: &[Multipole],
    pos: [&[f64]; 3],
    m: &[f32],
    i: usize,
    params: &GravityParams,
) -> ([f64; 3], f64) {
    let x = [pos[0][i], pos[1][i], pos[2][i]];
    let mut acc = [0.0; 3];
    let mut phi = 0.0;
    let mut add = |(a, p): ([f64; 3], f64)| {
        for k in 0..3 {
            acc[k] += a[k];
        }
        phi += p;
    };

    let mut stack = Vec::with_capacity(64);
    if !tree.is_empty() {
        stack.push(0usize);
    }
    while let Some(idx) = stack.pop() {
        let node = &tree.nodes[idx];
        let mp = &moments[idx];
        if mp.mass == 0.0 {
            continue;
        }
        let d = [x[0] - mp.com[0], x[1] - mp.com[1], x[2] - mp.com[2]];
        let dist = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
        if 2.0 * node.half_size < params.theta * dist {
            add(mp.field_at(x, params.g));
            continue;
        }
        match node.first_child {
            Some(first) => stack.extend(first..first + node.num_children),
            None => {
                for j in node.range().filter(|&j| j != i) {
                    let xj = [pos[0][j], pos[1][j], pos[2][j]];
                    add(direct(x, xj, f64::from(m[j]), params));
                }
            }
        }
    }
    (acc, phi)
}

/// [`walk`] for every particle of `[first, last)`, in parallel.
pub fn walk_range(
    tree: &OctreeView,
    moments: &[Multipole],
    pos: [&[f64]; 3],
    m: &[f32],
    first: usize,
    last: usize,
    params: &GravityParams,
) -> Vec<([f64; 3], f64)> {
    (first..last)
        .into_par_iter()
        .map(|i| walk(tree, moments, pos, m, i, params))
        .collect()
}
