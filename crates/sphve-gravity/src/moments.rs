//! Multipole moments of tree cells.

use sphve_core::OctreeView;

/// Monopole and traceless quadrupole of a group of point masses.
///
/// The quadrupole is `sum m (3 d d^T - |d|^2 I)` about the centre of mass,
/// stored as `[q11, q12, q13, q22, q23, q33]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Multipole {
    /// Total mass.
    pub mass: f64,
    /// Centre of mass.
    pub com: [f64; 3],
    /// Traceless quadrupole about `com`.
    pub quad: [f64; 6],
}

fn add_point(quad: &mut [f64; 6], m: f64, d: [f64; 3]) {
    let r2 = d[0] * d[0] + d[1] * d[1] + d[2] * d[2];
    quad[0] += m * (3.0 * d[0] * d[0] - r2);
    quad[1] += m * 3.0 * d[0] * d[1];
    quad[2] += m * 3.0 * d[0] * d[2];
    quad[3] += m * (3.0 * d[1] * d[1] - r2);
    quad[4] += m * 3.0 * d[1] * d[2];
    quad[5] += m * (3.0 * d[2] * d[2] - r2);
}

impl Multipole {
    /// Moments of particles `range` of the position and mass columns.
    pub fn from_particles(pos: [&[f64]; 3], m: &[f32], range: std::ops::Range<usize>) -> Self {
        let mut mass = 0.0;
        let mut weighted = [0.0; 3];
        for i in range.clone() {
            let mi = f64::from(m[i]);
            mass += mi;
            for a in 0..3 {
                weighted[a] += mi * pos[a][i];
            }
        }
        if mass == 0.0 {
            return Self::default();
        }
        let com = weighted.map(|v| v / mass);
        let mut quad = [0.0; 6];
        for i in range {
            let d = [pos[0][i] - com[0], pos[1][i] - com[1], pos[2][i] - com[2]];
            add_point(&mut quad, f64::from(m[i]), d);
        }
        Self { mass, com, quad }
    }

    /// Moments of the union of `parts`, each shifted to the joint centre
    /// of mass.
    pub fn combine(parts: &[Multipole]) -> Self {
        let mass: f64 = parts.iter().map(|p| p.mass).sum();
        if mass == 0.0 {
            return Self::default();
        }
        let com = std::array::from_fn(|a| parts.iter().map(|p| p.mass * p.com[a]).sum::<f64>() / mass);
        let mut quad = [0.0; 6];
        for p in parts {
            for (q, pq) in quad.iter_mut().zip(p.quad) {
                *q += pq;
            }
            let s = [p.com[0] - com[0], p.com[1] - com[1], p.com[2] - com[2]];
            add_point(&mut quad, p.mass, s);
        }
        Self { mass, com, quad }
    }

    /// Acceleration and potential at `x` for gravitational constant `g`.
    pub fn field_at(&self, x: [f64; 3], g: f64) -> ([f64; 3], f64) {
        let r = [x[0] - self.com[0], x[1] - self.com[1], x[2] - self.com[2]];
        let r2 = r[0] * r[0] + r[1] * r[1] + r[2] * r[2];
        if r2 == 0.0 || self.mass == 0.0 {
            return ([0.0; 3], 0.0);
        }
        let inv_r = 1.0 / r2.sqrt();
        let inv_r2 = inv_r * inv_r;
        let inv_r3 = inv_r * inv_r2;
        let inv_r5 = inv_r3 * inv_r2;
        let q = self.quad;
        let qr = [
            q[0] * r[0] + q[1] * r[1] + q[2] * r[2],
            q[1] * r[0] + q[3] * r[1] + q[4] * r[2],
            q[2] * r[0] + q[4] * r[1] + q[5] * r[2],
        ];
        let rqr = r[0] * qr[0] + r[1] * qr[1] + r[2] * qr[2];

        let phi = -g * (self.mass * inv_r + 0.5 * rqr * inv_r5);
        let acc = std::array::from_fn(|a| {
            -g * self.mass * r[a] * inv_r3 + g * (qr[a] * inv_r5 - 2.5 * rqr * r[a] * inv_r5 * inv_r2)
        });
        (acc, phi)
    }
}

/// Moments of every node of `tree`, children before parents.
pub fn upsweep(tree: &OctreeView, pos: [&[f64]; 3], m: &[f32]) -> Vec<Multipole> {
    let mut moments = vec![Multipole::default(); tree.len()];
    for (idx, node) in tree.nodes.iter().enumerate().rev() {
        moments[idx] = match node.first_child {
            None => Multipole::from_particles(pos, m, node.range()),
            Some(first) => Multipole::combine(&moments[first..first + node.num_children]),
        };
    }
    moments
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn combined_moments_equal_direct_moments() {
        let x = [0.1, 0.4, 0.9, 0.3, 0.7];
        let y = [0.2, 0.8, 0.5, 0.1, 0.6];
        let z = [0.6, 0.3, 0.2, 0.9, 0.4];
        let m = [1.0f32, 2.0, 0.5, 1.5, 3.0];
        let pos = [&x[..], &y[..], &z[..]];
        let whole = Multipole::from_particles(pos, &m, 0..5);
        let parts = [
            Multipole::from_particles(pos, &m, 0..2),
            Multipole::from_particles(pos, &m, 2..5),
        ];
        let joined = Multipole::combine(&parts);
        assert!((whole.mass - joined.mass).abs() < 1e-12);
        for a in 0..3 {
            assert!((whole.com[a] - joined.com[a]).abs() < 1e-12);
        }
        for (q, j) in whole.quad.iter().zip(joined.quad) {
            assert!((q - j).abs() < 1e-12);
        }
        let trace = whole.quad[0] + whole.quad[3] + whole.quad[5];
        assert!(trace.abs() < 1e-12);
    }

    #[test]
    fn far_field_matches_point_masses() {
        let x = [0.0, 0.1, -0.05];
        let y = [0.0, 0.05, 0.1];
        let z = [0.1, -0.1, 0.0];
        let m = [1.0f32, 1.0, 2.0];
        let mp = Multipole::from_particles([&x[..], &y[..], &z[..]], &m, 0..3);
        let target = [3.0, 1.0, -2.0];
        let (acc, phi) = mp.field_at(target, 1.0);

        let mut direct = [0.0; 3];
        let mut direct_phi = 0.0;
        for i in 0..3 {
            let d = [target[0] - x[i], target[1] - y[i], target[2] - z[i]];
            let r = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
            direct_phi -= f64::from(m[i]) / r;
            for a in 0..3 {
                direct[a] -= f64::from(m[i]) * d[a] / (r * r * r);
            }
        }
        let scale = (direct[0].powi(2) + direct[1].powi(2) + direct[2].powi(2)).sqrt();
        assert!((phi - direct_phi).abs() < 5e-4 * direct_phi.abs());
        for a in 0..3 {
            assert!((acc[a] - direct[a]).abs() < 2e-3 * scale, "{a}");
        }
    }

    proptest! {
        #[test]
        fn any_split_combines_to_the_whole(
            pts in prop::collection::vec((0.0f64..1.0, 0.0f64..1.0, 0.0f64..1.0, 0.1f32..4.0), 2..24),
            cut in 1usize..23,
        ) {
            let cut = cut.min(pts.len() - 1);
            let x: Vec<f64> = pts.iter().map(|p| p.0).collect();
            let y: Vec<f64> = pts.iter().map(|p| p.1).collect();
            let z: Vec<f64> = pts.iter().map(|p| p.2).collect();
            let m: Vec<f32> = pts.iter().map(|p| p.3).collect();
            let pos = [&x[..], &y[..], &z[..]];
            let whole = Multipole::from_particles(pos, &m, 0..pts.len());
            let joined = Multipole::combine(&[
                Multipole::from_particles(pos, &m, 0..cut),
                Multipole::from_particles(pos, &m, cut..pts.len()),
            ]);
            prop_assert!((whole.mass - joined.mass).abs() < 1e-9 * whole.mass);
            for (q, j) in whole.quad.iter().zip(joined.quad) {
                prop_assert!((q - j).abs() < 1e-9 * whole.mass);
            }
        }
    }
}
