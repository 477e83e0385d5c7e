//! Uniform cell-grid neighbor search.

use rayon::prelude::*;
use sphve_core::{Boundary, FieldError, FieldId, SimBox};
use sphve_fields::ParticleData;

use crate::kernel::SUPPORT;

const MAX_CELLS_PER_AXIS: usize = 128;

/// Particles bucketed into a uniform grid over the box.
struct CellGrid {
    origin: [f64; 3],
    cell: [f64; 3],
    dims: [usize; 3],
    periodic: [bool; 3],
    start: Vec<usize>,
    items: Vec<u32>,
}

impl CellGrid {
    fn build(sim_box: &SimBox, pos: [&[f64]; 3], radius: f64) -> Self {
        let lengths = sim_box.lengths();
        let mut dims = [1usize; 3];
        let mut cell = [0.0; 3];
        for a in 0..3 {
            let l = lengths[a].max(f64::MIN_POSITIVE);
            let n = if radius > 0.0 { (l / radius).floor() as usize } else { MAX_CELLS_PER_AXIS };
            dims[a] = n.clamp(1, MAX_CELLS_PER_AXIS);
            cell[a] = l / dims[a] as f64;
        }
        let mut grid = Self {
            origin: sim_box.lo,
            cell,
            dims,
            periodic: sim_box.boundary.map(|b| b == Boundary::Periodic),
            start: Vec::new(),
            items: Vec::new(),
        };

        let n = pos[0].len();
        let ids: Vec<usize> = (0..n)
            .map(|i| grid.cell_of([pos[0][i], pos[1][i], pos[2][i]]))
            .collect();
        let ncells = dims[0] * dims[1] * dims[2];
        let mut counts = vec![0usize; ncells + 1];
        for &c in &ids {
            counts[c + 1] += 1;
        }
        for c in 0..ncells {
            counts[c + 1] += counts[c];
        }
        let mut fill = counts.clone();
        let mut items = vec![0u32; n];
        for (i, &c) in ids.iter().enumerate() {
            items[fill[c]] = i as u32;
            fill[c] += 1;
        }
        grid.start = counts;
        grid.items = items;
        grid
    }

    fn axis_index(&self, a: usize, v: f64) -> usize {
        let c = ((v - self.origin[a]) / self.cell[a]).floor();
        if c.is_nan() || c < 0.0 {
            0
        } else {
            (c as usize).min(self.dims[a] - 1)
        }
    }

    fn cell_of(&self, p: [f64; 3]) -> usize {
        let [i, j, k] = [0, 1, 2].map(|a| self.axis_index(a, p[a]));
        (i * self.dims[1] + j) * self.dims[2] + k
    }

    /// Cell indices along axis `a` within `radius` of `v`, each at most once.
    fn axis_span(&self, a: usize, v: f64, radius: f64) -> Vec<usize> {
        let d = self.dims[a] as isize;
        let c = self.axis_index(a, v) as isize;
        let s = (radius / self.cell[a]).ceil() as isize;
        if self.periodic[a] {
            if 2 * s + 1 >= d {
                return (0..self.dims[a]).collect();
            }
            (c - s..=c + s).map(|x| x.rem_euclid(d) as usize).collect()
        } else {
            ((c - s).max(0)..=(c + s).min(d - 1)).map(|x| x as usize).collect()
        }
    }

    fn for_each_candidate(&self, p: [f64; 3], radius: f64, mut f: impl FnMut(usize)) {
        let [si, sj, sk] = [0, 1, 2].map(|a| self.axis_span(a, p[a], radius));
        for &i in &si {
            for &j in &sj {
                for &k in &sk {
                    let c = (i * self.dims[1] + j) * self.dims[2] + k;
                    for &item in &self.items[self.start[c]..self.start[c + 1]] {
                        f(item as usize);
                    }
                }
            }
        }
    }
}

/// Find the neighbors of the owned particles `[first, last)`.
///
/// A resident particle `j != i` is a neighbor of `i` if it lies within the
/// kernel support `2 h_i`. Rows are truncated to `ngmax` entries and the
/// stored count in `nc` is the truncated length.
pub fn find_neighbors(
    first: usize,
    last: usize,
    data: &mut ParticleData,
    sim_box: &SimBox,
) -> Result<(), FieldError> {
    let ngmax = data.attrs.ngmax as usize;
    data.neighbors.resize(last - first, ngmax);
    let ParticleData {
        fields, neighbors, ..
    } = data;
    let [x, y, z, h, nc] = fields.fields_mut([
        FieldId::X,
        FieldId::Y,
        FieldId::Z,
        FieldId::H,
        FieldId::NC,
    ])?;
    let pos = [x.real()?, y.real()?, z.real()?];
    let h = h.real()?;
    let hmax = h.iter().copied().fold(0.0, f64::max);
    let grid = CellGrid::build(sim_box, pos, SUPPORT * hmax);

    let rows = neighbors.as_mut_slice().par_chunks_mut(ngmax.max(1));
    let counts = &mut nc.counts_mut()?[first..last];
    counts
        .par_iter_mut()
        .zip(rows)
        .enumerate()
        .for_each(|(k, (count, row))| {
            let i = first + k;
            let p = [pos[0][i], pos[1][i], pos[2][i]];
            let radius = SUPPORT * h[i];
            let r2max = radius * radius;
            let mut n = 0usize;
            grid.for_each_candidate(p, radius, |j| {
                if j == i || n >= ngmax {
                    return;
                }
                let d = sim_box.min_image([pos[0][j] - p[0], pos[1][j] - p[1], pos[2][j] - p[2]]);
                if d[0] * d[0] + d[1] * d[1] + d[2] * d[2] < r2max {
                    row[n] = j as u32;
                    n += 1;
                }
            });
            *count = n as u32;
        });

    let full = counts.iter().filter(|&&n| n as usize >= ngmax).count();
    if full > 0 {
        log::debug!("{full} neighbor lists filled to ngmax = {ngmax}");
    }
    Ok(())
}
