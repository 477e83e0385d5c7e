//! The Wendland C2 smoothing kernel and pair geometry helpers.

use sphve_core::SimBox;

const SIGMA: f64 = 21.0 / (16.0 * std::f64::consts::PI);

/// Kernel support in units of the smoothing length.
pub const SUPPORT: f64 = 2.0;

/// Dimensionless kernel shape `w(q)` for `q = r / h`.
pub fn w(q: f64) -> f64 {
    if q >= SUPPORT {
        return 0.0;
    }
    let t = 1.0 - 0.5 * q;
    SIGMA * t * t * t * t * (1.0 + 2.0 * q)
}

/// Derivative `dw/dq`.
pub fn dw(q: f64) -> f64 {
    if q >= SUPPORT {
        return 0.0;
    }
    let t = 1.0 - 0.5 * q;
    -5.0 * SIGMA * q * t * t * t
}

/// Kernel value `W(r, h)`.
pub fn kernel(r: f64, h: f64) -> f64 {
    w(r / h) / (h * h * h)
}

/// Derivative of `W(r, h)` with respect to `h`.
pub fn kernel_dh(r: f64, h: f64) -> f64 {
    let q = r / h;
    -(3.0 * w(q) + q * dw(q)) / (h * h * h * h)
}

/// Separation `r_j - r_i` under the box's minimum-image convention.
pub fn separation(sim_box: &SimBox, pos: [&[f64]; 3], i: usize, j: usize) -> [f64; 3] {
    sim_box.min_image([
        pos[0][j] - pos[0][i],
        pos[1][j] - pos[1][i],
        pos[2][j] - pos[2][i],
    ])
}

/// Euclidean norm.
pub fn norm(v: [f64; 3]) -> f64 {
    dot(v, v).sqrt()
}

/// Dot product.
pub fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Symmetric 3x3 matrix `[m11, m12, m13, m22, m23, m33]` times a vector.
pub fn sym_mul(m: [f64; 6], v: [f64; 3]) -> [f64; 3] {
    [
        m[0] * v[0] + m[1] * v[1] + m[2] * v[2],
        m[1] * v[0] + m[3] * v[1] + m[4] * v[2],
        m[2] * v[0] + m[4] * v[1] + m[5] * v[2],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_is_normalized() {
        // Integrate 4 pi r^2 W(r, 1) over the support.
        let n = 20_000;
        let dr = SUPPORT / n as f64;
        let total: f64 = (0..n)
            .map(|k| {
                let r = (k as f64 + 0.5) * dr;
                4.0 * std::f64::consts::PI * r * r * kernel(r, 1.0) * dr
            })
            .sum();
        assert!((total - 1.0).abs() < 1e-6, "{total}");
    }

    #[test]
    fn derivative_matches_finite_difference() {
        for q in [0.1, 0.7, 1.3, 1.9] {
            let fd = (w(q + 1e-6) - w(q - 1e-6)) / 2e-6;
            assert!((fd - dw(q)).abs() < 1e-6);
        }
        assert_eq!(w(2.5), 0.0);
        assert_eq!(dw(2.0), 0.0);
    }

    #[test]
    fn dh_matches_finite_difference() {
        let (r, h) = (0.6, 0.5);
        let fd = (kernel(r, h + 1e-7) - kernel(r, h - 1e-7)) / 2e-7;
        assert!((fd - kernel_dh(r, h)).abs() < 1e-4 * fd.abs().max(1.0));
    }
}
