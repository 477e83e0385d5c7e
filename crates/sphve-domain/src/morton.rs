//! Morton (Z-order) keys with 21 bits per axis.

/// Bits per axis in a key.
pub const KEY_BITS: u32 = 21;

const AXIS_MAX: u64 = (1 << KEY_BITS) - 1;

fn spread(v: u64) -> u64 {
    let mut v = v & AXIS_MAX;
    v = (v | v << 32) & 0x001f_0000_0000_ffff;
    v = (v | v << 16) & 0x001f_0000_ff00_00ff;
    v = (v | v << 8) & 0x100f_00f0_0f00_f00f;
    v = (v | v << 4) & 0x10c3_0c30_c30c_30c3;
    v = (v | v << 2) & 0x1249_2492_4924_9249;
    v
}

fn compact(v: u64) -> u64 {
    let mut v = v & 0x1249_2492_4924_9249;
    v = (v ^ (v >> 2)) & 0x10c3_0c30_c30c_30c3;
    v = (v ^ (v >> 4)) & 0x100f_00f0_0f00_f00f;
    v = (v ^ (v >> 8)) & 0x001f_0000_ff00_00ff;
    v = (v ^ (v >> 16)) & 0x001f_0000_0000_ffff;
    v = (v ^ (v >> 32)) & AXIS_MAX;
    v
}

/// Interleave integer cell coordinates into a key.
pub fn encode(ix: u64, iy: u64, iz: u64) -> u64 {
    spread(ix) << 2 | spread(iy) << 1 | spread(iz)
}

/// Integer coordinates of a key (or of a key prefix, at reduced depth).
pub fn decode(key: u64) -> [u64; 3] {
    [compact(key >> 2), compact(key >> 1), compact(key)]
}

/// Key of point `p` in the cube of edge `size` anchored at `origin`.
/// Points outside the cube are clamped onto its faces.
pub fn key_of(p: [f64; 3], origin: [f64; 3], size: f64) -> u64 {
    let scale = if size > 0.0 { (AXIS_MAX + 1) as f64 / size } else { 0.0 };
    let cell = |a: usize| -> u64 {
        let c = ((p[a] - origin[a]) * scale).floor();
        if c.is_nan() || c <= 0.0 {
            0
        } else {
            (c as u64).min(AXIS_MAX)
        }
    };
    encode(cell(0), cell(1), cell(2))
}

/// Prefix of `key` at tree depth `level`.
pub fn prefix(key: u64, level: u32) -> u64 {
    key >> (3 * (KEY_BITS - level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn octant_bits_are_x_y_z() {
        assert_eq!(encode(1, 0, 0), 0b100);
        assert_eq!(encode(0, 1, 0), 0b010);
        assert_eq!(encode(0, 0, 1), 0b001);
    }

    #[test]
    fn clamps_outside_points() {
        let k = key_of([-1.0, 2.0, 0.5], [0.0; 3], 1.0);
        let [x, y, z] = decode(k);
        assert_eq!(x, 0);
        assert_eq!(y, AXIS_MAX);
        assert_eq!(z, 1 << (KEY_BITS - 1));
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(x in 0..=AXIS_MAX, y in 0..=AXIS_MAX, z in 0..=AXIS_MAX) {
            prop_assert_eq!(decode(encode(x, y, z)), [x, y, z]);
        }

        #[test]
        fn prefix_decodes_to_coarse_cell(x in 0..=AXIS_MAX, y in 0..=AXIS_MAX, z in 0..=AXIS_MAX, level in 0u32..=KEY_BITS) {
            let shift = KEY_BITS - level;
            let coarse = decode(prefix(encode(x, y, z), level));
            prop_assert_eq!(coarse, [x >> shift, y >> shift, z >> shift]);
        }
    }
}
