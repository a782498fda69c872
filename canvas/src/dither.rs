//! Constant tables for dithering and bit order.

/// The classic 16×16 ordered dither matrix, thresholds in `1..=255`.
///
/// Each bit of `x` and of `y` toggles a fixed pattern of threshold bits. The cell that would be
/// zero holds 1, so black never passes.
pub const BAYER: [[u8; 16]; 16] = bayer();

/// Reverse the bit order of a byte.
pub const BITFLIP: [u8; 256] = bitflip();

const fn bayer() -> [[u8; 16]; 16] {
    const X_BITS: [u8; 4] = [0xc0, 0x30, 0x0c, 0x03];
    const Y_BITS: [u8; 4] = [0x80, 0x20, 0x08, 0x02];

    let mut matrix = [[0u8; 16]; 16];
    let mut y = 0;
    while y < 16 {
        let mut x = 0;
        while x < 16 {
            let mut v = 0;
            let mut bit = 0;
            while bit < 4 {
                if (x >> bit) & 1 != 0 {
                    v ^= X_BITS[bit];
                }
                if (y >> bit) & 1 != 0 {
                    v ^= Y_BITS[bit];
                }
                bit += 1;
            }
            matrix[y][x] = if v == 0 { 1 } else { v };
            x += 1;
        }
        y += 1;
    }
    matrix
}

const fn bitflip() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i as u8).reverse_bits();
        i += 1;
    }
    table
}

/// The threshold for the pixel at `(x, y)`, row `y & 15` of the matrix.
#[inline]
pub(crate) fn threshold(x: usize, y: usize) -> u32 {
    u32::from(BAYER[y & 15][x & 15])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bayer_is_a_permutation_of_levels() {
        let mut seen = [false; 256];
        for row in BAYER.iter() {
            for &v in row {
                assert!(v >= 1);
                seen[usize::from(v)] = true;
            }
        }
        assert!(!seen[0]);
        // 256 cells mapped into 255 levels, at most one collision.
        assert!(seen.iter().filter(|&&s| s).count() >= 254);
    }

    #[test]
    fn bayer_classic_rows() {
        assert_eq!(
            BAYER[0],
            [
                0x01, 0xc0, 0x30, 0xf0, 0x0c, 0xcc, 0x3c, 0xfc, 0x03, 0xc3, 0x33, 0xf3, 0x0f, 0xcf,
                0x3f, 0xff
            ]
        );
        assert_eq!(
            BAYER[1],
            [
                0x80, 0x40, 0xb0, 0x70, 0x8c, 0x4c, 0xbc, 0x7c, 0x83, 0x43, 0xb3, 0x73, 0x8f, 0x4f,
                0xbf, 0x7f
            ]
        );
        assert_eq!(BAYER[2][..4], [0x20, 0xe0, 0x10, 0xd0]);
        assert_eq!(BAYER[4][..4], [0x08, 0xc8, 0x38, 0xf8]);
        assert_eq!(BAYER[8][..4], [0x02, 0xc2, 0x32, 0xf2]);
        assert_eq!(BAYER[15][15], 0x55);
    }

    #[test]
    fn bayer_is_balanced() {
        // Exactly half of the thresholds lie below the middle gray.
        let below = BAYER.iter().flatten().filter(|&&v| v < 128).count();
        assert_eq!(below, 128);
    }

    #[test]
    fn bitflip_involution() {
        assert_eq!(BITFLIP[0b1000_0000], 0b0000_0001);
        assert_eq!(BITFLIP[0b1100_1010], 0b0101_0011);
        for i in 0..256 {
            assert_eq!(usize::from(BITFLIP[usize::from(BITFLIP[i])]), i);
        }
    }
}
