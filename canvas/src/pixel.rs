//! Arithmetic on packed `0xAARRGGBB` words.
//!
//! All compositing happens on 32-bit premultiplied ARGB. The helpers operate on two channels at
//! once by masking with `0x00ff00ff`, the classic trick which keeps every intermediate in a `u32`.
//! Wrapping arithmetic is used where the sums may touch the top bit, the results are masked.

/// A straight (not premultiplied) ARGB color in one `u32`.
pub type Argb = u32;

#[inline]
pub const fn alpha(p: u32) -> u32 {
    p >> 24
}

#[inline]
pub const fn red(p: u32) -> u32 {
    (p >> 16) & 0xff
}

#[inline]
pub const fn green(p: u32) -> u32 {
    (p >> 8) & 0xff
}

#[inline]
pub const fn blue(p: u32) -> u32 {
    p & 0xff
}

/// Compose a word from channel values, each masked to a byte.
#[inline]
pub const fn rgba(r: u32, g: u32, b: u32, a: u32) -> u32 {
    ((a & 0xff) << 24) | ((r & 0xff) << 16) | ((g & 0xff) << 8) | (b & 0xff)
}

/// An opaque color.
#[inline]
pub const fn rgb(r: u32, g: u32, b: u32) -> u32 {
    rgba(r, g, b, 0xff)
}

/// Weighted luminance, `(11 r + 16 g + 5 b) / 32`.
#[inline]
pub const fn gray(p: u32) -> u32 {
    (red(p) * 11 + green(p) * 16 + blue(p) * 5) / 32
}

#[inline]
pub const fn is_gray(p: u32) -> bool {
    red(p) == green(p) && red(p) == blue(p)
}

/// Rounded division by 255 of a value up to `255 * 255`.
#[inline]
pub const fn div_255(x: u32) -> u32 {
    (x + (x >> 8) + 0x80) >> 8
}

/// Multiply all four channels with `a / 255`.
#[inline]
pub fn byte_mul(x: u32, a: u32) -> u32 {
    let mut t = (x & 0xff00ff).wrapping_mul(a);
    t = (t.wrapping_add((t >> 8) & 0xff00ff).wrapping_add(0x800080)) >> 8;
    t &= 0xff00ff;

    let mut x = ((x >> 8) & 0xff00ff).wrapping_mul(a);
    x = x.wrapping_add((x >> 8) & 0xff00ff).wrapping_add(0x800080);
    x &= 0xff00ff00;
    x | t
}

/// Mix two pixels with weights that sum to 255.
#[inline]
pub fn interpolate_255(x: u32, a: u32, y: u32, b: u32) -> u32 {
    let mut t = (x & 0xff00ff)
        .wrapping_mul(a)
        .wrapping_add((y & 0xff00ff).wrapping_mul(b));
    t = (t.wrapping_add((t >> 8) & 0xff00ff).wrapping_add(0x800080)) >> 8;
    t &= 0xff00ff;

    let mut x = ((x >> 8) & 0xff00ff)
        .wrapping_mul(a)
        .wrapping_add(((y >> 8) & 0xff00ff).wrapping_mul(b));
    x = x.wrapping_add((x >> 8) & 0xff00ff).wrapping_add(0x800080);
    x &= 0xff00ff00;
    x | t
}

/// Mix two pixels with weights that sum to 256, truncating.
#[inline]
pub fn interpolate_256(x: u32, a: u32, y: u32, b: u32) -> u32 {
    let mut t = (x & 0xff00ff)
        .wrapping_mul(a)
        .wrapping_add((y & 0xff00ff).wrapping_mul(b));
    t >>= 8;
    t &= 0xff00ff;

    let mut x = ((x >> 8) & 0xff00ff)
        .wrapping_mul(a)
        .wrapping_add(((y >> 8) & 0xff00ff).wrapping_mul(b));
    x &= 0xff00ff00;
    x | t
}

/// Convert a straight color into premultiplied form.
#[inline]
pub fn premultiply(x: Argb) -> u32 {
    let a = alpha(x);
    match a {
        0xff => x,
        0 => 0,
        _ => (byte_mul(x, a) & 0x00ff_ffff) | (a << 24),
    }
}

/// Convert a premultiplied color back into straight form.
///
/// Channels which exceed the alpha, invalid in premultiplied form, saturate.
#[inline]
pub fn unpremultiply(p: u32) -> Argb {
    let a = alpha(p);
    match a {
        0xff => p,
        0 => 0,
        _ => {
            let un = |c: u32| (c * 255 / a).min(255);
            rgba(un(red(p)), un(green(p)), un(blue(p)), a)
        }
    }
}

/// Swap the red and blue channel.
#[inline]
pub const fn swap_rb(p: u32) -> u32 {
    (p & 0xff00_ff00) | ((p >> 16) & 0xff) | ((p & 0xff) << 16)
}

/// Find the table entry matching `color`, or the nearest by squared distance over all channels.
///
/// Returns 0 for an empty table.
pub(crate) fn closest_index(table: &[u32], color: u32) -> usize {
    if let Some(exact) = table.iter().position(|&c| c == color) {
        return exact;
    }

    let distance = |c: u32| -> u32 {
        let d = |a: u32, b: u32| a.abs_diff(b).pow(2);
        d(alpha(c), alpha(color))
            + d(red(c), red(color))
            + d(green(c), green(color))
            + d(blue(c), blue(color))
    };

    table
        .iter()
        .enumerate()
        .min_by_key(|&(_, &c)| distance(c))
        .map_or(0, |(idx, _)| idx)
}
