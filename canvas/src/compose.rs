//! Composition of a source onto a destination run.
//!
//! Every function works on premultiplied ARGB. The `const_alpha` argument, in `0..=255`, scales
//! the effect of the source: 255 is the plain operation and 0 leaves the destination as it is.
//! Raster operations are the exception, they combine bits and ignore `const_alpha`.
//!
//! Each mode has a variant for a solid color and one for a run of source pixels, found through
//! [`CompositionMode::solid_fn`] and [`CompositionMode::array_fn`].
use crate::math;
use crate::pixel::{alpha, blue, byte_mul, green, interpolate_255, red, rgba};

/// Compose a solid color onto `dest`.
pub type SolidFn = fn(dest: &mut [u32], color: u32, const_alpha: u32);

/// Compose `src` onto `dest`, pixel by pixel.
pub type ArrayFn = fn(dest: &mut [u32], src: &[u32], const_alpha: u32);

/// How source and destination combine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompositionMode {
    #[default]
    SourceOver,
    DestinationOver,
    Clear,
    Source,
    Destination,
    SourceIn,
    DestinationIn,
    SourceOut,
    DestinationOut,
    SourceAtop,
    DestinationAtop,
    Xor,

    Plus,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,

    SourceOrDestination,
    SourceAndDestination,
    SourceXorDestination,
    NotSourceAndNotDestination,
    NotSourceOrNotDestination,
    NotSourceXorDestination,
    NotSource,
    NotSourceAndDestination,
    SourceAndNotDestination,
}

/// The number of composition modes.
pub const MODE_COUNT: usize = 33;

impl CompositionMode {
    /// All modes, in the order of [`CompositionMode::index`].
    #[rustfmt::skip]
    pub const ALL: [CompositionMode; MODE_COUNT] = {
        use CompositionMode::*;
        [
            SourceOver, DestinationOver, Clear, Source, Destination, SourceIn, DestinationIn,
            SourceOut, DestinationOut, SourceAtop, DestinationAtop, Xor,
            Plus, Multiply, Screen, Overlay, Darken, Lighten, ColorDodge, ColorBurn, HardLight,
            SoftLight, Difference, Exclusion,
            SourceOrDestination, SourceAndDestination, SourceXorDestination,
            NotSourceAndNotDestination, NotSourceOrNotDestination, NotSourceXorDestination,
            NotSource, NotSourceAndDestination, SourceAndNotDestination,
        ]
    };

    /// A stable index, usable for tables.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether this is a bitwise raster operation.
    pub const fn is_raster_op(self) -> bool {
        self.index() >= CompositionMode::SourceOrDestination.index()
    }

    pub fn solid_fn(self) -> SolidFn {
        SOLID[self.index()]
    }

    pub fn array_fn(self) -> ArrayFn {
        ARRAY[self.index()]
    }
}

/// Compose a solid premultiplied color onto `dest`.
///
/// ```
/// use raster_canvas::compose::{compose_solid, CompositionMode};
///
/// let mut dest = [0xff00_00ff; 4];
/// compose_solid(CompositionMode::SourceOver, &mut dest, 0xffff_0000, 255);
/// assert_eq!(dest, [0xffff_0000; 4]);
/// ```
pub fn compose_solid(mode: CompositionMode, dest: &mut [u32], color: u32, const_alpha: u32) {
    (mode.solid_fn())(dest, color, const_alpha.min(255))
}

/// Compose premultiplied `src` onto `dest`, over the shorter of the two.
pub fn compose(mode: CompositionMode, dest: &mut [u32], src: &[u32], const_alpha: u32) {
    (mode.array_fn())(dest, src, const_alpha.min(255))
}

#[rustfmt::skip]
const SOLID: [SolidFn; MODE_COUNT] = [
    solid_source_over, solid_destination_over, solid_clear, solid_source, solid_destination,
    solid_source_in, solid_destination_in, solid_source_out, solid_destination_out,
    solid_source_atop, solid_destination_atop, solid_xor,
    solid_plus, solid_multiply, solid_screen, solid_overlay, solid_darken, solid_lighten,
    solid_color_dodge, solid_color_burn, solid_hard_light, solid_soft_light, solid_difference,
    solid_exclusion,
    solid_source_or_destination, solid_source_and_destination, solid_source_xor_destination,
    solid_not_source_and_not_destination, solid_not_source_or_not_destination,
    solid_not_source_xor_destination, solid_not_source, solid_not_source_and_destination,
    solid_source_and_not_destination,
];

#[rustfmt::skip]
const ARRAY: [ArrayFn; MODE_COUNT] = [
    source_over, destination_over, clear, source, destination,
    source_in, destination_in, source_out, destination_out,
    source_atop, destination_atop, xor,
    plus, multiply, screen, overlay, darken, lighten,
    color_dodge, color_burn, hard_light, soft_light, difference,
    exclusion,
    source_or_destination, source_and_destination, source_xor_destination,
    not_source_and_not_destination, not_source_or_not_destination,
    not_source_xor_destination, not_source, not_source_and_destination,
    source_and_not_destination,
];

/// Generate the solid and the array variant of a per-pixel operation `op(dest, src, ca)`.
macro_rules! per_pixel {
    ($($solid:ident, $array:ident => $op:ident;)*) => {$(
        fn $solid(dest: &mut [u32], color: u32, const_alpha: u32) {
            for d in dest.iter_mut() {
                *d = $op(*d, color, const_alpha);
            }
        }

        fn $array(dest: &mut [u32], src: &[u32], const_alpha: u32) {
            for (d, &s) in dest.iter_mut().zip(src) {
                *d = $op(*d, s, const_alpha);
            }
        }
    )*};
}

#[inline]
fn ialpha(p: u32) -> u32 {
    alpha(!p)
}

/// The source scaled by the constant alpha.
#[inline]
fn faded(s: u32, const_alpha: u32) -> u32 {
    if const_alpha == 255 {
        s
    } else {
        byte_mul(s, const_alpha)
    }
}

fn solid_clear(dest: &mut [u32], _: u32, const_alpha: u32) {
    if const_alpha == 255 {
        dest.fill(0);
    } else {
        let ica = 255 - const_alpha;
        for d in dest.iter_mut() {
            *d = byte_mul(*d, ica);
        }
    }
}

fn clear(dest: &mut [u32], _: &[u32], const_alpha: u32) {
    solid_clear(dest, 0, const_alpha)
}

fn solid_source(dest: &mut [u32], color: u32, const_alpha: u32) {
    if const_alpha == 255 {
        dest.fill(color);
    } else {
        let ica = 255 - const_alpha;
        let color = byte_mul(color, const_alpha);
        for d in dest.iter_mut() {
            *d = color.wrapping_add(byte_mul(*d, ica));
        }
    }
}

fn source(dest: &mut [u32], src: &[u32], const_alpha: u32) {
    if const_alpha == 255 {
        let len = dest.len().min(src.len());
        dest[..len].copy_from_slice(&src[..len]);
    } else {
        let ica = 255 - const_alpha;
        for (d, &s) in dest.iter_mut().zip(src) {
            *d = interpolate_255(s, const_alpha, *d, ica);
        }
    }
}

fn solid_destination(_: &mut [u32], _: u32, _: u32) {}

fn destination(_: &mut [u32], _: &[u32], _: u32) {}

fn solid_source_over(dest: &mut [u32], color: u32, const_alpha: u32) {
    if (const_alpha & alpha(color)) == 255 {
        dest.fill(color);
        return;
    }

    let color = faded(color, const_alpha);
    let ia = ialpha(color);
    for d in dest.iter_mut() {
        *d = color.wrapping_add(byte_mul(*d, ia));
    }
}

fn source_over(dest: &mut [u32], src: &[u32], const_alpha: u32) {
    if const_alpha == 255 {
        for (d, &s) in dest.iter_mut().zip(src) {
            if s >= 0xff00_0000 {
                *d = s;
            } else if s != 0 {
                *d = s.wrapping_add(byte_mul(*d, ialpha(s)));
            }
        }
    } else {
        for (d, &s) in dest.iter_mut().zip(src) {
            let s = byte_mul(s, const_alpha);
            *d = s.wrapping_add(byte_mul(*d, ialpha(s)));
        }
    }
}

#[inline]
fn destination_over_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    d.wrapping_add(byte_mul(faded(s, const_alpha), ialpha(d)))
}

#[inline]
fn source_in_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    if const_alpha == 255 {
        byte_mul(s, alpha(d))
    } else {
        interpolate_255(byte_mul(s, const_alpha), alpha(d), d, 255 - const_alpha)
    }
}

#[inline]
fn destination_in_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    let mut a = alpha(s);
    if const_alpha != 255 {
        a = byte_mul(a, const_alpha) + 255 - const_alpha;
    }
    byte_mul(d, a)
}

#[inline]
fn source_out_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    if const_alpha == 255 {
        byte_mul(s, ialpha(d))
    } else {
        interpolate_255(byte_mul(s, const_alpha), ialpha(d), d, 255 - const_alpha)
    }
}

#[inline]
fn destination_out_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    let mut a = ialpha(s);
    if const_alpha != 255 {
        a = byte_mul(a, const_alpha) + 255 - const_alpha;
    }
    byte_mul(d, a)
}

#[inline]
fn source_atop_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    let s = faded(s, const_alpha);
    interpolate_255(s, alpha(d), d, ialpha(s))
}

#[inline]
fn destination_atop_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    let mut a = alpha(s);
    let mut s = s;
    if const_alpha != 255 {
        s = byte_mul(s, const_alpha);
        a = alpha(s) + 255 - const_alpha;
    }
    interpolate_255(d, a, s, ialpha(d))
}

#[inline]
fn xor_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    let s = faded(s, const_alpha);
    interpolate_255(s, ialpha(d), d, ialpha(s))
}

per_pixel! {
    solid_destination_over, destination_over => destination_over_op;
    solid_source_in, source_in => source_in_op;
    solid_destination_in, destination_in => destination_in_op;
    solid_source_out, source_out => source_out_op;
    solid_destination_out, destination_out => destination_out_op;
    solid_source_atop, source_atop => source_atop_op;
    solid_destination_atop, destination_atop => destination_atop_op;
    solid_xor, xor => xor_op;
}

/// Store a blend result, mixed with the destination by the constant alpha.
#[inline]
fn with_coverage(result: u32, d: u32, const_alpha: u32) -> u32 {
    if const_alpha == 255 {
        result
    } else {
        interpolate_255(result, const_alpha, d, 255 - const_alpha)
    }
}

#[inline]
fn div_255(x: i32) -> i32 {
    (x + (x >> 8) + 0x80) >> 8
}

/// The alpha of every separable blend mode, the alpha of source over.
#[inline]
fn mix_alpha(da: i32, sa: i32) -> i32 {
    255 - div_255((255 - da) * (255 - sa))
}

/// Apply `op(dst, src, da, sa)` to each color channel.
#[inline]
fn separable(d: u32, s: u32, op: impl Fn(i32, i32, i32, i32) -> i32) -> u32 {
    let (da, sa) = (alpha(d) as i32, alpha(s) as i32);
    let channel = |c: fn(u32) -> u32| op(c(d) as i32, c(s) as i32, da, sa).clamp(0, 255) as u32;
    rgba(channel(red), channel(green), channel(blue), mix_alpha(da, sa) as u32)
}

#[inline]
fn plus_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    let add = |c: fn(u32) -> u32| (c(d) + c(s)).min(255);
    let sum = rgba(add(red), add(green), add(blue), (alpha(d) + alpha(s)).min(255));
    with_coverage(sum, d, const_alpha)
}

/// `src * dst + src * (1 - da) + dst * (1 - sa)`
#[inline]
fn multiply_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    let op = |dst: i32, src: i32, da: i32, sa: i32| {
        div_255(src * dst + src * (255 - da) + dst * (255 - sa))
    };
    with_coverage(separable(d, s, op), d, const_alpha)
}

#[inline]
fn screen_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    let op = |dst: i32, src: i32, _: i32, _: i32| 255 - div_255((255 - dst) * (255 - src));
    with_coverage(separable(d, s, op), d, const_alpha)
}

#[inline]
fn overlay_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    let op = |dst: i32, src: i32, da: i32, sa: i32| {
        let temp = src * (255 - da) + dst * (255 - sa);
        if 2 * dst < da {
            div_255(2 * src * dst + temp)
        } else {
            div_255(sa * da - 2 * (da - dst) * (sa - src) + temp)
        }
    };
    with_coverage(separable(d, s, op), d, const_alpha)
}

#[inline]
fn darken_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    let op = |dst: i32, src: i32, da: i32, sa: i32| {
        let temp = src * (255 - da) + dst * (255 - sa);
        div_255((src * da).min(dst * sa) + temp)
    };
    with_coverage(separable(d, s, op), d, const_alpha)
}

#[inline]
fn lighten_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    let op = |dst: i32, src: i32, da: i32, sa: i32| {
        let temp = src * (255 - da) + dst * (255 - sa);
        div_255((src * da).max(dst * sa) + temp)
    };
    with_coverage(separable(d, s, op), d, const_alpha)
}

#[inline]
fn color_dodge_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    let op = |dst: i32, src: i32, da: i32, sa: i32| {
        let sa_da = sa * da;
        let dst_sa = dst * sa;
        let src_da = src * da;
        let temp = src * (255 - da) + dst * (255 - sa);

        if src_da + dst_sa >= sa_da {
            div_255(sa_da + temp)
        } else if src == sa || sa == 0 {
            div_255(temp)
        } else {
            div_255(255 * dst_sa / (255 - 255 * src / sa) + temp)
        }
    };
    with_coverage(separable(d, s, op), d, const_alpha)
}

#[inline]
fn color_burn_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    let op = |dst: i32, src: i32, da: i32, sa: i32| {
        let src_da = src * da;
        let dst_sa = dst * sa;
        let sa_da = sa * da;
        let temp = src * (255 - da) + dst * (255 - sa);

        if src == 0 || src_da + dst_sa <= sa_da {
            div_255(temp)
        } else {
            div_255(sa * (src_da + dst_sa - sa_da) / src + temp)
        }
    };
    with_coverage(separable(d, s, op), d, const_alpha)
}

#[inline]
fn hard_light_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    let op = |dst: i32, src: i32, da: i32, sa: i32| {
        let temp = src * (255 - da) + dst * (255 - sa);
        if 2 * src < sa {
            div_255(2 * src * dst + temp)
        } else {
            div_255(sa * da - 2 * (da - dst) * (sa - src) + temp)
        }
    };
    with_coverage(separable(d, s, op), d, const_alpha)
}

#[inline]
fn soft_light_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    let op = |dst: i32, src: i32, da: i32, sa: i32| {
        let src2 = src << 1;
        let dst_np = if da != 0 { (255 * dst / da).min(255) } else { 0 };
        let temp = (src * (255 - da) + dst * (255 - sa)) * 255;

        if src2 < sa {
            (dst * (sa * 255 + (src2 - sa) * (255 - dst_np)) + temp) / 65025
        } else if 4 * dst <= da {
            let cubic = (((16 * dst_np - 12 * 255) * dst_np + 3 * 65025) * dst_np) / 65025;
            (dst * sa * 255 + da * (src2 - sa) * cubic + temp) / 65025
        } else {
            let root = math::sqrt(f64::from(dst_np * 255)) as i32;
            (dst * sa * 255 + da * (src2 - sa) * (root - dst_np) + temp) / 65025
        }
    };
    with_coverage(separable(d, s, op), d, const_alpha)
}

#[inline]
fn difference_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    let op = |dst: i32, src: i32, da: i32, sa: i32| {
        src + dst - div_255(2 * (src * da).min(dst * sa))
    };
    with_coverage(separable(d, s, op), d, const_alpha)
}

#[inline]
fn exclusion_op(d: u32, s: u32, const_alpha: u32) -> u32 {
    let op = |dst: i32, src: i32, _: i32, _: i32| dst + src - div_255(2 * dst * src);
    with_coverage(separable(d, s, op), d, const_alpha)
}

per_pixel! {
    solid_plus, plus => plus_op;
    solid_multiply, multiply => multiply_op;
    solid_screen, screen => screen_op;
    solid_overlay, overlay => overlay_op;
    solid_darken, darken => darken_op;
    solid_lighten, lighten => lighten_op;
    solid_color_dodge, color_dodge => color_dodge_op;
    solid_color_burn, color_burn => color_burn_op;
    solid_hard_light, hard_light => hard_light_op;
    solid_soft_light, soft_light => soft_light_op;
    solid_difference, difference => difference_op;
    solid_exclusion, exclusion => exclusion_op;
}

fn solid_source_or_destination(dest: &mut [u32], color: u32, _: u32) {
    for d in dest.iter_mut() {
        *d |= color;
    }
}

fn solid_source_and_destination(dest: &mut [u32], color: u32, _: u32) {
    let color = color | 0xff00_0000;
    for d in dest.iter_mut() {
        *d &= color;
    }
}

fn solid_source_xor_destination(dest: &mut [u32], color: u32, _: u32) {
    let color = color & 0x00ff_ffff;
    for d in dest.iter_mut() {
        *d ^= color;
    }
}

fn solid_not_source_and_not_destination(dest: &mut [u32], color: u32, _: u32) {
    let color = !color;
    for d in dest.iter_mut() {
        *d = (color & !*d) | 0xff00_0000;
    }
}

fn solid_not_source_or_not_destination(dest: &mut [u32], color: u32, _: u32) {
    let color = !color | 0xff00_0000;
    for d in dest.iter_mut() {
        *d = color | !*d;
    }
}

fn solid_not_source_xor_destination(dest: &mut [u32], color: u32, _: u32) {
    let color = !color & 0x00ff_ffff;
    for d in dest.iter_mut() {
        *d ^= color;
    }
}

fn solid_not_source(dest: &mut [u32], color: u32, _: u32) {
    dest.fill(!color | 0xff00_0000);
}

fn solid_not_source_and_destination(dest: &mut [u32], color: u32, _: u32) {
    let color = !color | 0xff00_0000;
    for d in dest.iter_mut() {
        *d &= color;
    }
}

fn solid_source_and_not_destination(dest: &mut [u32], color: u32, _: u32) {
    for d in dest.iter_mut() {
        *d = (color & !*d) | 0xff00_0000;
    }
}

/// Generate the array variant of a raster operation `op(dest, src)`.
macro_rules! raster_op {
    ($($array:ident => |$d:ident, $s:ident| $op:expr;)*) => {$(
        fn $array(dest: &mut [u32], src: &[u32], _: u32) {
            for (d, &$s) in dest.iter_mut().zip(src) {
                let $d = *d;
                *d = $op;
            }
        }
    )*};
}

raster_op! {
    source_or_destination => |d, s| d | s;
    source_and_destination => |d, s| (s & d) | 0xff00_0000;
    source_xor_destination => |d, s| (s ^ d) | 0xff00_0000;
    not_source_and_not_destination => |d, s| (!s & !d) | 0xff00_0000;
    not_source_or_not_destination => |d, s| !s | !d | 0xff00_0000;
    not_source_xor_destination => |d, s| (!s ^ d) | 0xff00_0000;
    not_source => |_d, s| !s | 0xff00_0000;
    not_source_and_destination => |d, s| (!s & d) | 0xff00_0000;
    source_and_not_destination => |d, s| (s & !d) | 0xff00_0000;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::premultiply;

    /// Valid premultiplied pixels of assorted coverage.
    fn samples() -> Vec<u32> {
        [
            0x0000_0000,
            0xffff_ffff,
            0xff00_0000,
            0x80ff_0000,
            0x4012_3456,
            0xc0a0_b0c0,
            0x01ff_ffff,
            0xfe80_ff10,
        ]
        .into_iter()
        .map(premultiply)
        .collect()
    }

    #[test]
    fn modes_are_indexed_in_order() {
        for (i, mode) in CompositionMode::ALL.into_iter().enumerate() {
            assert_eq!(mode.index(), i);
        }
        assert!(CompositionMode::SourceOrDestination.is_raster_op());
        assert!(!CompositionMode::Exclusion.is_raster_op());
    }

    #[test]
    fn zero_const_alpha_is_identity() {
        let samples = samples();
        for mode in CompositionMode::ALL.into_iter().filter(|m| !m.is_raster_op()) {
            for &s in &samples {
                let mut dest = samples.clone();
                compose_solid(mode, &mut dest, s, 0);
                assert_eq!(dest, samples, "{mode:?} solid {s:08x}");

                let src = vec![s; samples.len()];
                let mut dest = samples.clone();
                compose(mode, &mut dest, &src, 0);
                assert_eq!(dest, samples, "{mode:?} array {s:08x}");
            }
        }
    }

    #[test]
    fn full_source_replaces() {
        let samples = samples();
        let mut dest = vec![0xff12_3456; samples.len()];
        compose(CompositionMode::Source, &mut dest, &samples, 255);
        assert_eq!(dest, samples);

        for &s in &samples {
            let mut dest = [0xff12_3456; 3];
            compose_solid(CompositionMode::Source, &mut dest, s, 255);
            assert_eq!(dest, [s; 3]);
        }
    }

    #[test]
    fn red_over_blue() {
        let mut dest = [0xff00_00ff; 4];
        compose_solid(CompositionMode::SourceOver, &mut dest, 0xffff_0000, 255);
        assert_eq!(dest, [0xffff_0000; 4]);

        let mut dest = [0xff00_00ff; 4];
        compose(CompositionMode::SourceOver, &mut dest, &[0xffff_0000; 4], 128);
        for p in dest {
            assert_eq!(alpha(p), 0xff);
            assert!(red(p).abs_diff(128) <= 1 && blue(p).abs_diff(127) <= 1, "{p:08x}");
        }
    }

    #[test]
    fn source_over_coverage_is_monotonic() {
        let (mut last_red, mut last_blue) = (0, 255);
        for ca in 0..=255 {
            let mut dest = [0xff00_00ff];
            compose_solid(CompositionMode::SourceOver, &mut dest, 0xffff_0000, ca);
            assert!(red(dest[0]) >= last_red && blue(dest[0]) <= last_blue, "{ca}");
            (last_red, last_blue) = (red(dest[0]), blue(dest[0]));
        }
        assert_eq!((last_red, last_blue), (255, 0));
    }

    #[test]
    fn porter_duff_opaque() {
        let (s, d) = (0xffff_0000, 0xff00_00ff);
        let run = |mode| {
            let mut dest = [d];
            compose(mode, &mut dest, &[s], 255);
            dest[0]
        };

        assert_eq!(run(CompositionMode::Clear), 0);
        assert_eq!(run(CompositionMode::Destination), d);
        assert_eq!(run(CompositionMode::DestinationOver), d);
        assert_eq!(run(CompositionMode::SourceIn), s);
        assert_eq!(run(CompositionMode::DestinationIn), d);
        assert_eq!(run(CompositionMode::SourceOut), 0);
        assert_eq!(run(CompositionMode::DestinationOut), 0);
        assert_eq!(run(CompositionMode::SourceAtop), s);
        assert_eq!(run(CompositionMode::DestinationAtop), d);
        assert_eq!(run(CompositionMode::Xor), 0);
    }

    #[test]
    fn porter_duff_transparent_destination() {
        let s = premultiply(0x80ff_0000);
        let run = |mode| {
            let mut dest = [0];
            compose_solid(mode, &mut dest, s, 255);
            dest[0]
        };

        assert_eq!(run(CompositionMode::SourceOver), s);
        assert_eq!(run(CompositionMode::DestinationOver), s);
        assert_eq!(run(CompositionMode::SourceIn), 0);
        assert_eq!(run(CompositionMode::SourceOut), s);
        assert_eq!(run(CompositionMode::Xor), s);
    }

    #[test]
    fn blend_modes_with_neutral_colors() {
        let color = 0xff20_80c0;
        let run = |mode, s, d| {
            let mut dest = [d];
            compose_solid(mode, &mut dest, s, 255);
            dest[0]
        };

        assert_eq!(run(CompositionMode::Multiply, 0xffff_ffff, color), color);
        assert_eq!(run(CompositionMode::Multiply, 0xff00_0000, color), 0xff00_0000);
        assert_eq!(run(CompositionMode::Screen, 0xff00_0000, color), color);
        assert_eq!(run(CompositionMode::Screen, 0xffff_ffff, color), 0xffff_ffff);
        assert_eq!(run(CompositionMode::Darken, 0xffff_ffff, color), color);
        assert_eq!(run(CompositionMode::Lighten, 0xff00_0000, color), color);
        assert_eq!(run(CompositionMode::Difference, color, color), 0xff00_0000);
        assert_eq!(run(CompositionMode::Exclusion, 0xff00_0000, color), color);
        assert_eq!(run(CompositionMode::Plus, 0xff80_8080, color), 0xffa0_ffff);
    }

    #[test]
    fn blend_modes_keep_valid_premultiplied() {
        let samples = samples();
        for mode in CompositionMode::ALL.into_iter().filter(|m| !m.is_raster_op()) {
            for &s in &samples {
                let mut dest = samples.clone();
                compose_solid(mode, &mut dest, s, 255);
                for p in dest {
                    let a = alpha(p);
                    assert!(red(p) <= a + 1 && green(p) <= a + 1 && blue(p) <= a + 1, "{mode:?} {p:08x}");
                }
            }
        }
    }

    #[test]
    fn raster_ops_ignore_const_alpha() {
        let (s, d) = (0xffff_0f00, 0xff0f_f0ff);
        let modes = CompositionMode::ALL.into_iter().filter(|m| m.is_raster_op());
        for mode in modes {
            let mut full = [d; 2];
            let mut faint = [d; 2];
            compose(mode, &mut full, &[s; 2], 255);
            compose(mode, &mut faint, &[s; 2], 7);
            assert_eq!(full, faint, "{mode:?}");
            assert_eq!(alpha(full[0]), 0xff, "{mode:?}");

            let mut solid = [d; 2];
            compose_solid(mode, &mut solid, s, 7);
            assert_eq!(solid, full, "{mode:?}");
        }
    }

    #[test]
    fn raster_op_values() {
        let (s, d) = (0xffff_0f00, 0xff0f_f0ff);
        let run = |mode| {
            let mut dest = [d];
            compose(mode, &mut dest, &[s], 255);
            dest[0]
        };

        assert_eq!(run(CompositionMode::SourceOrDestination), 0xffff_ffff);
        assert_eq!(run(CompositionMode::SourceAndDestination), 0xff0f_0000);
        assert_eq!(run(CompositionMode::SourceXorDestination), 0xfff0_ffff);
        assert_eq!(run(CompositionMode::NotSource), 0xff00_f0ff);
        assert_eq!(run(CompositionMode::NotSourceAndDestination), 0xff00_f0ff);
        assert_eq!(run(CompositionMode::SourceAndNotDestination), 0xfff0_0f00);
    }

    #[test]
    fn raster_op_alpha() {
        // A transparent source over a translucent destination.
        let (s, d) = (0x0000_00ff, 0x4000_0040);
        let solid = |mode| {
            let mut dest = [d];
            compose_solid(mode, &mut dest, s, 255);
            alpha(dest[0])
        };

        assert_eq!(solid(CompositionMode::SourceOrDestination), 0x40);
        assert_eq!(solid(CompositionMode::SourceAndDestination), 0x40);
        assert_eq!(solid(CompositionMode::SourceXorDestination), 0x40);
        assert_eq!(solid(CompositionMode::NotSourceXorDestination), 0x40);
        assert_eq!(solid(CompositionMode::NotSourceAndDestination), 0x40);
        assert_eq!(solid(CompositionMode::NotSource), 0xff);
        assert_eq!(solid(CompositionMode::SourceAndNotDestination), 0xff);

        let mut dest = [d];
        compose(CompositionMode::SourceOrDestination, &mut dest, &[0x8000_0000], 255);
        assert_eq!(alpha(dest[0]), 0xc0);
    }
}
