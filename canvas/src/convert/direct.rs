//! Conversions between direct-color formats.
use crate::convert::{ConversionFlags, Scratch};
use crate::format::{words, words_mut, PixelFormat};
use crate::frame::PixelBuffer;
use crate::pixel;

/// Apply `map` to every word of a 32-bit image.
fn map_words(src: &PixelBuffer, dst: &mut PixelBuffer, map: impl Fn(u32) -> u32) {
    let width = src.width() as usize;
    for (s, d) in src.rows().zip(dst.rows_mut()) {
        for (&s, d) in words(s).iter().zip(words_mut(d)).take(width) {
            *d = map(s);
        }
    }
}

pub(super) fn mask_alpha(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    _: ConversionFlags,
    _: &mut Scratch,
) {
    map_words(src, dst, |p| p | 0xff00_0000)
}

pub(super) fn premultiply(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    _: ConversionFlags,
    _: &mut Scratch,
) {
    map_words(src, dst, pixel::premultiply)
}

pub(super) fn unpremultiply(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    _: ConversionFlags,
    _: &mut Scratch,
) {
    map_words(src, dst, pixel::unpremultiply)
}

pub(super) fn premultiplied_to_rgb32(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    _: ConversionFlags,
    _: &mut Scratch,
) {
    map_words(src, dst, |p| 0xff00_0000 | pixel::unpremultiply(p))
}

/// From `Rgb32` or premultiplied words into a packed format.
pub(super) fn pack(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    _: ConversionFlags,
    _: &mut Scratch,
) {
    let opaque = src.format() == PixelFormat::Rgb32;
    let target = dst.format();
    let width = src.width() as usize;
    for (s, d) in src.rows().zip(dst.rows_mut()) {
        for (x, &p) in words(s).iter().take(width).enumerate() {
            let p = if opaque { p | 0xff00_0000 } else { p };
            target.store_premultiplied(d, x, p);
        }
    }
}

/// From a packed format into `Rgb32` or premultiplied words.
pub(super) fn unpack(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    _: ConversionFlags,
    _: &mut Scratch,
) {
    let format = src.format();
    let opaque = dst.format() == PixelFormat::Rgb32;
    let width = src.width() as usize;
    for (s, d) in src.rows().zip(dst.rows_mut()) {
        for (x, d) in words_mut(d).iter_mut().take(width).enumerate() {
            let p = format.fetch_premultiplied(s, x, &[]);
            *d = if opaque {
                0xff00_0000 | pixel::unpremultiply(p)
            } else {
                p
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::convert::ConversionFlags;
    use crate::format::PixelFormat;
    use crate::frame::PixelBuffer;

    #[test]
    fn straight_to_opaque_drops_alpha() {
        let mut image = PixelBuffer::new(2, 2, PixelFormat::Argb32);
        image.set_pixel(0, 0, 0x80ff_0000);
        image.set_pixel(1, 0, 0x0000_ff00);
        image.set_pixel(0, 1, 0xff00_00ff);
        image.set_pixel(1, 1, 0x4012_3456);

        let rgb = image.convert_to(PixelFormat::Rgb32, ConversionFlags::empty());
        assert_eq!(rgb.pixel(0, 0), 0xffff_0000);
        assert_eq!(rgb.pixel(1, 0), 0xff00_ff00);
        assert_eq!(rgb.pixel(0, 1), 0xff00_00ff);
        assert_eq!(rgb.pixel(1, 1), 0xff12_3456);
    }

    #[test]
    fn premultiplied_to_opaque_unpremultiplies() {
        let mut image = PixelBuffer::new(1, 1, PixelFormat::Argb32Premultiplied);
        image.set_pixel(0, 0, 0x80ff_0000);
        assert_eq!(image.bytes()[..4], 0x8080_0000u32.to_ne_bytes());

        let rgb = image.convert_to(PixelFormat::Rgb32, ConversionFlags::empty());
        assert_eq!(rgb.pixel(0, 0), 0xffff_0000);
        let straight = image.convert_to(PixelFormat::Argb32, ConversionFlags::empty());
        assert_eq!(straight.pixel(0, 0), 0x80ff_0000);
    }

    #[test]
    fn packed_roundtrip_keeps_representable_colors() {
        let colors = [0xff00_0000, 0xffff_ffff, 0xffff_0000, 0xff00_ff00, 0xff00_00ff];
        let mut image = PixelBuffer::new(colors.len() as u32, 1, PixelFormat::Rgb32);
        for (x, &c) in colors.iter().enumerate() {
            image.set_pixel(x as i32, 0, c);
        }

        for format in PixelFormat::ALL.into_iter().filter(|f| f.packed().is_some()) {
            let packed = image.convert_to(format, ConversionFlags::empty());
            let back = packed.convert_to(PixelFormat::Rgb32, ConversionFlags::empty());
            assert_eq!(back, image, "{format:?}");
        }
    }

    #[test]
    fn packed_alpha_survives() {
        let mut image = PixelBuffer::new(1, 1, PixelFormat::Argb32);
        image.set_pixel(0, 0, 0x00ff_ffff);
        let packed = image.convert_to(PixelFormat::Argb8565Premultiplied, ConversionFlags::empty());
        assert_eq!(packed.pixel(0, 0), 0);
        let opaque = packed.convert_to(PixelFormat::Rgb16, ConversionFlags::empty());
        assert_eq!(opaque.pixel(0, 0), 0xff00_0000);
    }
}
