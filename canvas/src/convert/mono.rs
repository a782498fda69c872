//! Conversions from and into the one bit formats.
use core::mem;

use crate::convert::{straight_pixel, ConversionFlags, DitherMode, Scratch};
use crate::dither::{self, BITFLIP};
use crate::format::{words_mut, PixelFormat};
use crate::frame::PixelBuffer;
use crate::pixel::{self, Argb};

/// The table of a dithered one bit image, index 0 is white.
pub(crate) const MONO_TABLE: [Argb; 2] = [0xffff_ffff, 0xff00_0000];

/// The table assumed for a one bit image with fewer than two colors, index 0 is black.
fn mono_table(src: &PixelBuffer) -> Vec<Argb> {
    let mut table = src.color_table().to_vec();
    table.truncate(2);
    if table.is_empty() {
        table.push(0xff00_0000);
    }
    if table.len() == 1 {
        table.push(0xffff_ffff);
    }
    table
}

pub(super) fn swap_bit_order(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    _: ConversionFlags,
    _: &mut Scratch,
) {
    dst.set_color_table(src.color_table());
    for (s, d) in src.rows().zip(dst.rows_mut()) {
        for (s, d) in s.iter().zip(d.iter_mut()) {
            *d = BITFLIP[usize::from(*s)];
        }
    }
}

pub(super) fn mono_to_indexed8(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    _: ConversionFlags,
    _: &mut Scratch,
) {
    let format = src.format();
    let width = src.width() as usize;
    dst.set_color_table(mono_table(src));
    for (s, d) in src.rows().zip(dst.rows_mut()) {
        for (x, d) in d.iter_mut().take(width).enumerate() {
            *d = format.raw_pixel(s, x) as u8;
        }
    }
}

pub(super) fn mono_to_x32(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    _: ConversionFlags,
    _: &mut Scratch,
) {
    let format = src.format();
    let width = src.width() as usize;
    let table: Vec<u32> = mono_table(src)
        .into_iter()
        .map(|color| match dst.format() {
            PixelFormat::Rgb32 => color | 0xff00_0000,
            PixelFormat::Argb32Premultiplied => pixel::premultiply(color),
            _ => color,
        })
        .collect();

    for (s, d) in src.rows().zip(dst.rows_mut()) {
        for (x, d) in words_mut(d).iter_mut().take(width).enumerate() {
            *d = table[format.raw_pixel(s, x) as usize];
        }
    }
}

pub(super) fn to_mono(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    flags: ConversionFlags,
    scratch: &mut Scratch,
) {
    dither_to_mono(src, dst, flags, false, scratch)
}

/// A one bit mask of the alpha of `src`, set where opaque.
///
/// Null for direct-color formats without alpha.
pub(crate) fn alpha_mask(src: &PixelBuffer, flags: ConversionFlags) -> PixelBuffer {
    let format = src.format();
    if src.is_null() || (!format.is_indexed() && !format.has_alpha()) {
        return PixelBuffer::null();
    }

    let mut mask = match src.blank_like(PixelFormat::Mono) {
        Ok(mask) => mask,
        Err(err) => {
            tracing::debug!(%err, "alpha mask allocation failed");
            return PixelBuffer::null();
        }
    };

    dither_to_mono(src, &mut mask, flags, true, &mut Scratch::default());
    mask
}

/// Per pixel intensity, a gray level, or for alpha masks the transparency `255 - alpha`.
///
/// Low values become set bits.
struct Levels {
    format: PixelFormat,
    from_alpha: bool,
    /// Levels of each color index, clamped to the last table entry.
    indexed: [i32; 256],
}

impl Levels {
    fn new(src: &PixelBuffer, from_alpha: bool) -> Self {
        let format = src.format();
        let level = |color: Argb| -> i32 {
            if from_alpha {
                255 - pixel::alpha(color) as i32
            } else {
                pixel::gray(color) as i32
            }
        };

        let mut indexed = [0; 256];
        let table = match format {
            PixelFormat::Mono | PixelFormat::MonoLsb => mono_table(src),
            _ => src.color_table().to_vec(),
        };

        for (i, entry) in indexed.iter_mut().enumerate() {
            *entry = match table.get(i).or(table.last()) {
                Some(&color) => level(color),
                // An empty table of an 8-bit image is a gray ramp.
                None => level(pixel::rgb(i as u32, i as u32, i as u32)),
            };
        }

        Levels {
            format,
            from_alpha,
            indexed,
        }
    }

    fn read(&self, row: &[u8], out: &mut [i32]) {
        let format = self.format;
        for (x, out) in out.iter_mut().enumerate() {
            *out = if format.is_indexed() {
                self.indexed[format.raw_pixel(row, x) as usize & 0xff]
            } else {
                let color = straight_pixel(format, row, x);
                if self.from_alpha {
                    255 - pixel::alpha(color) as i32
                } else {
                    pixel::gray(color) as i32
                }
            };
        }
    }
}

#[inline]
fn set_bit(row: &mut [u8], x: usize) {
    row[x >> 3] |= 0x80 >> (x & 7);
}

/// Reduce any image to one bit, black where dark or opaque.
///
/// Colors use error diffusion unless the flags select otherwise, alpha masks a threshold.
pub(crate) fn dither_to_mono(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    flags: ConversionFlags,
    from_alpha: bool,
    scratch: &mut Scratch,
) {
    let mode = if from_alpha {
        flags.alpha_dither()
    } else {
        flags.color_dither()
    };

    dst.set_color_table(MONO_TABLE);
    let width = src.width() as usize;
    let height = src.height() as usize;
    let levels = Levels::new(src, from_alpha);
    let (current, next) = scratch.lines(2 * width).split_at_mut(width);

    match mode {
        DitherMode::Diffuse => {
            let (mut current, mut next) = (current, next);
            levels.read(src.scanline(0), next);
            for (y, out) in dst.rows_mut().enumerate() {
                mem::swap(&mut current, &mut next);
                let not_last_line = y + 1 < height;
                if not_last_line {
                    levels.read(src.scanline(y as u32 + 1), next);
                }

                for x in 0..width {
                    let value = current[x];
                    let err = if value < 128 {
                        set_bit(out, x);
                        value
                    } else {
                        value - 255
                    };

                    if x + 1 < width {
                        current[x + 1] += err * 7 >> 4;
                    }

                    if not_last_line {
                        next[x] += err * 5 >> 4;
                        if x > 0 {
                            next[x - 1] += err * 3 >> 4;
                        }
                        if x + 1 < width {
                            next[x + 1] += err >> 4;
                        }
                    }
                }
            }
        }
        DitherMode::Ordered => {
            for (y, out) in dst.rows_mut().enumerate() {
                levels.read(src.scanline(y as u32), current);
                for (x, &value) in current.iter().enumerate() {
                    // Whole-image conversion walks the matrix by column.
                    let threshold = dither::threshold(y, x) as i32;
                    let set = if from_alpha {
                        255 - value >= threshold
                    } else {
                        value < threshold
                    };
                    if set {
                        set_bit(out, x);
                    }
                }
            }
        }
        DitherMode::Threshold => {
            for (y, out) in dst.rows_mut().enumerate() {
                levels.read(src.scanline(y as u32), current);
                for (x, &value) in current.iter().enumerate() {
                    if value < 128 {
                        set_bit(out, x);
                    }
                }
            }
        }
    }

    if dst.format() == PixelFormat::MonoLsb {
        for byte in dst.bytes_mut() {
            *byte = BITFLIP[usize::from(*byte)];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_image(level: u32, width: u32, height: u32) -> PixelBuffer {
        let mut image = PixelBuffer::new(width, height, PixelFormat::Rgb32);
        image.fill(pixel::rgb(level, level, level));
        image
    }

    fn set_bits(image: &PixelBuffer) -> usize {
        (0..image.height() as i32)
            .flat_map(|y| (0..image.width() as i32).map(move |x| (x, y)))
            .filter(|&(x, y)| image.pixel_index(x, y) == 1)
            .count()
    }

    fn dither(image: &PixelBuffer, format: PixelFormat, flags: ConversionFlags) -> PixelBuffer {
        let mut mono = PixelBuffer::new(image.width(), image.height(), format);
        dither_to_mono(image, &mut mono, flags, false, &mut Scratch::default());
        mono
    }

    #[test]
    fn threshold_boundary() {
        let dark = dither(&gray_image(127, 16, 4), PixelFormat::Mono, ConversionFlags::THRESHOLD_DITHER);
        assert_eq!(set_bits(&dark), 64);
        let light = dither(&gray_image(128, 16, 4), PixelFormat::Mono, ConversionFlags::THRESHOLD_DITHER);
        assert_eq!(set_bits(&light), 0);
    }

    #[test]
    fn half_gray_is_half_set() {
        let image = gray_image(128, 64, 64);
        let total = 64 * 64;
        for flags in [ConversionFlags::ORDERED_DITHER, ConversionFlags::DIFFUSE_DITHER] {
            let mono = dither(&image, PixelFormat::Mono, flags);
            let set = set_bits(&mono);
            let deviation = set.abs_diff(total / 2);
            assert!(deviation * 100 <= total, "{flags:?}: {set} of {total}");
        }
    }

    #[test]
    fn ordered_walks_matrix_by_column() {
        let image = gray_image(100, 16, 16);
        let mono = dither(&image, PixelFormat::Mono, ConversionFlags::ORDERED_DITHER);
        for y in 0..16 {
            for x in 0..16 {
                let set = 100 < dither::BAYER[x as usize][y as usize];
                assert_eq!(mono.pixel_index(x, y), i32::from(set), "at {x}, {y}");
            }
        }
    }

    #[test]
    fn lsb_is_bit_reversed() {
        let image = gray_image(100, 13, 3);
        let msb = dither(&image, PixelFormat::Mono, ConversionFlags::ORDERED_DITHER);
        let lsb = dither(&image, PixelFormat::MonoLsb, ConversionFlags::ORDERED_DITHER);
        for y in 0..3 {
            for x in 0..13 {
                assert_eq!(msb.pixel_index(x, y), lsb.pixel_index(x, y));
            }
        }
    }

    #[test]
    fn alpha_mask_modes() {
        let mut image = PixelBuffer::new(4, 1, PixelFormat::Argb32);
        for (x, alpha) in [0u32, 127, 128, 255].into_iter().enumerate() {
            image.set_pixel(x as i32, 0, (alpha << 24) | 0x00ff_ffff);
        }

        let mask = alpha_mask(&image, ConversionFlags::empty());
        let bits: Vec<_> = (0..4).map(|x| mask.pixel_index(x, 0)).collect();
        assert_eq!(bits, [0, 0, 1, 1]);

        assert!(alpha_mask(&PixelBuffer::new(2, 2, PixelFormat::Rgb32), ConversionFlags::empty()).is_null());
        assert!(!alpha_mask(&PixelBuffer::new(2, 2, PixelFormat::Argb4444Premultiplied), ConversionFlags::empty()).is_null());
    }

    #[test]
    fn mono_roundtrip() {
        let mut mono = PixelBuffer::new(11, 3, PixelFormat::Mono);
        mono.set_color_table(vec![0xffff_ffff, 0xff00_0000]);
        for (x, y) in [(0, 0), (3, 1), (10, 2), (7, 0)] {
            mono.set_pixel(x, y, 1);
        }

        let lsb = mono.convert_to(PixelFormat::MonoLsb, ConversionFlags::empty());
        assert_eq!(lsb.pixel_index(10, 2), 1);
        assert_eq!(lsb.pixel_index(9, 2), 0);
        let back = lsb.convert_to(PixelFormat::Mono, ConversionFlags::empty());
        assert_eq!(back, mono);
    }

    #[test]
    fn default_table_expansion() {
        let mut mono = PixelBuffer::new(2, 1, PixelFormat::Mono);
        mono.set_color_count(0);
        mono.fill(0);
        let bytes = mono.bytes_mut();
        bytes[0] = 0b0100_0000;

        let rgb = mono.convert_to(PixelFormat::Rgb32, ConversionFlags::empty());
        assert_eq!(rgb.pixel(0, 0), 0xff00_0000);
        assert_eq!(rgb.pixel(1, 0), 0xffff_ffff);

        let indexed = mono.convert_to(PixelFormat::Indexed8, ConversionFlags::empty());
        assert_eq!(indexed.color_table(), &[0xff00_0000, 0xffff_ffff]);
        assert_eq!(indexed.pixel_index(1, 0), 1);
    }
}
