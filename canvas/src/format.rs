//! The registry of pixel formats.
//!
//! Every read or write of a single pixel dispatches on [`PixelFormat`]. The canonical
//! representation that all formats convert into, and from, is a 32-bit premultiplied ARGB word.
use raster_texel::texels::U32;

use crate::bits::PackedBits;
use crate::pixel::{self, Argb};

/// The encoding of the pixels in a buffer.
///
/// The discriminants are stable, they index the dispatch tables of the converter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PixelFormat {
    #[default]
    Invalid = 0,
    /// One bit per pixel, the most significant bit is the leftmost pixel.
    Mono,
    /// One bit per pixel, the least significant bit is the leftmost pixel.
    MonoLsb,
    /// One byte per pixel, an index into the color table.
    Indexed8,
    /// `0xffRRGGBB` words.
    Rgb32,
    /// `0xAARRGGBB` words with straight alpha.
    Argb32,
    /// `0xAARRGGBB` words with premultiplied alpha.
    Argb32Premultiplied,
    /// 5-6-5 bits in a 16-bit word.
    Rgb16,
    Argb8565Premultiplied,
    Rgb666,
    Argb6666Premultiplied,
    Rgb555,
    Argb8555Premultiplied,
    /// Three bytes per pixel, red first.
    Rgb888,
    Rgb444,
    Argb4444Premultiplied,
}

/// The number of pixel formats, including `Invalid`.
pub const FORMAT_COUNT: usize = 16;

impl PixelFormat {
    /// All formats, in index order.
    pub const ALL: [PixelFormat; FORMAT_COUNT] = [
        PixelFormat::Invalid,
        PixelFormat::Mono,
        PixelFormat::MonoLsb,
        PixelFormat::Indexed8,
        PixelFormat::Rgb32,
        PixelFormat::Argb32,
        PixelFormat::Argb32Premultiplied,
        PixelFormat::Rgb16,
        PixelFormat::Argb8565Premultiplied,
        PixelFormat::Rgb666,
        PixelFormat::Argb6666Premultiplied,
        PixelFormat::Rgb555,
        PixelFormat::Argb8555Premultiplied,
        PixelFormat::Rgb888,
        PixelFormat::Rgb444,
        PixelFormat::Argb4444Premultiplied,
    ];

    /// The position of the format in [`PixelFormat::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bits per pixel, 0 for `Invalid`.
    pub const fn depth(self) -> u32 {
        use PixelFormat::*;
        match self {
            Invalid => 0,
            Mono | MonoLsb => 1,
            Indexed8 => 8,
            Rgb32 | Argb32 | Argb32Premultiplied => 32,
            Rgb16 | Rgb555 | Rgb444 | Argb4444Premultiplied => 16,
            Argb8565Premultiplied | Rgb666 | Argb6666Premultiplied | Argb8555Premultiplied
            | Rgb888 => 24,
        }
    }

    /// Whole bytes per pixel, 0 for the one bit formats.
    pub const fn bytes_per_pixel(self) -> usize {
        (self.depth() / 8) as usize
    }

    /// Whether pixels carry their own alpha value.
    pub const fn has_alpha(self) -> bool {
        use PixelFormat::*;
        matches!(
            self,
            Argb32
                | Argb32Premultiplied
                | Argb8565Premultiplied
                | Argb6666Premultiplied
                | Argb8555Premultiplied
                | Argb4444Premultiplied
        )
    }

    pub const fn is_premultiplied(self) -> bool {
        self.has_alpha() && !matches!(self, PixelFormat::Argb32)
    }

    /// Whether pixels are indices into a color table.
    pub const fn is_indexed(self) -> bool {
        matches!(
            self,
            PixelFormat::Mono | PixelFormat::MonoLsb | PixelFormat::Indexed8
        )
    }

    /// The bit layout of a packed direct-color format.
    pub(crate) const fn packed(self) -> Option<PackedBits> {
        use PixelFormat::*;
        Some(match self {
            Rgb16 => PackedBits::RGB16,
            Argb8565Premultiplied => PackedBits::ARGB8565,
            Rgb666 => PackedBits::RGB666,
            Argb6666Premultiplied => PackedBits::ARGB6666,
            Rgb555 => PackedBits::RGB555,
            Argb8555Premultiplied => PackedBits::ARGB8555,
            Rgb888 => PackedBits::RGB888,
            Rgb444 => PackedBits::RGB444,
            Argb4444Premultiplied => PackedBits::ARGB4444,
            _ => return None,
        })
    }

    /// Read the raw value of a pixel: the index for indexed formats, the word otherwise.
    ///
    /// Reads beyond the scanline yield 0.
    pub fn raw_pixel(self, scanline: &[u8], x: usize) -> u32 {
        use PixelFormat::*;
        match self {
            Invalid => 0,
            Mono => scanline
                .get(x >> 3)
                .map_or(0, |&b| u32::from(b >> (7 - (x & 7))) & 1),
            MonoLsb => scanline
                .get(x >> 3)
                .map_or(0, |&b| u32::from(b >> (x & 7)) & 1),
            Indexed8 => scanline.get(x).copied().map_or(0, u32::from),
            Rgb32 | Argb32 | Argb32Premultiplied => scanline
                .get(4 * x..)
                .and_then(|bytes| U32.read_unaligned(bytes))
                .unwrap_or(0),
            _ => match self.packed() {
                Some(bits) => bits.read_word(scanline, x),
                None => 0,
            },
        }
    }

    /// Overwrite the raw value of a pixel, masked to the depth of the format.
    ///
    /// Writes beyond the scanline are ignored.
    pub fn set_raw_pixel(self, scanline: &mut [u8], x: usize, value: u32) {
        use PixelFormat::*;
        match self {
            Invalid => {}
            Mono | MonoLsb => {
                let bit = if self == Mono { 7 - (x & 7) } else { x & 7 };
                if let Some(byte) = scanline.get_mut(x >> 3) {
                    if value & 1 != 0 {
                        *byte |= 1 << bit;
                    } else {
                        *byte &= !(1 << bit);
                    }
                }
            }
            Indexed8 => {
                if let Some(byte) = scanline.get_mut(x) {
                    *byte = value as u8;
                }
            }
            Rgb32 | Argb32 | Argb32Premultiplied => {
                if let Some(bytes) = scanline.get_mut(4 * x..) {
                    U32.write_unaligned(bytes, value);
                }
            }
            _ => {
                if let Some(bits) = self.packed() {
                    let mask = (1u32 << self.depth()) - 1;
                    bits.write_word(scanline, x, value & mask);
                }
            }
        }
    }

    /// Fetch a pixel as premultiplied ARGB.
    ///
    /// Indexed formats look up the (straight) color table. A one bit image without a table reads
    /// set bits as black and clear bits as white, indices beyond the table as transparent.
    pub fn fetch_premultiplied(self, scanline: &[u8], x: usize, table: &[Argb]) -> u32 {
        use PixelFormat::*;
        let raw = self.raw_pixel(scanline, x);
        match self {
            Invalid => 0,
            Mono | MonoLsb if table.is_empty() => {
                if raw != 0 {
                    0xff00_0000
                } else {
                    0xffff_ffff
                }
            }
            Mono | MonoLsb | Indexed8 => table
                .get(raw as usize)
                .map_or(0, |&color| pixel::premultiply(color)),
            Rgb32 => raw | 0xff00_0000,
            Argb32 => pixel::premultiply(raw),
            Argb32Premultiplied => raw,
            _ => match self.packed() {
                Some(bits) => bits.unpack(raw),
                None => 0,
            },
        }
    }

    /// Store a premultiplied ARGB value into a direct-color format.
    ///
    /// Formats without alpha drop it, `Rgb32` stays opaque. Indexed formats need a color search
    /// and are left unchanged here.
    pub fn store_premultiplied(self, scanline: &mut [u8], x: usize, value: u32) {
        use PixelFormat::*;
        let raw = match self {
            Invalid | Mono | MonoLsb | Indexed8 => return,
            Rgb32 => value | 0xff00_0000,
            Argb32 => pixel::unpremultiply(value),
            Argb32Premultiplied => value,
            _ => match self.packed() {
                Some(bits) => bits.pack(value),
                None => return,
            },
        };
        self.set_raw_pixel(scanline, x, raw);
    }

    /// Fetch a run of pixels as premultiplied ARGB.
    pub(crate) fn fetch_run(self, scanline: &[u8], x: usize, out: &mut [u32], table: &[Argb]) {
        match self {
            PixelFormat::Argb32Premultiplied | PixelFormat::Rgb32 | PixelFormat::Argb32 => {
                let words = U32.try_to_slice(scanline).unwrap_or(&[]);
                let src = words.get(x..x + out.len());
                match (self, src) {
                    (PixelFormat::Argb32Premultiplied, Some(src)) => out.copy_from_slice(src),
                    (PixelFormat::Rgb32, Some(src)) => {
                        for (o, &s) in out.iter_mut().zip(src) {
                            *o = s | 0xff00_0000;
                        }
                    }
                    (PixelFormat::Argb32, Some(src)) => {
                        for (o, &s) in out.iter_mut().zip(src) {
                            *o = pixel::premultiply(s);
                        }
                    }
                    _ => self.fetch_each(scanline, x, out, table),
                }
            }
            _ => self.fetch_each(scanline, x, out, table),
        }
    }

    fn fetch_each(self, scanline: &[u8], x: usize, out: &mut [u32], table: &[Argb]) {
        for (i, o) in out.iter_mut().enumerate() {
            *o = self.fetch_premultiplied(scanline, x + i, table);
        }
    }

    /// Store a run of premultiplied ARGB pixels into a direct-color format.
    ///
    /// `Rgb16` and `Argb8565Premultiplied` pack in place, the other packed formats go through
    /// their bit layout pixel by pixel.
    pub(crate) fn store_run(self, scanline: &mut [u8], x: usize, values: &[u32]) {
        match self {
            PixelFormat::Argb32Premultiplied => {
                if let Some(dst) = U32
                    .try_to_slice_mut(scanline)
                    .and_then(|words| words.get_mut(x..x + values.len()))
                {
                    dst.copy_from_slice(values);
                    return;
                }
            }
            PixelFormat::Rgb16 => {
                let dst = scanline.get_mut(2 * x..).unwrap_or_default();
                for (d, &value) in dst.chunks_exact_mut(2).zip(values) {
                    d.copy_from_slice(&rgb16(value).to_le_bytes());
                }
                return;
            }
            PixelFormat::Argb8565Premultiplied => {
                let dst = scanline.get_mut(3 * x..).unwrap_or_default();
                for (d, &value) in dst.chunks_exact_mut(3).zip(values) {
                    let [lo, hi] = rgb16(value).to_le_bytes();
                    d.copy_from_slice(&[pixel::alpha(value) as u8, lo, hi]);
                }
                return;
            }
            _ => {}
        }

        for (i, &value) in values.iter().enumerate() {
            self.store_premultiplied(scanline, x + i, value);
        }
    }
}

/// Truncate the color channels of a pixel to `rrrrrggg gggbbbbb`.
#[inline]
const fn rgb16(p: u32) -> u16 {
    (((p >> 8) & 0xf800) | ((p >> 5) & 0x07e0) | ((p >> 3) & 0x001f)) as u16
}

/// View a row of a 32-bit format as words.
///
/// Buffer layouts keep such rows aligned, a misaligned slice yields no words.
pub(crate) fn words(row: &[u8]) -> &[u32] {
    U32.try_to_slice(row).unwrap_or(&[])
}

pub(crate) fn words_mut(row: &mut [u8]) -> &mut [u32] {
    U32.try_to_slice_mut(row).unwrap_or(&mut [])
}
