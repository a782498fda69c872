//! Conversion of whole pixel buffers between formats.
//!
//! Conversions are looked up in a matrix indexed by source and target format. Pairs without a
//! direct routine go through a canonical 32-bit format in two steps.
mod direct;
mod indexed;
mod mono;

use std::collections::HashMap;

use crate::format::{PixelFormat, FORMAT_COUNT};
use crate::frame::PixelBuffer;
use crate::layout::LayoutError;
use crate::pixel::{self, Argb};

pub(crate) use self::mono::alpha_mask;

bitflags::bitflags! {
    /// Options for color reduction and dithering.
    ///
    /// The flags form groups, compare within a group through the accessors such as
    /// [`ConversionFlags::color_dither`]. The zero member of a group is its default.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ConversionFlags: u32 {
        const AUTO_COLOR = 0x00;
        const COLOR_ONLY = 0x03;
        const MONO_ONLY = 0x02;

        const DIFFUSE_DITHER = 0x00;
        const ORDERED_DITHER = 0x10;
        const THRESHOLD_DITHER = 0x20;

        const THRESHOLD_ALPHA_DITHER = 0x00;
        const ORDERED_ALPHA_DITHER = 0x04;
        const DIFFUSE_ALPHA_DITHER = 0x08;

        const PREFER_DITHER = 0x40;
        const AVOID_DITHER = 0x80;
    }
}

/// How a color is reduced to fewer levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DitherMode {
    /// Compare against the middle value.
    Threshold,
    /// Compare against a tiled Bayer matrix.
    Ordered,
    /// Floyd-Steinberg style error diffusion.
    Diffuse,
}

impl ConversionFlags {
    const COLOR_MASK: u32 = 0x03;
    const DITHER_MASK: u32 = 0x30;
    const ALPHA_DITHER_MASK: u32 = 0x0c;
    const CHOICE_MASK: u32 = 0xc0;

    /// The dithering of colors, error diffusion by default.
    pub fn color_dither(self) -> DitherMode {
        match self.bits() & Self::DITHER_MASK {
            0x20 => DitherMode::Threshold,
            0x10 => DitherMode::Ordered,
            _ => DitherMode::Diffuse,
        }
    }

    /// The dithering of alpha into a mask, a threshold by default.
    pub fn alpha_dither(self) -> DitherMode {
        match self.bits() & Self::ALPHA_DITHER_MASK {
            0x08 => DitherMode::Diffuse,
            0x04 => DitherMode::Ordered,
            _ => DitherMode::Threshold,
        }
    }

    /// Whether dithering is preferred over an exact palette.
    pub fn prefers_dither(self) -> bool {
        self.bits() & Self::CHOICE_MASK == Self::PREFER_DITHER.bits()
    }

    /// Whether the mono only color mode is requested.
    pub fn mono_only(self) -> bool {
        self.bits() & Self::COLOR_MASK == Self::MONO_ONLY.bits()
    }
}

/// Reasons a conversion produces no image.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("conversion involves the invalid format")]
    InvalidFormat,
    #[error("the source buffer is null")]
    NullSource,
    #[error("the target buffer can not be created")]
    Layout(#[from] LayoutError),
    #[error("conversion to an indexed format needs a palette")]
    PaletteEmpty,
}

/// A conversion routine writing into a zeroed target of the same size.
pub(crate) type ConvertFn = fn(&PixelBuffer, &mut PixelBuffer, ConversionFlags, &mut Scratch);

/// Reusable state of conversions, line buffers in particular.
#[derive(Debug, Default)]
pub(crate) struct Scratch {
    pub(crate) lines: Vec<i32>,
    pub(crate) palette_cache: HashMap<Argb, u8>,
}

impl Scratch {
    /// A zeroed buffer of `len` integers, reusing the allocation.
    pub(crate) fn lines(&mut self, len: usize) -> &mut [i32] {
        self.lines.clear();
        self.lines.resize(len, 0);
        &mut self.lines
    }
}

/// Converts pixel buffers, keeping scratch memory between calls.
///
/// ```
/// use raster_canvas::{ConversionFlags, Converter, PixelBuffer, PixelFormat};
///
/// let mut converter = Converter::new();
/// let mut image = PixelBuffer::new(4, 4, PixelFormat::Rgb32);
/// image.fill_color(0xff80_8080);
///
/// let mono = converter.convert(&image, PixelFormat::Mono, ConversionFlags::ORDERED_DITHER);
/// assert_eq!(mono.color_table(), &[0xffff_ffff, 0xff00_0000]);
/// ```
#[derive(Debug, Default)]
pub struct Converter {
    scratch: Scratch,
}

impl Converter {
    pub fn new() -> Self {
        Converter::default()
    }

    /// Convert, returning the null buffer on failure.
    ///
    /// Converting into the same format shares the storage with the source.
    pub fn convert(
        &mut self,
        src: &PixelBuffer,
        format: PixelFormat,
        flags: ConversionFlags,
    ) -> PixelBuffer {
        self.try_convert(src, format, flags).unwrap_or_else(|err| {
            tracing::debug!(from = ?src.format(), to = ?format, %err, "conversion failed");
            PixelBuffer::null()
        })
    }

    /// Convert, reporting the reason of a failure.
    #[tracing::instrument(level = "trace", skip_all, fields(from = ?src.format(), to = ?format))]
    pub fn try_convert(
        &mut self,
        src: &PixelBuffer,
        format: PixelFormat,
        flags: ConversionFlags,
    ) -> Result<PixelBuffer, ConversionError> {
        if src.is_null() {
            return Err(ConversionError::NullSource);
        }

        if format == PixelFormat::Invalid || src.format() == PixelFormat::Invalid {
            return Err(ConversionError::InvalidFormat);
        }

        if src.format() == format {
            return Ok(src.clone());
        }

        match DIRECT[src.format().index()][format.index()] {
            Some(routine) => {
                let mut target = src.blank_like(format)?;
                routine(src, &mut target, flags, &mut self.scratch);
                Ok(target)
            }
            None => {
                let via = canonical(src.format(), format);
                tracing::debug!(from = ?src.format(), ?via, to = ?format, "two step conversion");
                let intermediate = self.try_convert(src, via, flags)?;
                self.try_convert(&intermediate, format, flags)
            }
        }
    }

    /// Convert a 32-bit image into an indexed format with a fixed palette, returning the null
    /// buffer on failure.
    pub fn convert_with_palette(
        &mut self,
        src: &PixelBuffer,
        format: PixelFormat,
        palette: &[Argb],
        flags: ConversionFlags,
    ) -> PixelBuffer {
        self.try_convert_with_palette(src, format, palette, flags)
            .unwrap_or_else(|err| {
                tracing::debug!(from = ?src.format(), to = ?format, %err, "palette conversion failed");
                PixelBuffer::null()
            })
    }

    /// Convert into an indexed format with a fixed palette.
    ///
    /// Each color maps to the palette entry with the smallest sum of channel differences. One
    /// bit targets use the first two entries. Sources other than 32-bit images, and direct-color
    /// targets, take the regular conversion.
    #[tracing::instrument(level = "trace", skip_all, fields(from = ?src.format(), to = ?format))]
    pub fn try_convert_with_palette(
        &mut self,
        src: &PixelBuffer,
        format: PixelFormat,
        palette: &[Argb],
        flags: ConversionFlags,
    ) -> Result<PixelBuffer, ConversionError> {
        if src.is_null() {
            return Err(ConversionError::NullSource);
        }

        if src.format() == format {
            return Ok(src.clone());
        }

        if !format.is_indexed() || src.depth() != 32 {
            return self.try_convert(src, format, flags);
        }

        if palette.is_empty() {
            return Err(ConversionError::PaletteEmpty);
        }

        let mut target = src.blank_like(format)?;
        indexed::with_palette(src, &mut target, palette, &mut self.scratch);
        Ok(target)
    }
}

/// Read a pixel of a direct-color format as straight ARGB.
pub(crate) fn straight_pixel(format: PixelFormat, row: &[u8], x: usize) -> Argb {
    match format {
        PixelFormat::Argb32 => format.raw_pixel(row, x),
        PixelFormat::Rgb32 => format.raw_pixel(row, x) | 0xff00_0000,
        _ => pixel::unpremultiply(format.fetch_premultiplied(row, x, &[])),
    }
}

/// The intermediate format for pairs without a direct routine.
///
/// Packed formats only convert directly to and from the premultiplied words.
fn canonical(src: PixelFormat, dst: PixelFormat) -> PixelFormat {
    use PixelFormat::*;
    if src.packed().is_some() || dst.packed().is_some() || src == Argb32 || dst == Argb32 {
        Argb32Premultiplied
    } else {
        Argb32
    }
}

const fn direct(src: PixelFormat, dst: PixelFormat) -> Option<ConvertFn> {
    use PixelFormat::*;
    let routine: ConvertFn = match (src, dst) {
        (Mono, MonoLsb) | (MonoLsb, Mono) => mono::swap_bit_order,
        (Mono | MonoLsb, Indexed8) => mono::mono_to_indexed8,
        (Mono | MonoLsb, Rgb32 | Argb32 | Argb32Premultiplied) => mono::mono_to_x32,
        (Indexed8 | Rgb32 | Argb32 | Argb32Premultiplied, Mono | MonoLsb) => mono::to_mono,
        (Indexed8, Rgb32 | Argb32 | Argb32Premultiplied) => indexed::indexed8_to_x32,
        (Rgb32 | Argb32 | Argb32Premultiplied, Indexed8) => indexed::rgb_to_indexed8,
        (Rgb32, Argb32 | Argb32Premultiplied) | (Argb32, Rgb32) => direct::mask_alpha,
        (Argb32, Argb32Premultiplied) => direct::premultiply,
        (Argb32Premultiplied, Argb32) => direct::unpremultiply,
        (Argb32Premultiplied, Rgb32) => direct::premultiplied_to_rgb32,
        (Rgb32 | Argb32Premultiplied, _) if dst.packed().is_some() => direct::pack,
        (_, Rgb32 | Argb32Premultiplied) if src.packed().is_some() => direct::unpack,
        _ => return None,
    };

    Some(routine)
}

const fn direct_table() -> [[Option<ConvertFn>; FORMAT_COUNT]; FORMAT_COUNT] {
    let mut table: [[Option<ConvertFn>; FORMAT_COUNT]; FORMAT_COUNT] =
        [[None; FORMAT_COUNT]; FORMAT_COUNT];
    let mut s = 0;
    while s < FORMAT_COUNT {
        let mut d = 0;
        while d < FORMAT_COUNT {
            table[s][d] = direct(PixelFormat::ALL[s], PixelFormat::ALL[d]);
            d += 1;
        }
        s += 1;
    }
    table
}

/// Routines by source and target format index.
const DIRECT: [[Option<ConvertFn>; FORMAT_COUNT]; FORMAT_COUNT] = direct_table();
