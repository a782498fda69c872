//! A software pixel compositor and pixel format converter.
//!
//! Pixels live in a [`PixelBuffer`], a copy-on-write raster of one [`PixelFormat`]. Drawing
//! happens in spans: an upstream rasterizer describes the covered pixels of a shape as runs with a
//! coverage value, and [`blend`] composes a color, a [`Gradient`] or a [`Texture`] onto them under
//! one of the [`CompositionMode`]s. Whole buffers change format with a [`Converter`].
//!
//! # Usage
//!
//! Drawing a translucent rectangle into a buffer is as easy as:
//! 1. Allocating the buffer with a format and dimensions
//! 2. Describing what to paint in a [`PaintState`]
//! 3. Filling the rectangle, or any list of spans
//!
//! ```
//! use raster_canvas::{fill_rect, PaintState, PixelBuffer, PixelFormat, Rect, Source};
//!
//! let mut canvas = PixelBuffer::new(32, 32, PixelFormat::Argb32Premultiplied);
//! canvas.fill_color(0xff00_00ff);
//!
//! let red = PaintState::new(Source::Solid(0xffff_0000)).with_opacity(128);
//! fill_rect(&mut canvas, Rect::new(8, 8, 16, 16), &red);
//!
//! assert_eq!(canvas.pixel(0, 0), 0xff00_00ff);
//! assert_eq!(canvas.pixel(8, 8), 0xff80_007f);
//! ```
//!
//! Converting to a different format is also possible:
//!
//! ```
//! use raster_canvas::{ConversionFlags, PixelBuffer, PixelFormat};
//!
//! let mut gray = PixelBuffer::new(16, 16, PixelFormat::Rgb32);
//! gray.fill_color(0xff80_8080);
//!
//! // Error diffusion keeps the average brightness.
//! let mono = gray.convert_to(PixelFormat::Mono, ConversionFlags::DIFFUSE_DITHER);
//! assert_eq!(mono.format(), PixelFormat::Mono);
//! assert_eq!(mono.color_count(), 2);
//! ```
#![deny(unsafe_code)]

mod bits;
/// Porter-Duff operators, blend modes and raster operations.
pub mod compose;
mod convert;
pub mod dither;
mod format;
/// The pixel buffer.
mod frame;
pub mod gradient;
/// Buffer geometry.
mod layout;
mod math;
pub mod pixel;
mod sample;
mod span;
mod transform;

#[cfg(test)]
mod tests;

pub use self::compose::CompositionMode;
pub use self::convert::{ConversionError, ConversionFlags, Converter, DitherMode};
pub use self::format::{PixelFormat, FORMAT_COUNT};
pub use self::frame::{InvertMode, PixelBuffer, DEFAULT_DOTS_PER_METER, INVALID_INDEX, INVALID_PIXEL};
pub use self::gradient::{Gradient, GradientSettings, GradientShape, Spread};
pub use self::layout::{BufferLayout, LayoutError, Rect};
pub use self::pixel::Argb;
pub use self::sample::{Texture, TextureBlendType};
pub use self::span::{blend, blend_color, fill_rect, PaintState, Source, Span, BUFFER_SIZE};
pub use self::transform::{Transform, TransformKind};
