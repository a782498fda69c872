//! Defines the byte layout of pixel buffers.
use core::ops::Range;

use crate::format::PixelFormat;

/// The byte layout of a buffer.
///
/// An inner invariant is that the layout fits in memory: `bytes_per_line * height` fits into an
/// `i32`, and every scanline holds `width` pixels of the format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BufferLayout {
    /// The number of pixels along our width.
    pub(crate) width: u32,
    /// The number of pixels along our height.
    pub(crate) height: u32,
    pub(crate) format: PixelFormat,
    /// The number of bytes per row, a multiple of four for owned buffers.
    pub(crate) bytes_per_line: usize,
}

/// Reasons for rejecting a layout or its allocation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("the buffer has no pixels")]
    Empty,
    #[error("the format has no pixel representation")]
    InvalidFormat,
    #[error("the buffer size overflows the addressable range")]
    Overflow,
    #[error("a stride of {stride} bytes can not hold a row of {minimum} bytes")]
    BadStride { stride: usize, minimum: usize },
    #[error("a stride of {stride} bytes does not keep rows aligned to {align} bytes")]
    UnalignedStride { stride: usize, align: usize },
    #[error("allocation of {bytes} bytes failed")]
    Allocation { bytes: usize },
    #[error("{available} bytes given where {needed} are required")]
    TooShort { needed: usize, available: usize },
}

impl BufferLayout {
    /// A layout with the default stride, rows padded to 32 bits.
    ///
    /// ```
    /// use raster_canvas::{BufferLayout, PixelFormat};
    ///
    /// let layout = BufferLayout::new(3, 2, PixelFormat::Rgb888)?;
    /// assert_eq!(layout.bytes_per_line(), 12);
    /// assert_eq!(layout.byte_len(), 24);
    /// # Ok::<(), raster_canvas::LayoutError>(())
    /// ```
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self, LayoutError> {
        let bytes_per_line = Self::default_stride(width, format.depth());
        Self::with_stride(width, height, format, bytes_per_line)
    }

    /// A layout with a caller chosen stride.
    ///
    /// The stride must hold a full row. It need not be padded, but rows of 32-bit formats must
    /// stay aligned to four bytes.
    pub fn with_stride(
        width: u32,
        height: u32,
        format: PixelFormat,
        bytes_per_line: usize,
    ) -> Result<Self, LayoutError> {
        let depth = format.depth();
        if width == 0 || height == 0 {
            return Err(LayoutError::Empty);
        }

        if depth == 0 {
            return Err(LayoutError::InvalidFormat);
        }

        if i32::MAX as u32 / depth < width {
            return Err(LayoutError::Overflow);
        }

        let minimum = (width as usize * depth as usize).div_ceil(8);
        if bytes_per_line == 0 || bytes_per_line < minimum {
            return Err(LayoutError::BadStride {
                stride: bytes_per_line,
                minimum,
            });
        }

        // Rows of 32-bit formats are read as words.
        let align = if depth == 32 { 4 } else { 1 };
        if bytes_per_line % align != 0 {
            return Err(LayoutError::UnalignedStride {
                stride: bytes_per_line,
                align,
            });
        }

        if i32::MAX as usize / bytes_per_line < height as usize {
            return Err(LayoutError::Overflow);
        }

        Ok(BufferLayout {
            width,
            height,
            format,
            bytes_per_line,
        })
    }

    /// The padded stride, `((width * depth + 31) >> 5) << 2`.
    pub(crate) fn default_stride(width: u32, depth: u32) -> usize {
        let bits = u64::from(width) * u64::from(depth);
        usize::try_from(((bits + 31) >> 5) << 2).unwrap_or(usize::MAX)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    /// The number of bytes covered by all rows.
    pub fn byte_len(&self) -> usize {
        self.bytes_per_line * self.height as usize
    }

    /// Bytes of one row that carry pixel data.
    pub(crate) fn row_len(&self) -> usize {
        (self.width as usize * self.format.depth() as usize).div_ceil(8)
    }

    pub(crate) fn scanline_range(&self, y: u32) -> Range<usize> {
        let start = self.bytes_per_line * y as usize;
        start..start + self.bytes_per_line
    }

    /// Check if a pixel coordinate is within the buffer.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    /// The same layout for another format, with a default stride.
    pub(crate) fn with_format(&self, format: PixelFormat) -> Result<Self, LayoutError> {
        Self::new(self.width, self.height, format)
    }
}

/// An integer rectangle in pixel coordinates, `width` and `height` exclusive of the far edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// One past the rightmost column.
    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    /// One past the bottom row.
    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    /// The common area, empty when the rectangles are disjoint.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= i64::from(x) || bottom <= i64::from(y) {
            return Rect::new(x, y, 0, 0);
        }

        Rect::new(
            x,
            y,
            (right - i64::from(x)) as u32,
            (bottom - i64::from(y)) as u32,
        )
    }
}

impl BufferLayout {
    /// The rectangle covering all pixels.
    pub fn rect(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}
