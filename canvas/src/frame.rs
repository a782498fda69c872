//! The pixel buffer, a shared and copy-on-write raster of one format.
use std::sync::atomic::{AtomicU64, Ordering};

use raster_texel::SharedBuffer;

use crate::convert::{self, ConversionFlags, Converter};
use crate::format::PixelFormat;
use crate::layout::{BufferLayout, LayoutError, Rect};
use crate::pixel::{self, Argb};

/// 72 dots per inch.
pub const DEFAULT_DOTS_PER_METER: u32 = 2835;

/// Returned by [`PixelBuffer::pixel_index`] for coordinates outside the buffer.
pub const INVALID_INDEX: i32 = -12345;

/// Returned by [`PixelBuffer::pixel`] for coordinates outside the buffer.
pub const INVALID_PIXEL: u32 = 12345;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

fn next_serial() -> u64 {
    NEXT_SERIAL.fetch_add(1, Ordering::Relaxed)
}

/// A raster of pixels in one [`PixelFormat`].
///
/// Clones share the storage. Every mutation goes through [`PixelBuffer::detach`] first, which
/// takes a private copy when the storage is shared or borrowed. A buffer that could not be created
/// is *null*: it has no pixels, reads return defaults and writes do nothing.
#[derive(Clone, Debug)]
pub struct PixelBuffer {
    layout: BufferLayout,
    data: SharedBuffer,
    /// Straight ARGB entries for the indexed formats.
    color_table: Vec<Argb>,
    has_alpha_clut: bool,
    dpm_x: u32,
    dpm_y: u32,
    /// Identifies the storage, renewed whenever new storage is allocated.
    serial: u64,
    /// Counts mutable accesses of this handle.
    detach_no: u64,
    /// The storage is foreign and must be copied before a write.
    read_only: bool,
}

/// Which channels [`PixelBuffer::invert_pixels`] flips.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InvertMode {
    #[default]
    InvertRgb,
    InvertRgba,
}

impl PixelBuffer {
    /// Allocate a zeroed buffer, or the null buffer if the layout is invalid.
    ///
    /// See [`PixelBuffer::try_new`] for the reason of a failure.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self::try_new(width, height, format).unwrap_or_else(|err| {
            tracing::debug!(width, height, ?format, %err, "pixel buffer creation failed");
            Self::null()
        })
    }

    /// Allocate a zeroed buffer with the default stride.
    pub fn try_new(width: u32, height: u32, format: PixelFormat) -> Result<Self, LayoutError> {
        let layout = BufferLayout::new(width, height, format)?;
        Self::with_layout(layout)
    }

    /// Allocate a zeroed buffer of an explicit layout.
    pub fn with_layout(layout: BufferLayout) -> Result<Self, LayoutError> {
        let bytes = layout.byte_len();
        let data = SharedBuffer::try_new(bytes).map_err(|_| LayoutError::Allocation { bytes })?;

        Ok(PixelBuffer {
            layout,
            data,
            color_table: Vec::new(),
            has_alpha_clut: false,
            dpm_x: DEFAULT_DOTS_PER_METER,
            dpm_y: DEFAULT_DOTS_PER_METER,
            serial: next_serial(),
            detach_no: 0,
            read_only: false,
        })
    }

    /// Copy external pixel data with the given stride.
    ///
    /// ```
    /// use raster_canvas::{PixelBuffer, PixelFormat};
    ///
    /// let bytes = [0x00, 0x00, 0xff, 0xff];
    /// let image = PixelBuffer::from_bytes(1, 1, 4, PixelFormat::Argb32, &bytes)?;
    /// assert_eq!(image.pixel(0, 0), u32::from_ne_bytes(bytes));
    /// # Ok::<(), raster_canvas::LayoutError>(())
    /// ```
    pub fn from_bytes(
        width: u32,
        height: u32,
        bytes_per_line: usize,
        format: PixelFormat,
        bytes: &[u8],
    ) -> Result<Self, LayoutError> {
        let layout = BufferLayout::with_stride(width, height, format, bytes_per_line)?;
        let needed = layout.byte_len();
        let content = bytes.get(..needed).ok_or(LayoutError::TooShort {
            needed,
            available: bytes.len(),
        })?;

        let mut buffer = Self::with_layout(layout)?;
        buffer.data.make_mut()[..needed].copy_from_slice(content);
        Ok(buffer)
    }

    /// Copy tightly packed rows of native endian words of a 32-bit format.
    ///
    /// ```
    /// use raster_canvas::{PixelBuffer, PixelFormat};
    ///
    /// let image = PixelBuffer::from_words(2, 1, PixelFormat::Rgb32, &[0xffff_0000, 0xff00_ff00])?;
    /// assert_eq!(image.pixel(1, 0), 0xff00_ff00);
    /// # Ok::<(), raster_canvas::LayoutError>(())
    /// ```
    pub fn from_words(
        width: u32,
        height: u32,
        format: PixelFormat,
        words: &[u32],
    ) -> Result<Self, LayoutError> {
        if format.depth() != 32 {
            return Err(LayoutError::InvalidFormat);
        }

        let bytes_per_line = (width as usize)
            .checked_mul(4)
            .ok_or(LayoutError::Overflow)?;
        Self::from_bytes(width, height, bytes_per_line, format, bytemuck::cast_slice(words))
    }

    /// Wrap existing storage without copying it.
    ///
    /// The storage is never written through this buffer; the first mutation copies it.
    pub fn from_shared(layout: BufferLayout, data: SharedBuffer) -> Result<Self, LayoutError> {
        let needed = layout.byte_len();
        if data.as_bytes().len() < needed {
            return Err(LayoutError::TooShort {
                needed,
                available: data.as_bytes().len(),
            });
        }

        Ok(PixelBuffer {
            layout,
            data,
            color_table: Vec::new(),
            has_alpha_clut: false,
            dpm_x: DEFAULT_DOTS_PER_METER,
            dpm_y: DEFAULT_DOTS_PER_METER,
            serial: next_serial(),
            detach_no: 0,
            read_only: true,
        })
    }

    /// The buffer without pixels.
    pub fn null() -> Self {
        PixelBuffer {
            layout: BufferLayout::default(),
            data: SharedBuffer::default(),
            color_table: Vec::new(),
            has_alpha_clut: false,
            dpm_x: DEFAULT_DOTS_PER_METER,
            dpm_y: DEFAULT_DOTS_PER_METER,
            serial: 0,
            detach_no: 0,
            read_only: false,
        }
    }

    pub fn is_null(&self) -> bool {
        self.layout.width == 0
    }

    /// A zeroed buffer of the same size and metadata, in another format.
    ///
    /// The color table is kept only if the new format is indexed.
    pub(crate) fn blank_like(&self, format: PixelFormat) -> Result<Self, LayoutError> {
        let mut buffer = Self::with_layout(self.layout.with_format(format)?)?;
        buffer.set_dots_per_meter(self);
        if format.is_indexed() && self.format().is_indexed() {
            buffer.color_table = self.color_table.clone();
            buffer.has_alpha_clut = self.has_alpha_clut;
        }
        Ok(buffer)
    }

    pub fn layout(&self) -> &BufferLayout {
        &self.layout
    }

    pub fn width(&self) -> u32 {
        self.layout.width
    }

    pub fn height(&self) -> u32 {
        self.layout.height
    }

    pub fn format(&self) -> PixelFormat {
        self.layout.format
    }

    pub fn depth(&self) -> u32 {
        self.layout.format.depth()
    }

    pub fn bytes_per_line(&self) -> usize {
        self.layout.bytes_per_line
    }

    /// The underlying storage handle.
    pub fn storage(&self) -> &SharedBuffer {
        &self.data
    }

    /// Make the storage private to this handle.
    ///
    /// Copies when the storage is shared with another handle or borrowed, a copy gets a new serial
    /// number. Every call counts as a mutable access and advances the detach number.
    pub fn detach(&mut self) {
        if self.is_null() {
            return;
        }

        if self.read_only {
            self.data = self.data.to_resized(self.layout.byte_len());
            self.read_only = false;
            self.serial = next_serial();
        } else if self.data.unshare() {
            self.serial = next_serial();
        }

        self.detach_no += 1;
    }

    /// Whether writes can happen without a copy.
    pub fn is_detached(&self) -> bool {
        !self.read_only && self.data.is_unique()
    }

    /// Whether two buffers share their storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.data.ptr_eq(&other.data)
    }

    /// All pixel bytes, rows of [`Self::bytes_per_line`] each.
    pub fn bytes(&self) -> &[u8] {
        &self.data.as_bytes()[..self.layout.byte_len()]
    }

    /// All pixel bytes, detached for writing.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.detach();
        let len = self.layout.byte_len();
        &mut self.data.make_mut()[..len]
    }

    /// The bytes of one row, empty for rows outside the buffer.
    pub fn scanline(&self, y: u32) -> &[u8] {
        if y >= self.layout.height {
            return &[];
        }

        &self.data.as_bytes()[self.layout.scanline_range(y)]
    }

    /// The bytes of one row, detached for writing.
    pub fn scanline_mut(&mut self, y: u32) -> &mut [u8] {
        if y >= self.layout.height {
            return &mut [];
        }

        let range = self.layout.scanline_range(y);
        &mut self.bytes_mut()[range]
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.bytes().chunks(self.layout.bytes_per_line.max(1))
    }

    /// Rows for writing, after a single detach.
    pub(crate) fn rows_mut(&mut self) -> impl Iterator<Item = &mut [u8]> {
        let stride = self.layout.bytes_per_line.max(1);
        self.bytes_mut().chunks_mut(stride)
    }

    pub fn color_table(&self) -> &[Argb] {
        &self.color_table
    }

    /// Replace the color table.
    pub fn set_color_table(&mut self, table: impl Into<Vec<Argb>>) {
        if self.is_null() {
            return;
        }

        self.detach();
        self.color_table = table.into();
        self.has_alpha_clut = self.color_table.iter().any(|&c| pixel::alpha(c) != 0xff);
    }

    pub fn color_count(&self) -> usize {
        self.color_table.len()
    }

    /// Resize the color table, new entries are transparent black.
    pub fn set_color_count(&mut self, count: usize) {
        if self.is_null() {
            return;
        }

        if !self.format().is_indexed() {
            tracing::warn!(count, format = ?self.format(), "set_color_count: not an indexed format");
            return;
        }

        self.detach();
        self.color_table.resize(count, 0);
        self.has_alpha_clut = self.color_table.iter().any(|&c| pixel::alpha(c) != 0xff);
    }

    /// A color table entry, 0 for indices outside the table.
    pub fn color(&self, index: usize) -> Argb {
        match self.color_table.get(index) {
            Some(&color) => color,
            None => {
                tracing::warn!(index, count = self.color_table.len(), "color: index out of range");
                0
            }
        }
    }

    /// Set a color table entry, growing the table with transparent entries as needed.
    pub fn set_color(&mut self, index: usize, color: Argb) {
        if self.is_null() {
            return;
        }

        let depth = self.depth();
        if !self.format().is_indexed() || index >= 1 << depth {
            tracing::warn!(index, depth, "set_color: index out of range");
            return;
        }

        self.detach();
        if index >= self.color_table.len() {
            self.color_table.resize(index + 1, 0);
        }
        self.color_table[index] = color;
        self.has_alpha_clut = self.color_table.iter().any(|&c| pixel::alpha(c) != 0xff);
    }

    /// The color table index of a pixel of an indexed buffer.
    ///
    /// Returns [`INVALID_INDEX`] for coordinates outside, or a direct-color format.
    pub fn pixel_index(&self, x: i32, y: i32) -> i32 {
        if !self.layout.contains(x, y) {
            tracing::warn!(x, y, "pixel_index: coordinate out of range");
            return INVALID_INDEX;
        }

        let format = self.format();
        if !format.is_indexed() {
            tracing::warn!(?format, "pixel_index: not an indexed format");
            return INVALID_INDEX;
        }

        format.raw_pixel(self.scanline(y as u32), x as usize) as i32
    }

    /// The straight ARGB color of a pixel.
    ///
    /// Returns [`INVALID_PIXEL`] for coordinates outside the buffer.
    pub fn pixel(&self, x: i32, y: i32) -> Argb {
        if !self.layout.contains(x, y) {
            tracing::warn!(x, y, "pixel: coordinate out of range");
            return INVALID_PIXEL;
        }

        let format = self.format();
        let line = self.scanline(y as u32);
        let raw = format.raw_pixel(line, x as usize);
        match format {
            PixelFormat::Mono | PixelFormat::MonoLsb | PixelFormat::Indexed8 => {
                match self.color_table.get(raw as usize) {
                    Some(&color) => color,
                    None => {
                        tracing::warn!(x, y, index = raw, "pixel: color table index out of range");
                        0
                    }
                }
            }
            PixelFormat::Argb32 => raw,
            _ => pixel::unpremultiply(format.fetch_premultiplied(line, x as usize, &[])),
        }
    }

    /// Set a pixel to a table index (indexed formats) or a straight ARGB color.
    pub fn set_pixel(&mut self, x: i32, y: i32, value: u32) {
        if !self.layout.contains(x, y) {
            tracing::warn!(x, y, "set_pixel: coordinate out of range");
            return;
        }

        let format = self.format();
        match format {
            PixelFormat::Mono | PixelFormat::MonoLsb if value > 1 => {
                tracing::warn!(index = value, "set_pixel: invalid index for a one bit format");
                return;
            }
            PixelFormat::Indexed8 if value as usize >= self.color_table.len() => {
                tracing::warn!(index = value, "set_pixel: index beyond the color table");
                return;
            }
            _ => {}
        }

        let line = self.scanline_mut(y as u32);
        let x = x as usize;
        match format {
            PixelFormat::Invalid => {}
            PixelFormat::Mono | PixelFormat::MonoLsb | PixelFormat::Indexed8 => {
                format.set_raw_pixel(line, x, value)
            }
            PixelFormat::Argb32 => format.set_raw_pixel(line, x, value),
            _ => format.store_premultiplied(line, x, pixel::premultiply(value)),
        }
    }

    /// Fill with a raw pixel value.
    ///
    /// One bit formats fill every bit with `value & 1`, `Indexed8` uses the low byte and `Rgb32`
    /// stays opaque.
    pub fn fill(&mut self, value: u32) {
        if self.is_null() {
            return;
        }

        let format = self.format();
        match format.depth() {
            1 => {
                let byte = if value & 1 != 0 { 0xff } else { 0 };
                self.bytes_mut().fill(byte);
            }
            8 => self.bytes_mut().fill(value as u8),
            _ => {
                let value = if format == PixelFormat::Rgb32 {
                    value | 0xff00_0000
                } else {
                    value
                };

                self.fill_rows(|row, width| {
                    for x in 0..width {
                        format.set_raw_pixel(row, x, value);
                    }
                })
            }
        }
    }

    /// Fill with a straight ARGB color, converted to the format.
    ///
    /// Indexed formats use the closest entry of the color table.
    pub fn fill_color(&mut self, color: Argb) {
        if self.is_null() {
            return;
        }

        let format = self.format();
        match format {
            PixelFormat::Mono | PixelFormat::MonoLsb if self.color_table.is_empty() => {
                // Without a table, set bits are black.
                self.fill(u32::from(pixel::gray(color) < 128))
            }
            PixelFormat::Mono | PixelFormat::MonoLsb | PixelFormat::Indexed8 => {
                let index = pixel::closest_index(&self.color_table, color);
                self.fill(index as u32)
            }
            PixelFormat::Rgb32 | PixelFormat::Argb32 => self.fill(color),
            _ => {
                let premultiplied = pixel::premultiply(color);
                self.fill_rows(|row, width| {
                    for x in 0..width {
                        format.store_premultiplied(row, x, premultiplied);
                    }
                })
            }
        }
    }

    /// Write the first row with `first`, then copy it to all other rows.
    fn fill_rows(&mut self, first: impl FnOnce(&mut [u8], usize)) {
        let width = self.layout.width as usize;
        let row_len = self.layout.row_len();
        let stride = self.layout.bytes_per_line;
        let bytes = self.bytes_mut();
        let (head, tail) = bytes.split_at_mut(stride);
        first(head, width);
        for row in tail.chunks_exact_mut(stride) {
            row[..row_len].copy_from_slice(&head[..row_len]);
        }
    }

    /// Invert the colors of all pixels.
    ///
    /// Formats of less than 32 bits flip every bit of the storage, color table indices included.
    /// `Rgb32` never inverts its alpha, premultiplied pixels are inverted in straight form.
    pub fn invert_pixels(&mut self, mode: InvertMode) {
        if self.is_null() {
            return;
        }

        let format = self.format();
        if format.depth() != 32 {
            for byte in self.bytes_mut() {
                *byte ^= 0xff;
            }
            return;
        }

        let xor = match (format, mode) {
            (PixelFormat::Rgb32, _) | (_, InvertMode::InvertRgb) => 0x00ff_ffff,
            (_, InvertMode::InvertRgba) => 0xffff_ffff,
        };

        let width = self.layout.width as usize;
        for row in self.rows_mut() {
            for x in 0..width {
                let value = format.raw_pixel(row, x);
                let inverted = if format == PixelFormat::Argb32Premultiplied {
                    pixel::premultiply(pixel::unpremultiply(value) ^ xor)
                } else {
                    value ^ xor
                };
                format.set_raw_pixel(row, x, inverted);
            }
        }
    }

    /// A copy of a region.
    ///
    /// Parts of the region outside the buffer are zero, transparent or color index 0. An empty
    /// region copies the whole buffer.
    pub fn copy(&self, rect: Rect) -> PixelBuffer {
        if self.is_null() {
            return Self::null();
        }

        let rect = if rect.is_empty() { self.layout.rect() } else { rect };
        let layout = match BufferLayout::new(rect.width, rect.height, self.format()) {
            Ok(layout) => layout,
            Err(err) => {
                tracing::debug!(?rect, %err, "copy: invalid region");
                return Self::null();
            }
        };

        let mut target = match Self::with_layout(layout) {
            Ok(target) => target,
            Err(err) => {
                tracing::debug!(?rect, %err, "copy: allocation failed");
                return Self::null();
            }
        };

        target.color_table = self.color_table.clone();
        target.has_alpha_clut = self.has_alpha_clut;
        target.set_dots_per_meter(self);

        let visible = rect.intersect(&self.layout.rect());
        if visible.is_empty() {
            return target;
        }

        let format = self.format();
        let bpp = format.bytes_per_pixel();
        // Offsets of the visible part within the target.
        let dx = (visible.x - rect.x) as usize;
        let dy = (visible.y - rect.y) as usize;
        let count = visible.width as usize;

        for row in 0..visible.height {
            let src = self.scanline(visible.y as u32 + row);
            let dst = target.scanline_mut(dy as u32 + row);
            let sx = visible.x as usize;
            if bpp > 0 {
                dst[dx * bpp..(dx + count) * bpp]
                    .copy_from_slice(&src[sx * bpp..(sx + count) * bpp]);
            } else {
                for i in 0..count {
                    format.set_raw_pixel(dst, dx + i, format.raw_pixel(src, sx + i));
                }
            }
        }

        target
    }

    /// A copy flipped along either axis.
    pub fn mirrored(&self, horizontal: bool, vertical: bool) -> PixelBuffer {
        if self.is_null() {
            return Self::null();
        }

        let mut target = match self.blank_like(self.format()) {
            Ok(target) => target,
            Err(err) => {
                tracing::debug!(%err, "mirrored: allocation failed");
                return Self::null();
            }
        };
        target.color_table = self.color_table.clone();
        target.has_alpha_clut = self.has_alpha_clut;

        let format = self.format();
        let width = self.layout.width as usize;
        let height = self.layout.height;
        let row_len = self.layout.row_len();
        for (y, dst) in target.rows_mut().enumerate() {
            let sy = if vertical { height - 1 - y as u32 } else { y as u32 };
            let src = self.scanline(sy);
            if horizontal {
                for x in 0..width {
                    format.set_raw_pixel(dst, x, format.raw_pixel(src, width - 1 - x));
                }
            } else {
                dst[..row_len].copy_from_slice(&src[..row_len]);
            }
        }

        target
    }

    /// A copy with the red and blue channel swapped.
    ///
    /// Indexed formats swap the entries of the color table instead.
    pub fn rgb_swapped(&self) -> PixelBuffer {
        if self.is_null() {
            return Self::null();
        }

        let format = self.format();
        let mut target = self.clone();
        if format.is_indexed() {
            let swapped: Vec<_> = self.color_table.iter().map(|&c| pixel::swap_rb(c)).collect();
            target.set_color_table(swapped);
            return target;
        }

        let packed = format.packed();
        let width = self.layout.width as usize;
        for row in target.rows_mut() {
            for x in 0..width {
                let raw = format.raw_pixel(row, x);
                let swapped = match packed {
                    Some(bits) => bits.pack(pixel::swap_rb(bits.unpack(raw))),
                    None => pixel::swap_rb(raw),
                };
                format.set_raw_pixel(row, x, swapped);
            }
        }

        target
    }

    /// Whether pixels can be translucent.
    pub fn has_alpha_channel(&self) -> bool {
        let format = self.format();
        format.has_alpha() || (format.is_indexed() && self.has_alpha_clut)
    }

    /// Whether every color in the buffer is a shade of gray.
    pub fn all_gray(&self) -> bool {
        let format = self.format();
        match format {
            PixelFormat::Invalid => true,
            PixelFormat::Mono | PixelFormat::MonoLsb | PixelFormat::Indexed8 => {
                self.color_table.iter().all(|&c| pixel::is_gray(c))
            }
            _ => {
                let width = self.layout.width as usize;
                self.rows().all(|row| {
                    (0..width).all(|x| pixel::is_gray(format.fetch_premultiplied(row, x, &[])))
                })
            }
        }
    }

    /// Whether the buffer is a gray scale image.
    ///
    /// An `Indexed8` buffer qualifies only when its table is the identity ramp.
    pub fn is_grayscale(&self) -> bool {
        match self.format() {
            PixelFormat::Invalid | PixelFormat::Mono | PixelFormat::MonoLsb => false,
            PixelFormat::Indexed8 => self
                .color_table
                .iter()
                .enumerate()
                .all(|(i, &c)| c == pixel::rgb(i as u32, i as u32, i as u32)),
            _ => self.all_gray(),
        }
    }

    /// A one bit mask of the opaque pixels, dithered by the alpha dither mode of `flags`.
    ///
    /// Null for direct-color formats without alpha.
    pub fn create_alpha_mask(&self, flags: ConversionFlags) -> PixelBuffer {
        convert::alpha_mask(self, flags)
    }

    /// Convert into another format.
    ///
    /// ```
    /// use raster_canvas::{ConversionFlags, PixelBuffer, PixelFormat};
    ///
    /// let mut image = PixelBuffer::new(2, 2, PixelFormat::Argb32);
    /// image.fill(0x80ff_0000);
    /// let opaque = image.convert_to(PixelFormat::Rgb32, ConversionFlags::AUTO_COLOR);
    /// assert_eq!(opaque.pixel(1, 1), 0xffff_0000);
    /// ```
    pub fn convert_to(&self, format: PixelFormat, flags: ConversionFlags) -> PixelBuffer {
        Converter::new().convert(self, format, flags)
    }

    /// Identifies the storage.
    pub fn serial_number(&self) -> u64 {
        self.serial
    }

    /// Counts mutable accesses through this handle.
    pub fn detach_number(&self) -> u64 {
        self.detach_no
    }

    /// Changes whenever the pixels may have changed.
    pub fn cache_key(&self) -> (u64, u64) {
        (self.serial, self.detach_no)
    }

    pub fn dots_per_meter_x(&self) -> u32 {
        self.dpm_x
    }

    pub fn dots_per_meter_y(&self) -> u32 {
        self.dpm_y
    }

    pub fn set_dots_per_meter_x(&mut self, dpm: u32) {
        self.dpm_x = dpm;
    }

    pub fn set_dots_per_meter_y(&mut self, dpm: u32) {
        self.dpm_y = dpm;
    }

    pub(crate) fn set_dots_per_meter(&mut self, from: &PixelBuffer) {
        self.dpm_x = from.dpm_x;
        self.dpm_y = from.dpm_y;
    }
}

impl Default for PixelBuffer {
    fn default() -> Self {
        PixelBuffer::null()
    }
}

/// Buffers are equal when they hold the same colors in the same format.
impl PartialEq for PixelBuffer {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) && self.layout == other.layout && self.color_table == other.color_table
        {
            return true;
        }

        let format = self.format();
        if self.layout.width != other.layout.width
            || self.layout.height != other.layout.height
            || format != other.format()
            || self.color_table != other.color_table
        {
            return false;
        }

        let width = self.layout.width as usize;
        let row_len = self.layout.row_len();
        self.rows().zip(other.rows()).all(|(a, b)| {
            if format.depth() >= 8 {
                a[..row_len] == b[..row_len]
            } else {
                (0..width).all(|x| format.raw_pixel(a, x) == format.raw_pixel(b, x))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_inert() {
        let mut null = PixelBuffer::new(0, 10, PixelFormat::Rgb32);
        assert!(null.is_null());
        assert_eq!(null.format(), PixelFormat::Invalid);
        assert!(null.bytes().is_empty());
        null.fill(7);
        null.set_pixel(0, 0, 1);
        assert_eq!(null.pixel(0, 0), INVALID_PIXEL);
        assert!(null.copy(Rect::new(0, 0, 1, 1)).is_null());
        assert!(PixelBuffer::new(4, 4, PixelFormat::Invalid).is_null());
    }

    #[test]
    fn copy_on_write() {
        let mut image = PixelBuffer::new(3, 3, PixelFormat::Argb32);
        image.fill(0xff00_ff00);
        let snapshot = image.clone();
        assert!(image.ptr_eq(&snapshot));
        assert_eq!(image.cache_key(), snapshot.cache_key());

        image.set_pixel(1, 1, 0xffff_0000);
        assert!(!image.ptr_eq(&snapshot));
        assert_ne!(image.serial_number(), snapshot.serial_number());
        assert_eq!(snapshot.pixel(1, 1), 0xff00_ff00);
        assert_eq!(image.pixel(1, 1), 0xffff_0000);
    }

    #[test]
    fn detach_counts_writes() {
        let mut image = PixelBuffer::new(2, 2, PixelFormat::Rgb32);
        let serial = image.serial_number();
        let before = image.detach_number();
        image.fill(0);
        assert!(image.detach_number() > before);
        // Unique storage keeps its identity.
        assert_eq!(image.serial_number(), serial);
    }

    #[test]
    fn read_only_storage_is_copied() {
        let layout = BufferLayout::new(1, 1, PixelFormat::Argb32).unwrap();
        let data = SharedBuffer::from(&[1u8, 2, 3, 4][..]);
        let mut image = PixelBuffer::from_shared(layout, data.clone()).unwrap();
        assert!(!image.is_detached());
        image.fill(0);
        assert!(image.is_detached());
        assert_eq!(&data.as_bytes()[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn out_of_range_sentinels() {
        let mut image = PixelBuffer::new(2, 2, PixelFormat::Indexed8);
        assert_eq!(image.pixel_index(2, 0), INVALID_INDEX);
        assert_eq!(image.pixel(0, -1), INVALID_PIXEL);
        // No table yet, the lookup falls back.
        assert_eq!(image.pixel(0, 0), 0);
        image.set_color_table(vec![0xff11_2233]);
        assert_eq!(image.pixel(0, 0), 0xff11_2233);
        image.set_pixel(0, 0, 3);
        assert_eq!(image.pixel_index(0, 0), 0);
    }

    #[test]
    fn color_table_grows() {
        let mut image = PixelBuffer::new(1, 1, PixelFormat::Mono);
        image.set_color(1, 0xff00_0000);
        assert_eq!(image.color_table(), &[0, 0xff00_0000]);
        assert!(image.has_alpha_channel());
        image.set_color(2, 0xffff_ffff);
        assert_eq!(image.color_count(), 2);
        image.set_color(0, 0xffff_ffff);
        assert!(!image.has_alpha_channel());
    }

    #[test]
    fn fill_rules() {
        let mut mono = PixelBuffer::new(9, 2, PixelFormat::Mono);
        mono.fill(3);
        assert!(mono.bytes().iter().all(|&b| b == 0xff));

        let mut rgb = PixelBuffer::new(3, 2, PixelFormat::Rgb32);
        rgb.fill(0x0012_3456);
        assert_eq!(rgb.pixel(2, 1), 0xff12_3456);

        let mut rgb16 = PixelBuffer::new(3, 2, PixelFormat::Rgb16);
        rgb16.fill(0xf800);
        assert_eq!(rgb16.pixel(1, 1), 0xffff_0000);

        let mut premul = PixelBuffer::new(2, 2, PixelFormat::Argb32Premultiplied);
        premul.fill_color(0x80ff_ffff);
        assert_eq!(format_raw(&premul, 1, 1), 0x8080_8080);
    }

    fn format_raw(image: &PixelBuffer, x: usize, y: u32) -> u32 {
        image.format().raw_pixel(image.scanline(y), x)
    }

    #[test]
    fn fill_color_indexed_picks_closest() {
        let mut image = PixelBuffer::new(2, 2, PixelFormat::Indexed8);
        image.set_color_table(vec![0xff00_0000, 0xffff_ffff, 0xff00_00ff]);
        image.fill_color(0xff10_10f0);
        assert_eq!(image.pixel_index(1, 1), 2);

        let mut mono = PixelBuffer::new(2, 2, PixelFormat::MonoLsb);
        mono.fill_color(0xff00_0000);
        assert_eq!(mono.pixel_index(0, 0), 1);
    }

    #[test]
    fn invert() {
        let mut image = PixelBuffer::new(1, 1, PixelFormat::Argb32);
        image.fill(0x80ff_0000);
        image.invert_pixels(InvertMode::InvertRgb);
        assert_eq!(image.pixel(0, 0), 0x8000_ffff);
        image.invert_pixels(InvertMode::InvertRgba);
        assert_eq!(image.pixel(0, 0), 0x7fff_0000);

        let mut rgb = PixelBuffer::new(1, 1, PixelFormat::Rgb32);
        rgb.fill(0);
        rgb.invert_pixels(InvertMode::InvertRgba);
        assert_eq!(rgb.pixel(0, 0), 0xffff_ffff);

        let mut premul = PixelBuffer::new(1, 1, PixelFormat::Argb32Premultiplied);
        premul.fill_color(0xffff_0000);
        premul.invert_pixels(InvertMode::InvertRgb);
        assert_eq!(premul.pixel(0, 0), 0xff00_ffff);
    }

    #[test]
    fn copy_outside_is_zero() {
        let mut image = PixelBuffer::new(2, 2, PixelFormat::Argb32);
        image.fill(0xffff_ffff);
        let copy = image.copy(Rect::new(1, 1, 2, 2));
        assert_eq!(copy.width(), 2);
        assert_eq!(copy.pixel(0, 0), 0xffff_ffff);
        assert_eq!(copy.pixel(1, 0), 0);
        assert_eq!(copy.pixel(1, 1), 0);

        let mut mono = PixelBuffer::new(10, 1, PixelFormat::Mono);
        mono.set_color_table(vec![0xffff_ffff, 0xff00_0000]);
        mono.set_pixel(9, 0, 1);
        let tail = mono.copy(Rect::new(8, 0, 4, 1));
        assert_eq!(tail.pixel_index(1, 0), 1);
        assert_eq!(tail.pixel_index(0, 0), 0);
        assert_eq!(tail.pixel_index(2, 0), 0);
    }

    #[test]
    fn mirror_and_swap() {
        let mut image = PixelBuffer::new(2, 2, PixelFormat::Rgb888);
        image.set_pixel(0, 0, 0xffff_0000);
        let flipped = image.mirrored(true, true);
        assert_eq!(flipped.pixel(1, 1), 0xffff_0000);
        assert_eq!(flipped.pixel(0, 0), 0xff00_0000);
        assert_eq!(image.mirrored(false, false), image);

        let swapped = image.rgb_swapped();
        assert_eq!(swapped.pixel(0, 0), 0xff00_00ff);
        assert_eq!(swapped.rgb_swapped(), image);
    }

    #[test]
    fn grayscale() {
        let mut gray = PixelBuffer::new(256, 1, PixelFormat::Indexed8);
        gray.set_color_table((0..256).map(|i| pixel::rgb(i, i, i)).collect::<Vec<_>>());
        assert!(gray.is_grayscale());
        gray.set_color(3, 0xff00_0000);
        assert!(!gray.is_grayscale());
        assert!(gray.all_gray());

        let mut color = PixelBuffer::new(2, 1, PixelFormat::Rgb16);
        color.fill_color(0xffff_ffff);
        assert!(color.is_grayscale());
        color.set_pixel(1, 0, 0xffff_0000);
        assert!(!color.all_gray());
    }

    #[test]
    fn from_bytes_checks_length() {
        assert_eq!(
            PixelBuffer::from_bytes(2, 2, 8, PixelFormat::Rgb32, &[0; 15]).err(),
            Some(LayoutError::TooShort {
                needed: 16,
                available: 15
            })
        );
    }

    #[test]
    fn derived_buffers_keep_resolution() {
        let mut image = PixelBuffer::new(4, 4, PixelFormat::Argb32);
        image.set_dots_per_meter_x(3000);
        image.set_dots_per_meter_y(4000);

        let part = image.copy(Rect::new(1, 1, 2, 2));
        assert_eq!((part.dots_per_meter_x(), part.dots_per_meter_y()), (3000, 4000));

        let blank = image.blank_like(PixelFormat::Rgb16).unwrap();
        assert_eq!((blank.dots_per_meter_x(), blank.dots_per_meter_y()), (3000, 4000));
    }
}
