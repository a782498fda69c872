//! Bit layouts of the packed direct-color formats.
//!
//! Each packed pixel is read as a little endian word of two or three bytes. The channels are
//! ranges of bits within that word, described by [`FromBits`].
use crate::pixel;

/// Specifies which bits a channel comes from, within a packed word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FromBits {
    pub(crate) begin: u8,
    pub(crate) len: u8,
}

/// The channel layout of one packed format, channels in `[a, r, g, b]` order.
///
/// A channel of length zero is absent. An absent alpha reads as opaque.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackedBits {
    pub(crate) bytes: u8,
    pub(crate) channels: [FromBits; 4],
}

macro_rules! packed {
    ($bytes:literal; a: $a:expr, r: $r:expr, g: $g:expr, b: $b:expr) => {
        PackedBits {
            bytes: $bytes,
            channels: [
                FromBits::from_range($a),
                FromBits::from_range($r),
                FromBits::from_range($g),
                FromBits::from_range($b),
            ],
        }
    };
}

impl FromBits {
    const fn from_range(range: core::ops::Range<u8>) -> Self {
        FromBits {
            begin: range.start,
            len: range.end - range.start,
        }
    }

    pub(crate) const fn mask(self) -> u32 {
        ((1u64 << self.len) - 1) as u32
    }

    /// Extract the channel and widen it to eight bits.
    ///
    /// The high bits are replicated into the vacated low bits so that the extreme values map to
    /// `0x00` and `0xff` exactly.
    #[inline]
    pub(crate) fn extract(self, word: u32) -> u32 {
        let value = (word >> self.begin) & self.mask();
        expand(value, self.len)
    }

    /// Narrow an eight bit value by truncation and place it into the word.
    #[inline]
    pub(crate) fn insert(self, value: u32) -> u32 {
        ((value & 0xff) >> (8 - self.len)) << self.begin
    }
}

/// Widen a `bits` wide value to eight bits by bit replication.
#[inline]
pub(crate) fn expand(value: u32, bits: u8) -> u32 {
    match bits {
        0 => 0,
        8.. => value & 0xff,
        _ => {
            let mut out = value << (8 - bits);
            let mut filled = bits;
            while filled < 8 {
                out |= out >> filled;
                filled *= 2;
            }
            out & 0xff
        }
    }
}

impl PackedBits {
    pub(crate) const RGB16: Self = packed!(2; a: 0..0, r: 11..16, g: 5..11, b: 0..5);
    pub(crate) const RGB555: Self = packed!(2; a: 0..0, r: 10..15, g: 5..10, b: 0..5);
    pub(crate) const RGB444: Self = packed!(2; a: 0..0, r: 8..12, g: 4..8, b: 0..4);
    pub(crate) const ARGB4444: Self = packed!(2; a: 12..16, r: 8..12, g: 4..8, b: 0..4);
    pub(crate) const ARGB8565: Self = packed!(3; a: 0..8, r: 19..24, g: 13..19, b: 8..13);
    pub(crate) const ARGB8555: Self = packed!(3; a: 0..8, r: 18..23, g: 13..18, b: 8..13);
    pub(crate) const RGB666: Self = packed!(3; a: 0..0, r: 12..18, g: 6..12, b: 0..6);
    pub(crate) const ARGB6666: Self = packed!(3; a: 18..24, r: 12..18, g: 6..12, b: 0..6);
    pub(crate) const RGB888: Self = packed!(3; a: 0..0, r: 0..8, g: 8..16, b: 16..24);

    pub(crate) fn has_alpha(self) -> bool {
        self.channels[0].len > 0
    }

    /// Read the little endian word of the pixel at index `x`.
    ///
    /// Returns 0 for pixels past the end of the scanline.
    #[inline]
    pub(crate) fn read_word(self, scanline: &[u8], x: usize) -> u32 {
        let size = usize::from(self.bytes);
        let at = x * size;
        match scanline.get(at..at + size) {
            Some(&[b0, b1]) => u32::from(b0) | u32::from(b1) << 8,
            Some(&[b0, b1, b2]) => u32::from(b0) | u32::from(b1) << 8 | u32::from(b2) << 16,
            _ => 0,
        }
    }

    /// Write the little endian word of the pixel at index `x`.
    ///
    /// Writes past the end of the scanline are ignored.
    #[inline]
    pub(crate) fn write_word(self, scanline: &mut [u8], x: usize, word: u32) {
        let size = usize::from(self.bytes);
        let at = x * size;
        if let Some(target) = scanline.get_mut(at..at + size) {
            target.copy_from_slice(&word.to_le_bytes()[..size]);
        }
    }

    /// Unpack a word into a 32-bit ARGB value, without touching premultiplication.
    #[inline]
    pub(crate) fn unpack(self, word: u32) -> u32 {
        let [a, r, g, b] = self.channels;
        let alpha = if self.has_alpha() { a.extract(word) } else { 0xff };
        pixel::rgba(r.extract(word), g.extract(word), b.extract(word), alpha)
    }

    /// Pack a 32-bit ARGB value into a word, dropping the alpha when there is no alpha channel.
    #[inline]
    pub(crate) fn pack(self, argb: u32) -> u32 {
        let [a, r, g, b] = self.channels;
        let mut word = r.insert(pixel::red(argb))
            | g.insert(pixel::green(argb))
            | b.insert(pixel::blue(argb));
        if self.has_alpha() {
            word |= a.insert(pixel::alpha(argb));
        }
        word
    }
}
