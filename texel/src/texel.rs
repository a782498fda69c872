// Distributed under The MIT License (MIT)
//
// Copyright (c) 2019, 2020 The `image-rs` developers
#![allow(unsafe_code)]

use core::cmp::{Eq, PartialEq};
use core::marker::PhantomData;
use core::{fmt, hash, mem};

use bytemuck::Pod;

/// Marker struct to denote a texel type.
///
/// Can be constructed only for plain-old-data types whose alignment does not exceed the one of
/// [`MaxAligned`]. It is zero-sized, `Copy` regardless of `P`, and serves as the witness passed to
/// every byte reinterpretation of pixel storage. All casts are delegated to `bytemuck` so that the
/// witness itself never needs to touch raw pointers.
pub struct Texel<P>(PhantomData<P>);

/// Describes a type which can represent a `Texel` and for which this is statically known.
pub trait AsTexel: Sized {
    /// Get the texel struct for this type.
    fn texel() -> Texel<Self>;
}

/// A byte-like-type that is aligned to the required max alignment.
///
/// Pixel scanlines are four byte aligned by construction, any buffer of this type can be viewed
/// as `u16`, `u32` or byte texels without a copy.
#[derive(Clone, Copy)]
#[repr(C, align(16))]
pub struct MaxAligned(pub(crate) [u8; MAX_ALIGN]);

pub(crate) const MAX_ALIGN: usize = 16;

// SAFETY: a byte array with an alignment equal to its size has no padding and no invalid values.
unsafe impl bytemuck::Zeroable for MaxAligned {}
unsafe impl bytemuck::Pod for MaxAligned {}

impl MaxAligned {
    pub(crate) const ZERO: Self = MaxAligned([0; MAX_ALIGN]);
}

pub(crate) mod constants {
    use super::{AsTexel, MaxAligned, Texel};

    macro_rules! constant_texel {
        ($(($name:ident, $type:ty)),*) => {
            $(pub const $name: Texel<$type> = Texel(core::marker::PhantomData);
              impl AsTexel for $type {
                  fn texel() -> Texel<Self> {
                      const _: () = {
                          assert!(Texel::<$type>::check_invariants());
                      };

                      $name
                  }
              }
              )*
        }
    }

    constant_texel!(
        (U8, u8),
        (U16, u16),
        (U32, u32),
        (I32, i32),
        (RGB8, [u8; 3]),
        (RGBA8, [u8; 4]),
        (MAX, MaxAligned)
    );
}

impl<P: Pod> Texel<P> {
    /// Try to construct an instance of the marker.
    ///
    /// This requires the type to have an alignment of *at most* `MAX_ALIGN` and to not be a ZST.
    pub const fn for_type() -> Option<Self> {
        if Self::check_invariants() {
            Some(Texel(PhantomData))
        } else {
            None
        }
    }

    const fn check_invariants() -> bool {
        mem::align_of::<P>() <= MAX_ALIGN && mem::size_of::<P>() > 0
    }

    /// Get the alignment of this texel.
    pub const fn align(self) -> usize {
        mem::align_of::<P>()
    }

    /// Get the size of this texel in bytes.
    pub const fn size(self) -> usize {
        mem::size_of::<P>()
    }

    /// Reinterpret a slice of aligned chunks as a slice of the texel.
    ///
    /// The size (in bytes) of the slice is shortened if the size of `P` is not a divisor of the
    /// input slice's size.
    pub fn to_slice(self, buffer: &[MaxAligned]) -> &[P] {
        let bytes: &[u8] = bytemuck::cast_slice(buffer);
        let len = bytes.len() / self.size();
        bytemuck::cast_slice(&bytes[..len * self.size()])
    }

    /// Reinterpret a mutable slice of aligned chunks as a mutable slice of the texel.
    pub fn to_mut_slice(self, buffer: &mut [MaxAligned]) -> &mut [P] {
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(buffer);
        let len = bytes.len() / self.size();
        bytemuck::cast_slice_mut(&mut bytes[..len * self.size()])
    }

    /// Try to reinterpret a slice of bytes as a slice of the texel.
    ///
    /// This returns `Some` if the buffer is suitably aligned, and `None` otherwise. Trailing bytes
    /// that do not form a full texel are ignored.
    pub fn try_to_slice(self, bytes: &[u8]) -> Option<&[P]> {
        let len = bytes.len() / self.size();
        bytemuck::try_cast_slice(&bytes[..len * self.size()]).ok()
    }

    /// Try to reinterpret a mutable slice of bytes as a mutable slice of the texel.
    pub fn try_to_slice_mut(self, bytes: &mut [u8]) -> Option<&mut [P]> {
        let len = bytes.len() / self.size();
        bytemuck::try_cast_slice_mut(&mut bytes[..len * self.size()]).ok()
    }

    /// Reinterpret a slice of texel as memory.
    pub fn to_bytes(self, texel: &[P]) -> &[u8] {
        bytemuck::cast_slice(texel)
    }

    /// Reinterpret a mutable slice of texel as memory.
    pub fn to_mut_bytes(self, texel: &mut [P]) -> &mut [u8] {
        bytemuck::cast_slice_mut(texel)
    }

    /// Read one texel from an arbitrarily aligned byte position.
    ///
    /// Returns `None` if the bytes are too short.
    pub fn read_unaligned(self, bytes: &[u8]) -> Option<P> {
        let bytes = bytes.get(..self.size())?;
        Some(bytemuck::pod_read_unaligned(bytes))
    }

    /// Write one texel to an arbitrarily aligned byte position.
    ///
    /// Returns `false` without writing if the bytes are too short.
    pub fn write_unaligned(self, bytes: &mut [u8], value: P) -> bool {
        match bytes.get_mut(..self.size()) {
            Some(target) => {
                target.copy_from_slice(bytemuck::bytes_of(&value));
                true
            }
            None => false,
        }
    }
}

impl<P> Clone for Texel<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for Texel<P> {}

impl<P> PartialEq for Texel<P> {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl<P> Eq for Texel<P> {}

impl<P> fmt::Debug for Texel<P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Texel")
            .field("size", &mem::size_of::<P>())
            .field("align", &mem::align_of::<P>())
            .finish()
    }
}

impl<P> hash::Hash for Texel<P> {
    fn hash<H: hash::Hasher>(&self, _: &mut H) {}
}

#[cfg(test)]
mod tests {
    use super::constants::*;
    use super::*;

    #[test]
    fn constants_match_types() {
        assert_eq!(U8.size(), 1);
        assert_eq!(U16.size(), 2);
        assert_eq!(RGB8.size(), 3);
        assert_eq!(MAX.size(), MAX_ALIGN);
        assert_eq!(MAX.align(), MAX_ALIGN);
    }

    #[test]
    fn unaligned_access() {
        let mut bytes = [0u8; 7];
        assert!(U32.write_unaligned(&mut bytes[1..], 0x0403_0201));
        assert_eq!(bytes, [0, 1, 2, 3, 4, 0, 0]);
        assert_eq!(U32.read_unaligned(&bytes[1..]), Some(0x0403_0201));
        assert_eq!(U32.read_unaligned(&bytes[5..]), None);
        assert!(!U16.write_unaligned(&mut bytes[6..], 1));
    }
}
