// Distributed under The MIT License (MIT)
//
// Copyright (c) 2019, 2020 The `image-rs` developers
//! # Texel storage
//!
//! Byte storage for pixel rasters, reinterpretable as texels without copies.
//!
//! This library is strictly `no_std`. It offers two allocations:
//!
//! - [`Buffer`], an exclusively owned allocation aligned for every texel type.
//! - [`SharedBuffer`], a reference counted allocation with copy-on-write semantics. Clones are
//!   cheap, reads never copy, and the first write through a handle that is not the sole owner
//!   detaches it into a private copy.
//!
//! Conversion between bytes and typed texels goes through a [`Texel`] witness, a zero-sized
//! certificate that the type is plain old data.
//!
//! ## Usage
//!
//! ```
//! use raster_texel::{texels::U32, SharedBuffer};
//!
//! let mut image = SharedBuffer::new(16);
//! let snapshot = image.clone();
//!
//! // Writing detaches from the snapshot.
//! U32.try_to_slice_mut(image.make_mut()).unwrap()[0] = 0xff00_00ff;
//!
//! assert_eq!(snapshot.as_texels(U32)[0], 0);
//! assert_eq!(image.as_texels(U32)[0], 0xff00_00ff);
//! ```
// Be std for doctests, avoids a weird warning about missing allocator.
#![cfg_attr(not(doctest), no_std)]
// The only module allowed to be `unsafe` is `texel`, for the `Pod` impl of the aligned chunk.
#![deny(unsafe_code)]
extern crate alloc;

mod buf;
mod texel;

pub use self::buf::{Buffer, SharedBuffer};
pub use self::texel::{AsTexel, Texel};

/// Constants for predefined texel types.
///
/// Holding an instance of `Texel<T>` certifies that the type `T` is compatible with the texel
/// concept, that is: its alignment requirement is *small* enough, its size is non-zero, and it
/// is a plain old data type as certified by `bytemuck::Pod`.
///
/// # Extending
///
/// ```rust
/// use bytemuck::{Pod, Zeroable};
/// use raster_texel::{AsTexel, Texel};
///
/// #[derive(Clone, Copy, Pod, Zeroable)]
/// #[repr(C)]
/// struct Rgb565(pub u16);
///
/// impl AsTexel for Rgb565 {
///     fn texel() -> Texel<Rgb565> {
///         Texel::for_type().expect("verified by bytemuck")
///     }
/// }
/// ```
pub mod texels {
    pub use crate::texel::constants::*;
    pub use crate::texel::MaxAligned;
}
