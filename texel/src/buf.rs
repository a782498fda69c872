// Distributed under The MIT License (MIT)
//
// Copyright (c) 2019 The `image-rs` developers
use core::{mem, ops};

use alloc::collections::TryReserveError;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::texel::{constants::MAX, MaxAligned, Texel};
use bytemuck::Pod;

/// Allocates and manages raw bytes.
///
/// Provides a utility to allocate a slice of bytes aligned to the maximally required alignment.
/// Since the elements are much larger than single bytes the inner storage will **not** have exact
/// sizes as one would get from using a `Vec<u8>` as an allocator. Keeping track of the exact,
/// wanted logical length of the requested byte slice is the obligation of the user. All
/// operations work on best effort of making some number of bytes available.
#[derive(Clone, Default)]
pub struct Buffer {
    /// The backing memory.
    inner: Vec<MaxAligned>,
}

/// Allocates and manages atomically shared bytes with copy-on-write semantics.
///
/// Cloning the handle only increments a reference count. Reads go through shared references
/// while the first write through a handle that is not the sole owner copies the storage, see
/// [`SharedBuffer::make_mut`]. The count is atomic, so handles can be sent between threads, and
/// the storage is freed exactly once when the last handle is dropped.
#[derive(Clone)]
pub struct SharedBuffer {
    /// The backing memory, moved in from a [`Buffer`] without copying.
    inner: Arc<Vec<MaxAligned>>,
}

impl Buffer {
    /// Allocate a new `Buffer` with a number of zeroed bytes.
    ///
    /// Panics if allocation fails, see [`Buffer::try_new`] for the fallible version.
    pub fn new(length: usize) -> Self {
        let alloc_len = Self::alloc_len(length);
        let inner = alloc::vec![MaxAligned::ZERO; alloc_len];

        Buffer { inner }
    }

    /// Allocate a new `Buffer`, reporting allocation failure instead of aborting.
    pub fn try_new(length: usize) -> Result<Self, TryReserveError> {
        let alloc_len = Self::alloc_len(length);
        let mut inner = Vec::new();
        inner.try_reserve_exact(alloc_len)?;
        inner.resize(alloc_len, MaxAligned::ZERO);

        Ok(Buffer { inner })
    }

    /// Retrieve the byte capacity of the allocated storage.
    pub fn capacity(&self) -> usize {
        self.inner.capacity() * mem::size_of::<MaxAligned>()
    }

    /// The number of initialized bytes.
    pub fn len(&self) -> usize {
        self.inner.len() * mem::size_of::<MaxAligned>()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        MAX.to_bytes(&self.inner)
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        MAX.to_mut_bytes(&mut self.inner)
    }

    /// View the storage as a slice of texels.
    pub fn as_texels<P: Pod>(&self, texel: Texel<P>) -> &[P] {
        texel.to_slice(&self.inner)
    }

    /// View the storage as a mutable slice of texels.
    pub fn as_mut_texels<P: Pod>(&mut self, texel: Texel<P>) -> &mut [P] {
        texel.to_mut_slice(&mut self.inner)
    }

    /// Ensure to contain a minimum number of bytes.
    ///
    /// Only allocates when the new required size is larger than the previous one. Note that this
    /// does not ensure that the new length is exactly the byte count, it may be longer.
    pub fn grow_to(&mut self, bytes: usize) {
        let new_len = Self::alloc_len(bytes);
        if self.inner.len() < new_len {
            self.inner.resize(new_len, MaxAligned::ZERO);
        }
    }

    /// Reallocate to fit as closely as possible.
    ///
    /// The size after resizing may still be larger than requested.
    pub fn resize_to(&mut self, bytes: usize) {
        let new_len = Self::alloc_len(bytes);
        self.inner.resize(new_len, MaxAligned::ZERO);
        self.inner.shrink_to_fit()
    }

    /// Calculates the number of elements to have a byte buffer of requested length.
    pub(crate) fn alloc_len(length: usize) -> usize {
        const CHUNK_SIZE: usize = mem::size_of::<MaxAligned>();

        // We allocated enough chunks for at least the length. This can never overflow.
        length / CHUNK_SIZE + usize::from(length % CHUNK_SIZE != 0)
    }
}

impl SharedBuffer {
    /// Allocate a new, uniquely owned `SharedBuffer` with a number of zeroed bytes.
    pub fn new(length: usize) -> Self {
        Self::with_buffer(Buffer::new(length))
    }

    /// Allocate a new `SharedBuffer`, reporting allocation failure instead of aborting.
    pub fn try_new(length: usize) -> Result<Self, TryReserveError> {
        Buffer::try_new(length).map(Self::with_buffer)
    }

    /// Share an existing buffer, keeping its allocation.
    pub fn with_buffer(buffer: Buffer) -> Self {
        SharedBuffer {
            inner: Arc::new(buffer.inner),
        }
    }

    /// Query if two buffers share the same memory region.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Check if this handle is the only one referring to the storage.
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.inner) == 1 && Arc::weak_count(&self.inner) == 0
    }

    /// The number of handles sharing the storage.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Retrieve the byte capacity of the allocated storage.
    pub fn capacity(&self) -> usize {
        mem::size_of_val(self.inner.as_slice())
    }

    pub fn as_bytes(&self) -> &[u8] {
        MAX.to_bytes(&self.inner)
    }

    /// View the storage as a slice of texels.
    pub fn as_texels<P: Pod>(&self, texel: Texel<P>) -> &[P] {
        texel.to_slice(&self.inner)
    }

    /// Get the bytes of this buffer if there are no other handles.
    ///
    /// ```
    /// use raster_texel::SharedBuffer;
    ///
    /// let mut buffer = SharedBuffer::new(4);
    /// assert!(buffer.get_mut().is_some());
    /// let alias = buffer.clone();
    /// assert!(buffer.get_mut().is_none());
    /// # drop(alias);
    /// ```
    pub fn get_mut(&mut self) -> Option<&mut [u8]> {
        Arc::get_mut(&mut self.inner).map(|inner| MAX.to_mut_bytes(inner))
    }

    /// Ensure this buffer is its own copy, and return whether a copy had to be made.
    pub fn unshare(&mut self) -> bool {
        if self.is_unique() {
            return false;
        }

        *self = Self::with_buffer(self.to_owned());
        true
    }

    /// Ensure this buffer is its own copy and get its bytes.
    ///
    /// ```
    /// use raster_texel::SharedBuffer;
    ///
    /// let mut buffer = SharedBuffer::new(4);
    /// let alias = buffer.clone();
    ///
    /// buffer.make_mut()[0] = 1;
    /// assert_eq!(alias.as_bytes()[0], 0);
    /// assert!(!buffer.ptr_eq(&alias));
    /// ```
    pub fn make_mut(&mut self) -> &mut [u8] {
        if Arc::get_mut(&mut self.inner).is_none() {
            *self = Self::with_buffer(self.to_owned());
        }

        let inner = Arc::get_mut(&mut self.inner).expect("we just made a mutable copy");
        MAX.to_mut_bytes(inner)
    }

    /// Copy the data into an owned buffer.
    pub fn to_owned(&self) -> Buffer {
        Buffer {
            inner: self.inner.to_vec(),
        }
    }

    /// Create an independent copy of the buffer, with a new length.
    ///
    /// The prefix contents of the new buffer will be the same as the current buffer. The new
    /// buffer will _never_ share memory with the current buffer.
    pub fn to_resized(&self, bytes: usize) -> Self {
        let mut working_copy = self.to_owned();
        working_copy.resize_to(bytes);
        Self::with_buffer(working_copy)
    }
}

impl Default for SharedBuffer {
    fn default() -> Self {
        SharedBuffer {
            inner: Arc::new(Vec::new()),
        }
    }
}

impl From<&'_ [u8]> for Buffer {
    fn from(content: &'_ [u8]) -> Self {
        let mut buffer = Buffer::new(content.len());
        buffer[..content.len()].copy_from_slice(content);
        buffer
    }
}

impl From<Buffer> for SharedBuffer {
    fn from(buffer: Buffer) -> Self {
        SharedBuffer::with_buffer(buffer)
    }
}

impl From<&'_ [u8]> for SharedBuffer {
    fn from(content: &'_ [u8]) -> Self {
        SharedBuffer::with_buffer(Buffer::from(content))
    }
}

impl ops::Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl ops::DerefMut for Buffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_bytes_mut()
    }
}

impl ops::Deref for SharedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Buffer {}

impl PartialEq for SharedBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.as_bytes() == other.as_bytes()
    }
}

impl Eq for SharedBuffer {}

impl core::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Buffer").field("len", &self.len()).finish()
    }
}

impl core::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("len", &self.as_bytes().len())
            .field("handles", &self.handle_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texel::constants::{U16, U32};

    #[test]
    fn single_max_element() {
        let mut buffer = Buffer::new(mem::size_of::<MaxAligned>());
        let slice = buffer.as_mut_texels(U32);
        assert!(slice.len() == mem::size_of::<MaxAligned>() / 4);
        assert_eq!(buffer.as_texels(U16).len(), mem::size_of::<MaxAligned>() / 2);
    }

    #[test]
    fn growing() {
        let mut buffer = Buffer::new(0);
        assert_eq!(buffer.len(), 0);
        buffer.grow_to(3);
        assert!(buffer.len() >= 3);
        let len = buffer.len();
        buffer.grow_to(1);
        assert_eq!(buffer.len(), len);
    }

    #[test]
    fn copy_on_write() {
        let mut first = SharedBuffer::from(&[1u8, 2, 3, 4][..]);
        let second = first.clone();
        assert!(first.ptr_eq(&second));
        assert!(!first.is_unique());

        assert!(first.unshare());
        assert!(!first.ptr_eq(&second));
        assert!(first.is_unique());
        assert!(!first.unshare());

        first.make_mut()[0] = 9;
        assert_eq!(&second.as_bytes()[..4], &[1, 2, 3, 4]);
        assert_eq!(&first.as_bytes()[..4], &[9, 2, 3, 4]);
    }

    #[test]
    fn try_new_reports_failure() {
        assert!(Buffer::try_new(usize::MAX).is_err());
        assert!(SharedBuffer::try_new(64).is_ok());
    }

    #[test]
    fn sharing_keeps_the_allocation() {
        let buffer = Buffer::try_new(256).unwrap();
        let address = buffer.as_bytes().as_ptr();

        let shared = SharedBuffer::with_buffer(buffer);
        assert_eq!(shared.as_bytes().as_ptr(), address);
        assert_eq!(shared.capacity(), 256);

        let fresh = SharedBuffer::try_new(100).unwrap();
        assert!(fresh.is_unique());
        assert!(fresh.as_bytes().len() >= 100);
    }
}
