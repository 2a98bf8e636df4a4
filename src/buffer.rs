//! Variable-size byte buffer: a length prefix followed by exactly that
//! many bytes, allocated as one object.
//!
//! Grounded on `original_source/src/pmem/PersistentBuffer.h`: the data
//! type's `Constructor::size()` returns `sizeof(length) + length`, so the
//! allocator reserves exactly the bytes the buffer needs and nothing is
//! ever resized in place — growing a buffer always means building a new
//! one and replacing the handle (see `PersistentBuffer::replace`).

use crate::ctor::AtomicConstructor;
use crate::error::Result;
use crate::handle::{Handle, PersistentType};
use crate::pool::{fnv1a, PersistentPool};

/// The allocated object: an 8-byte length followed by `length` bytes,
/// placed directly after it in the same allocation (a flexible-array-
/// member layout, the same trick `original_source`'s `elements_[1]` uses).
#[repr(C)]
pub struct BufferBase {
    length: u64,
    bytes: [u8; 0],
}

impl BufferBase {
    pub fn len(&self) -> usize {
        self.length as usize
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.bytes.as_ptr(), self.length as usize) }
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.bytes.as_mut_ptr(), self.length as usize) }
    }
}

impl PersistentType for BufferBase {
    const TYPE_ID: u64 = fnv1a(b"pmtree::buffer::BufferBase");
}

struct BufferCtor<'a> {
    data: &'a [u8],
}

impl<'a> AtomicConstructor<BufferBase> for BufferCtor<'a> {
    fn size(&self) -> usize {
        std::mem::size_of::<u64>() + self.data.len()
    }

    fn build(&self, object: &mut BufferBase) -> Result<()> {
        object.length = self.data.len() as u64;
        object.as_bytes_mut().copy_from_slice(self.data);
        Ok(())
    }
}

/// A handle to a `BufferBase`, with the allocate/replace/free dance
/// exposed directly on the owning handle, matching
/// `original_source`'s `PersistentBuffer : public PersistentPtr<...>`.
#[repr(transparent)]
pub struct PersistentBuffer {
    inner: Handle<BufferBase>,
}

impl PersistentBuffer {
    pub const fn null() -> Self {
        Self { inner: Handle::null() }
    }

    pub fn is_null(&self) -> bool {
        self.inner.is_null()
    }

    pub fn allocate(&mut self, pool: &PersistentPool, data: &[u8]) -> Result<()> {
        self.inner.allocate(pool, &BufferCtor { data })
    }

    /// Like [`Self::allocate`], resolving the owning pool from this
    /// buffer's own storage address. Used when building a buffer nested
    /// inside another object's constructor, where no explicit pool
    /// reference is threaded through (see `tree/node.rs`).
    pub fn allocate_in_place(&mut self, data: &[u8]) -> Result<()> {
        self.inner.allocate_in_place(&BufferCtor { data })
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.inner.get()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.inner.get()?.is_empty())
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        Ok(self.inner.get()?.as_bytes())
    }

    /// Build a new buffer with `data`, publish it atomically, then free
    /// the old one (see `Handle::replace`).
    pub fn replace(&mut self, data: &[u8]) -> Result<()> {
        self.inner.replace(&BufferCtor { data })
    }

    pub fn free(&mut self) -> Result<()> {
        self.inner.free()
    }
}

impl Default for PersistentBuffer {
    fn default() -> Self {
        Self::null()
    }
}
