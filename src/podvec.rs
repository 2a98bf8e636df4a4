//! Growable inline array of trivially-copyable values, allocated as one
//! object (capacity and element count travel together).
//!
//! Grounded on `original_source/src/pmem/PersistentPODVector.h`:
//! `push_back` stores the value and persists it, then increments and
//! persists `nelem_` — "the last thing that is done is to update the
//! nelem_ count. Up to that point, it is considered not to have happened
//! yet. That's ok." A full vector resizes by doubling and atomically
//! replacing its handle (`Constructor(source, max_size)` copies
//! `source.nelem_` elements into the larger allocation); a push into a full
//! vector's raw data type, bypassing the owning `PODVector::push_back`'s
//! auto-grow, is the `OutOfRange` edge case spec.md calls out.

use crate::ctor::AtomicConstructor;
use crate::error::{Error, Result};
use crate::handle::{type_id_of, Handle, PersistentType};
use crate::pool::PersistentPool;

/// The allocated object: an element count, an allocated capacity, and
/// `allocated_size` slots of `T` immediately following in the same
/// allocation.
#[repr(C)]
pub struct PODVectorData<T: Copy> {
    nelem: u64,
    allocated_size: u64,
    elements: [T; 0],
}

impl<T: Copy + 'static> PersistentType for PODVectorData<T> {
    const TYPE_ID: u64 = type_id_of::<PODVectorData<T>>();
}

impl<T: Copy> PODVectorData<T> {
    pub fn size(&self) -> usize {
        debug_assert!(self.nelem <= self.allocated_size);
        self.nelem as usize
    }

    pub fn allocated_size(&self) -> usize {
        self.allocated_size as usize
    }

    pub fn full(&self) -> bool {
        self.nelem == self.allocated_size
    }

    pub fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.elements.as_ptr(), self.nelem as usize) }
    }

    pub fn get(&self, i: usize) -> Result<T> {
        if i >= self.nelem as usize {
            return Err(Error::OutOfRange(format!("index {} is past length {}", i, self.nelem)));
        }
        Ok(self.as_slice()[i])
    }

    /// Append `value` without growing. Mirrors the raw data type's own
    /// `push_back`: errors with [`Error::OutOfRange`] rather than growing,
    /// because growing means replacing the whole allocation, which only
    /// the owning [`PODVector`] (which has a handle to replace) can do.
    fn push_back_raw(&mut self, pool: &PersistentPool, value: T) -> Result<()> {
        debug_assert!(self.nelem <= self.allocated_size);
        if self.nelem == self.allocated_size {
            return Err(Error::OutOfRange("POD vector is full".into()));
        }
        unsafe {
            let slot = self.elements.as_mut_ptr().add(self.nelem as usize);
            slot.write(value);
            pool.persist_value(&*slot);
        }
        self.nelem += 1;
        pool.persist_value(&self.nelem);
        Ok(())
    }
}

struct PODVectorCtor<'a, T: Copy> {
    max_size: usize,
    source: Option<&'a PODVectorData<T>>,
}

impl<'a, T: Copy + 'static> AtomicConstructor<PODVectorData<T>> for PODVectorCtor<'a, T> {
    fn size(&self) -> usize {
        std::mem::size_of::<u64>() * 2 + self.max_size * std::mem::size_of::<T>()
    }

    fn build(&self, object: &mut PODVectorData<T>) -> Result<()> {
        object.allocated_size = self.max_size as u64;
        match self.source {
            Some(source) => {
                let n = source.size();
                object.nelem = n as u64;
                unsafe {
                    std::ptr::copy_nonoverlapping(source.elements.as_ptr(), object.elements.as_mut_ptr(), n);
                }
            }
            None => object.nelem = 0,
        }
        Ok(())
    }
}

/// A handle to [`PODVectorData`], presenting a growable-vector API: the
/// null state is an empty vector with no allocation, exactly as in
/// `original_source`.
#[repr(transparent)]
pub struct PODVector<T: Copy + 'static> {
    inner: Handle<PODVectorData<T>>,
}

impl<T: Copy + 'static> PODVector<T> {
    pub const fn null() -> Self {
        Self { inner: Handle::null() }
    }

    pub fn size(&self) -> usize {
        if self.inner.is_null() {
            0
        } else {
            self.inner.get().map(|d| d.size()).unwrap_or(0)
        }
    }

    pub fn allocated_size(&self) -> usize {
        if self.inner.is_null() {
            0
        } else {
            self.inner.get().map(|d| d.allocated_size()).unwrap_or(0)
        }
    }

    pub fn get(&self, i: usize) -> Result<T> {
        if self.inner.is_null() {
            return Err(Error::OutOfRange(format!("index {} on an empty vector", i)));
        }
        self.inner.get()?.get(i)
    }

    /// Append `value`, growing the allocation (doubling) when full, or
    /// allocating a single-element vector the first time.
    pub fn push_back(&mut self, value: T) -> Result<()> {
        if self.inner.is_null() {
            self.inner.allocate_in_place(&PODVectorCtor::<T> { max_size: 1, source: None })?;
        } else if self.inner.get()?.full() {
            let sz = self.size();
            crate::log!("podvec", "resizing from {} to {} elements", sz, sz * 2);
            self.resize(sz * 2)?;
        }
        let pool = self.inner.pool()?;
        let data = self.inner.get_mut()?;
        data.push_back_raw(&pool, value)
    }

    /// Atomically replace the allocation with one of `new_size` capacity,
    /// copying existing elements across. `new_size` must exceed the
    /// current element count (an in-place grow-in-place is the only
    /// resize this crate performs; shrinking below the live element count
    /// would drop data silently, so it is rejected).
    pub fn resize(&mut self, new_size: usize) -> Result<()> {
        if self.inner.is_null() {
            return self.inner.allocate_in_place(&PODVectorCtor::<T> { max_size: new_size, source: None });
        }
        let source_ptr = self.inner.get()? as *const PODVectorData<T>;
        let source = unsafe { &*source_ptr };
        if new_size <= source.size() {
            return Err(Error::UserError(format!(
                "resize target {} must exceed current length {}",
                new_size,
                source.size()
            )));
        }
        self.inner.replace(&PODVectorCtor { max_size: new_size, source: Some(source) })
    }

    pub fn free(&mut self) -> Result<()> {
        self.inner.free()
    }
}

impl<T: Copy + 'static> Default for PODVector<T> {
    fn default() -> Self {
        Self::null()
    }
}
