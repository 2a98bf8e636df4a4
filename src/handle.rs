//! Position-independent typed references into a pool.
//!
//! Grounded on `original_source/src/pmem/PersistentPtr.h`: a handle is a
//! `(pool identity, offset)` pair, never a raw address, so it stays valid
//! across remaps of the same file at a different base address. `valid()`
//! checks a type tag recorded at allocation time rather than trusting the
//! caller's `T`, matching the original's `ASSERT(type_ == T::type_id())`
//! pattern.

use crate::ctor::AtomicConstructor;
use crate::error::{Error, Result};
use crate::pool::PersistentPool;
use crate::registry;
use std::fmt;
use std::marker::PhantomData;

/// Implemented by every type that can be allocated inside a pool. `TYPE_ID`
/// is recorded alongside the object at allocation time and checked by
/// every subsequent `Handle::get`/`valid`, so that a handle read back after
/// a schema change (or simply misused as the wrong type) fails loudly
/// instead of reinterpreting arbitrary bytes.
pub trait PersistentType: Sized {
    const TYPE_ID: u64;
}

/// Derive a type id from `T`'s mangled type name. Used by generic
/// containers (`PODVectorData<T>`, `VectorData<T>`) that cannot hand-write
/// a `TYPE_ID` literal per instantiation; non-generic types use a literal
/// string instead (see `buffer.rs`, `string.rs`) so their id does not shift
/// if the type is ever renamed or moved between modules.
pub(crate) const fn type_id_of<T: ?Sized>() -> u64 {
    crate::pool::fnv1a(std::any::type_name::<T>().as_bytes())
}

/// A typed, position-independent reference to an object inside a pool.
///
/// `Handle<T>` is a plain value: two `u64`s and no borrow, so it is `Copy`
/// and can be embedded directly as a field of another persistent object
/// (that is in fact the only place one should live — see the module docs
/// on persisting a handle's own storage after `allocate`/`replace`/`free`).
#[repr(C)]
pub struct Handle<T> {
    pool_uuid: u64,
    offset: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.pool_uuid == other.pool_uuid && self.offset == other.offset
    }
}
impl<T> Eq for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Handle(null)")
        } else {
            write!(f, "Handle(pool={:#x}, offset={:#x})", self.pool_uuid, self.offset)
        }
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> Handle<T> {
    /// The null handle. Every container's "empty" state is represented by
    /// a null handle rather than a sentinel offset.
    pub const fn null() -> Self {
        Self { pool_uuid: 0, offset: 0, _marker: PhantomData }
    }

    pub(crate) const fn from_raw(pool_uuid: u64, offset: u64) -> Self {
        Self { pool_uuid, offset, _marker: PhantomData }
    }

    pub fn is_null(&self) -> bool {
        self.offset == 0
    }

    fn resolve_pool(&self) -> Result<std::sync::Arc<PersistentPool>> {
        if self.offset == 0 {
            return Err(Error::SeriousBug("operation attempted on a null handle".into()));
        }
        registry::pool_by_uuid(self.pool_uuid)
            .ok_or_else(|| Error::SeriousBug(format!("pool {:#x} is not open", self.pool_uuid)))
    }
}

impl<T: PersistentType> Handle<T> {
    /// `true` if this handle is non-null, its pool is open, and the object
    /// at its offset was allocated with `T`'s type id.
    pub fn valid(&self) -> bool {
        if self.offset == 0 {
            return false;
        }
        match registry::pool_by_uuid(self.pool_uuid) {
            Some(pool) => pool.type_id_at(self.offset) == T::TYPE_ID,
            None => false,
        }
    }

    /// Resolve the handle to a reference. Requires the pool to still be
    /// open (see spec.md §5: closing a pool invalidates outstanding
    /// handles into it, and the library does not track them).
    pub fn get(&self) -> Result<&T> {
        let pool = self.resolve_pool()?;
        let tag = pool.type_id_at(self.offset);
        if tag != T::TYPE_ID {
            return Err(Error::SeriousBug(format!(
                "handle at offset {:#x} has type tag {:#x}, not {:#x}",
                self.offset, tag, T::TYPE_ID
            )));
        }
        Ok(unsafe { &*(pool.addr_of(self.offset) as *const T) })
    }

    /// Mutable resolution for container internals that mutate in place
    /// under the single-writer assumption (spec.md §5). Not exposed
    /// publicly: external callers only ever get a `&T` and go through
    /// `replace`/container-specific methods to change what a handle points
    /// at.
    pub(crate) fn get_mut(&self) -> Result<&mut T> {
        let pool = self.resolve_pool()?;
        Ok(unsafe { &mut *(pool.addr_of(self.offset) as *mut T) })
    }

    pub(crate) fn pool(&self) -> Result<std::sync::Arc<PersistentPool>> {
        self.resolve_pool()
    }

    /// Allocate a new `T` in `pool` and point this handle at it. Must only
    /// be called on a null handle.
    pub fn allocate(&mut self, pool: &PersistentPool, ctor: &dyn AtomicConstructor<T>) -> Result<()> {
        if !self.is_null() {
            return Err(Error::SeriousBug("allocate called on a non-null handle".into()));
        }
        let offset = pool.construct(ctor)?;
        self.pool_uuid = pool.uuid();
        self.offset = offset;
        Ok(())
    }

    /// Like [`Self::allocate`], but resolves the owning pool from this
    /// handle's own storage address via the registry, mirroring
    /// `original_source`'s `PersistentPtr::allocate` (no pool argument:
    /// every `PersistentPtr` is itself a pool object and looks its own
    /// pool up by address). Only valid when `self` is itself stored inside
    /// already-allocated pool memory.
    pub fn allocate_in_place(&mut self, ctor: &dyn AtomicConstructor<T>) -> Result<()> {
        let addr = self as *const Self as usize;
        let pool = registry::pool_from_pointer(addr)
            .ok_or_else(|| Error::SeriousBug("handle is not located inside any open pool".into()))?;
        self.allocate(&pool, ctor)
    }

    /// Atomically replace the object this handle refers to: build the
    /// replacement fully (and persist it) before the handle is updated to
    /// point at it, then free the old object. The caller must persist the
    /// handle's own storage after this call returns if the handle lives
    /// inside a persistent object (see `PersistentPool::persist_value`);
    /// that is the "publish" step this method cannot perform on its own
    /// since it has no way to know whether `self` is itself durable.
    pub fn replace(&mut self, ctor: &dyn AtomicConstructor<T>) -> Result<()> {
        let pool = self.resolve_pool()?;
        let new_offset = pool.construct(ctor)?;
        let old_offset = self.offset;
        self.offset = new_offset;
        pool.free(old_offset);
        Ok(())
    }

    /// Free the referenced object and null out this handle.
    pub fn free(&mut self) -> Result<()> {
        if self.is_null() {
            return Ok(());
        }
        let pool = self.resolve_pool()?;
        pool.free(self.offset);
        self.offset = 0;
        self.pool_uuid = 0;
        Ok(())
    }

    /// Null out this handle without freeing the object it referred to.
    /// Used when ownership of the object has moved elsewhere.
    pub fn nullify(&mut self) {
        self.offset = 0;
        self.pool_uuid = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctor::FnConstructor;
    use tempfile::NamedTempFile;

    impl PersistentType for i32 {
        const TYPE_ID: u64 = crate::pool::fnv1a(b"i32");
    }
    impl PersistentType for i64 {
        const TYPE_ID: u64 = crate::pool::fnv1a(b"i64");
    }

    #[test]
    fn null_handle_rejects_get_and_free() {
        let h: Handle<i32> = Handle::null();
        assert!(!h.valid());
        assert!(h.get().is_err());
    }

    #[test]
    fn allocate_then_get_round_trips() {
        let f = NamedTempFile::new().unwrap();
        let pool = PersistentPool::create(f.path(), 1 << 16, "layout").unwrap();
        let mut h: Handle<i32> = Handle::null();
        let ctor = FnConstructor::new(|v: &mut i32| {
            *v = 7;
            Ok(())
        });
        h.allocate(&pool, &ctor).unwrap();
        assert_eq!(*h.get().unwrap(), 7);
        assert!(h.valid());
    }

    #[test]
    fn type_mismatch_is_rejected_not_reinterpreted() {
        let f = NamedTempFile::new().unwrap();
        let pool = PersistentPool::create(f.path(), 1 << 16, "layout").unwrap();
        let mut h32: Handle<i32> = Handle::null();
        let ctor = FnConstructor::new(|v: &mut i32| {
            *v = 1;
            Ok(())
        });
        h32.allocate(&pool, &ctor).unwrap();
        let h64: Handle<i64> = Handle::from_raw(h32.pool_uuid, h32.offset);
        assert!(!h64.valid());
        assert!(h64.get().is_err());
    }

    #[test]
    fn free_nulls_the_handle() {
        let f = NamedTempFile::new().unwrap();
        let pool = PersistentPool::create(f.path(), 1 << 16, "layout").unwrap();
        let mut h: Handle<i32> = Handle::null();
        let ctor = FnConstructor::new(|v: &mut i32| {
            *v = 1;
            Ok(())
        });
        h.allocate(&pool, &ctor).unwrap();
        h.free().unwrap();
        assert!(h.is_null());
    }
}
