//! Atomic constructors: the size/type/initializer triple every allocation
//! goes through.
//!
//! Grounded on `original_source/src/pmem/AtomicConstructor.h`:
//! `AtomicConstructorBase` is a virtual `size()`/`build()` pair so that a
//! type whose allocated footprint depends on its constructor arguments
//! (`PersistentBuffer`, `PersistentPODVectorData<T>`) can report its real
//! size before the allocator reserves space, rather than always reserving
//! `sizeof(T)`. The `build`/`make` step itself never fails with a "retry";
//! it either finishes the object or returns an error that unwinds the
//! reservation.

use crate::error::Result;
use crate::handle::PersistentType;
use std::marker::PhantomData;

/// Reserves `size()` bytes and runs `build` to initialize them in place.
/// Implemented directly by every type whose allocated footprint is
/// `size_of::<T>()` plus caller-chosen variable data (see `buffer.rs`,
/// `podvec.rs`); everything else can use [`FnConstructor`].
pub trait AtomicConstructor<T> {
    /// Bytes to reserve for the object. Defaults to `size_of::<T>()` for
    /// fixed-size types; overridden by variable-size containers.
    fn size(&self) -> usize {
        std::mem::size_of::<T>()
    }

    /// Type id stamped onto the allocation. Defaults to `T`'s own id;
    /// a constructor that builds a `T` but wants the allocation addressed
    /// later as some other related type overrides this to return that
    /// type's id instead.
    fn type_id(&self) -> u64
    where
        T: PersistentType,
    {
        T::TYPE_ID
    }

    /// Initialize `object`, which the allocator has already zero-reserved.
    /// Returning `Err` aborts the allocation: the caller sees the error and
    /// the reservation is freed, never half-built.
    fn build(&self, object: &mut T) -> Result<()>;
}

/// An [`AtomicConstructor`] for fixed-size `T` built from a plain closure,
/// for call sites that do not need a named constructor type of their own.
pub struct FnConstructor<T, F>
where
    F: Fn(&mut T) -> Result<()>,
{
    f: F,
    _marker: PhantomData<fn(&mut T)>,
}

impl<T, F> FnConstructor<T, F>
where
    F: Fn(&mut T) -> Result<()>,
{
    pub fn new(f: F) -> Self {
        Self { f, _marker: PhantomData }
    }
}

impl<T, F> AtomicConstructor<T> for FnConstructor<T, F>
where
    F: Fn(&mut T) -> Result<()>,
{
    fn build(&self, object: &mut T) -> Result<()> {
        (self.f)(object)
    }
}
