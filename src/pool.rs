//! The backing pool file: create/open lifecycle, root object access, and
//! the typed allocation surface `Handle<T>` builds on.
//!
//! Grounded on `original_source/src/pmem/PersistentPool.cc`/`.h` for the
//! create/open/root contract, and on the teacher's `alloc::pool::open_flags`
//! bitmask for the lifecycle configuration surface (§4.13).

use crate::alloc::{Allocator, FLAG_HAS_ROOT};
use crate::ctor::AtomicConstructor;
use crate::error::{Error, Result};
use crate::handle::{Handle, PersistentType};
use crate::registry;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const OBJ_HEADER_SIZE: u64 = 16;

/// FNV-1a, usable at both const-eval time (type ids) and runtime (layout
/// names, which are caller-chosen strings, not known until `create`/`open`
/// is called).
pub(crate) const fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
        i += 1;
    }
    hash
}

fn layout_magic(layout_name: &str) -> u64 {
    fnv1a(layout_name.as_bytes()) ^ crate::alloc::MAGIC_TAG
}

/// Bitmask configuration for [`PersistentPool::open_with_flags`], mirroring
/// the teacher's `open_flags` module.
pub mod open_flags {
    /// Create a new pool; error if the file already exists.
    pub const O_C: u32 = 1 << 0;
    /// Open an existing pool; error if the file is missing.
    pub const O_F: u32 = 1 << 1;
    /// Create if the file is missing, otherwise open it.
    pub const O_CNE: u32 = 1 << 2;
    /// Create, truncating any existing file at that path.
    pub const O_CF: u32 = 1 << 3;
}

/// A single open, memory-mapped object pool.
///
/// Shared as `Arc<PersistentPool>` so the [`registry`] module and every
/// [`Handle`] resolved against it can hold a reference without the pool
/// needing a stable address of its own (see DESIGN.md, "Handles, pools and
/// the registry").
pub struct PersistentPool {
    uuid: u64,
    alloc: Mutex<Allocator>,
    base_addr: usize,
    size: usize,
    path: PathBuf,
    new_pool: bool,
}

impl PersistentPool {
    /// Create a brand-new pool file. `layout_name` is hashed into the
    /// header's magic field and re-checked on every future [`Self::open`]
    /// against this same path, rejecting an attempt to open a file that
    /// was created for a different schema.
    pub fn create<P: AsRef<Path>>(path: P, size: u64, layout_name: &str) -> Result<Arc<Self>> {
        let path = path.as_ref();
        let magic = layout_magic(layout_name);
        let uuid = crate::utils::rand();
        let alloc = Allocator::create(path, size, uuid, magic)?;
        let pool = Self::from_allocator(alloc, path.to_path_buf(), true);
        crate::log!("pool", "created {} ({} bytes, layout \"{}\")", path.display(), size, layout_name);
        Ok(pool)
    }

    /// Open an existing pool file.
    pub fn open<P: AsRef<Path>>(path: P, layout_name: &str) -> Result<Arc<Self>> {
        let path = path.as_ref();
        let magic = layout_magic(layout_name);
        let alloc = Allocator::open(path, magic)?;
        let pool = Self::from_allocator(alloc, path.to_path_buf(), false);
        crate::log!("pool", "opened {}", path.display());
        Ok(pool)
    }

    /// Create-or-open dispatch driven by an [`open_flags`] bitmask,
    /// mirroring the teacher's `PersistentPool::create`/`open` surface.
    pub fn open_with_flags<P: AsRef<Path>>(
        path: P,
        size: u64,
        layout_name: &str,
        flags: u32,
    ) -> Result<Arc<Self>> {
        let path = path.as_ref();
        let exists = path.exists();
        if flags & open_flags::O_CF != 0 {
            return Self::create(path, size, layout_name);
        }
        if flags & open_flags::O_CNE != 0 {
            return if exists { Self::open(path, layout_name) } else { Self::create(path, size, layout_name) };
        }
        if flags & open_flags::O_C != 0 {
            if exists {
                return Err(Error::CreateError {
                    path: path.display().to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::AlreadyExists, "pool file already exists"),
                });
            }
            return Self::create(path, size, layout_name);
        }
        Self::open(path, layout_name)
    }

    fn from_allocator(alloc: Allocator, path: PathBuf, new_pool: bool) -> Arc<Self> {
        let uuid = alloc.header().uuid;
        let size = alloc.size() as usize;
        let base_addr = alloc.base() as usize;
        let pool = Arc::new(PersistentPool { uuid, alloc: Mutex::new(alloc), base_addr, size, path, new_pool });
        registry::register(uuid, pool.clone());
        pool
    }

    /// Detach this pool from the registry. Handles resolved against it
    /// afterwards fail with [`Error::SeriousBug`] instead of touching
    /// unmapped memory; the mapping itself is only unmapped once every
    /// `Arc<PersistentPool>` (including the registry's own, now dropped)
    /// goes out of scope.
    pub fn close(&self) {
        registry::deregister(self.uuid);
        crate::log!("pool", "closed {}", self.path.display());
    }

    pub fn uuid(&self) -> u64 {
        self.uuid
    }

    pub fn size(&self) -> u64 {
        self.size as u64
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` if this handle came from [`Self::create`] (or an
    /// [`Self::open_with_flags`] dispatch that took the create path);
    /// `false` if it came from [`Self::open`] onto an existing file.
    pub fn new_pool(&self) -> bool {
        self.new_pool
    }

    /// Close this pool and delete its backing file.
    pub fn remove(&self) -> Result<()> {
        self.close();
        std::fs::remove_file(&self.path).map_err(|e| Error::CreateError { path: self.path.display().to_string(), source: e })
    }

    /// Current/peak byte footprint of this pool's heap. See
    /// [`crate::stat::Footprint`].
    #[cfg(feature = "stat_footprint")]
    pub fn footprint(&self) -> crate::stat::Footprint {
        crate::stat::footprint(&self.alloc.lock().unwrap())
    }

    pub(crate) fn contains_address(&self, addr: usize) -> bool {
        addr >= self.base_addr && addr < self.base_addr + self.size
    }

    pub(crate) fn addr_of(&self, offset: u64) -> *const u8 {
        (self.base_addr as *const u8).wrapping_add(offset as usize)
    }

    pub(crate) fn offset_of(&self, addr: usize) -> u64 {
        (addr - self.base_addr) as u64
    }

    pub(crate) fn persist(&self, offset: u64, len: usize) {
        unsafe {
            let ptr = self.addr_of(offset);
            crate::ll::persist(&*ptr, len);
        }
    }

    /// Persist a value already known to live inside this pool's mapping,
    /// such as a `Handle` field just updated by `replace`/`allocate`. See
    /// `Handle::replace` for why this is a separate call rather than
    /// something the handle does for itself.
    pub(crate) fn persist_value<T>(&self, v: &T) {
        let addr = v as *const T as usize;
        let offset = self.offset_of(addr);
        self.persist(offset, std::mem::size_of::<T>());
    }

    /// Fetch the root object's handle, if one has been set via
    /// [`Self::create_root`].
    pub fn get_root<T: PersistentType>(&self) -> Result<Option<Handle<T>>> {
        let g = self.alloc.lock().unwrap();
        let h = g.header();
        if h.flags & FLAG_HAS_ROOT == 0 {
            return Ok(None);
        }
        if h.root_type_id != T::TYPE_ID {
            return Err(Error::SeriousBug(format!(
                "root object has type id {:#x}, not the {:#x} requested",
                h.root_type_id,
                T::TYPE_ID
            )));
        }
        Ok(Some(Handle::from_raw(self.uuid, h.root_offset)))
    }

    /// Build and install the root object. Fails if a root already exists;
    /// a pool's root is set exactly once, at layout-creation time.
    pub fn create_root<T: PersistentType>(&self, ctor: &dyn AtomicConstructor<T>) -> Result<Handle<T>> {
        {
            let g = self.alloc.lock().unwrap();
            if g.header().flags & FLAG_HAS_ROOT != 0 {
                return Err(Error::SeriousBug("pool already has a root object".into()));
            }
        }
        let offset = self.construct(ctor)?;
        {
            let mut g = self.alloc.lock().unwrap();
            g.set_root(offset, T::TYPE_ID);
        }
        crate::log!("pool", "root installed at offset {:#x}", offset);
        Ok(Handle::from_raw(self.uuid, offset))
    }

    /// Reserve space for, build, and persist a new `T`. On constructor
    /// failure the reservation is freed and the error propagated — this is
    /// the crate's only cleanup mechanism (spec.md §1 non-goals: no GC
    /// beyond free-on-error unwind).
    pub(crate) fn construct<T: PersistentType>(&self, ctor: &dyn AtomicConstructor<T>) -> Result<u64> {
        let payload_size = ctor.size();
        let offset = self.alloc_typed(ctor.type_id(), payload_size)?;
        let build_result = {
            let obj: &mut T = unsafe { &mut *(self.addr_of(offset) as *mut T) };
            ctor.build(obj)
        };
        match build_result {
            Ok(()) => {
                self.persist(offset, payload_size);
                Ok(offset)
            }
            Err(e) => {
                self.free_typed(offset);
                Err(e)
            }
        }
    }

    pub(crate) fn free(&self, offset: u64) {
        self.free_typed(offset);
    }

    pub(crate) fn type_id_at(&self, offset: u64) -> u64 {
        self.header_of(offset).0
    }

    fn alloc_typed(&self, type_id: u64, payload_size: usize) -> Result<u64> {
        let block = {
            let mut g = self.alloc.lock().unwrap();
            g.alloc(OBJ_HEADER_SIZE as usize + payload_size)?
        };
        unsafe {
            let p = self.addr_of(block) as *mut u64;
            (p as *mut u64).write_unaligned(type_id);
            (p as *mut u64).add(1).write_unaligned(payload_size as u64);
        }
        self.persist(block, OBJ_HEADER_SIZE as usize);
        Ok(block + OBJ_HEADER_SIZE)
    }

    fn free_typed(&self, payload_offset: u64) {
        let block = payload_offset - OBJ_HEADER_SIZE;
        let (_, size) = self.header_of(payload_offset);
        let mut g = self.alloc.lock().unwrap();
        g.dealloc(block, OBJ_HEADER_SIZE as usize + size as usize);
    }

    fn header_of(&self, payload_offset: u64) -> (u64, u64) {
        let block = payload_offset - OBJ_HEADER_SIZE;
        unsafe {
            let p = self.addr_of(block) as *const u64;
            (p.read_unaligned(), p.add(1).read_unaligned())
        }
    }
}

impl Drop for PersistentPool {
    fn drop(&mut self) {
        registry::deregister(self.uuid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctor::FnConstructor;
    use tempfile::NamedTempFile;

    impl PersistentType for u64 {
        const TYPE_ID: u64 = fnv1a(b"u64");
    }

    #[test]
    fn create_then_reopen_round_trips_root() {
        let f = NamedTempFile::new().unwrap();
        let path = f.path().to_path_buf();
        {
            let pool = PersistentPool::create(&path, 1 << 20, "test-layout").unwrap();
            let ctor = FnConstructor::new(|v: &mut u64| {
                *v = 42;
                Ok(())
            });
            pool.create_root(&ctor).unwrap();
            pool.close();
        }
        let pool = PersistentPool::open(&path, "test-layout").unwrap();
        let handle = pool.get_root::<u64>().unwrap().unwrap();
        assert_eq!(*handle.get().unwrap(), 42);
    }

    #[test]
    fn reopen_with_wrong_layout_name_fails() {
        let f = NamedTempFile::new().unwrap();
        PersistentPool::create(f.path(), 1 << 16, "layout-a").unwrap();
        let err = PersistentPool::open(f.path(), "layout-b").unwrap_err();
        assert!(matches!(err, Error::OpenError { .. }));
    }

    #[test]
    fn new_pool_is_true_on_create_false_on_reopen() {
        let f = NamedTempFile::new().unwrap();
        let path = f.path().to_path_buf();
        {
            let pool = PersistentPool::create(&path, 1 << 16, "layout").unwrap();
            assert!(pool.new_pool());
            pool.close();
        }
        let pool = PersistentPool::open(&path, "layout").unwrap();
        assert!(!pool.new_pool());
    }

    #[test]
    fn remove_closes_and_deletes_the_file() {
        let f = NamedTempFile::new().unwrap();
        let path = f.path().to_path_buf();
        let pool = PersistentPool::create(&path, 1 << 16, "layout").unwrap();
        pool.remove().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn second_root_is_rejected() {
        let f = NamedTempFile::new().unwrap();
        let pool = PersistentPool::create(f.path(), 1 << 16, "layout").unwrap();
        let ctor = FnConstructor::new(|v: &mut u64| {
            *v = 1;
            Ok(())
        });
        pool.create_root(&ctor).unwrap();
        let err = pool.create_root(&ctor).unwrap_err();
        assert!(matches!(err, Error::SeriousBug(_)));
    }
}
