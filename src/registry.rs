//! Process-global map from pool uuid to the open pool backing it.
//!
//! Grounded on `original_source/src/pmem/PoolRegistry.cc`: an anonymous
//! `std::mutex`-guarded singleton that pools register themselves into on
//! construction and remove themselves from on destruction, used to resolve
//! "which pool does this address belong to" without threading a pool
//! reference through every call. The hand-rolled `static mut ... Option<Mutex<_>>`
//! lazy-init the teacher uses for its own process-global state
//! (`alloc::heap::Heap::guarded`) is replaced here with stable
//! `std::sync::OnceLock`.

use crate::pool::PersistentPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

struct Entry {
    pool: Arc<PersistentPool>,
}

fn registry() -> &'static Mutex<HashMap<u64, Entry>> {
    static REGISTRY: OnceLock<Mutex<HashMap<u64, Entry>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Called by [`PersistentPool::create`]/[`PersistentPool::open`] once the
/// pool is fully initialized.
pub(crate) fn register(uuid: u64, pool: Arc<PersistentPool>) {
    registry().lock().unwrap().insert(uuid, Entry { pool });
}

/// Called when a pool is closed. Any handle still resolving against `uuid`
/// after this point will fail with [`crate::error::Error::SeriousBug`]
/// rather than read freed/unmapped memory.
pub(crate) fn deregister(uuid: u64) {
    registry().lock().unwrap().remove(&uuid);
}

/// Resolve a pool by the uuid stored in a handle.
pub(crate) fn pool_by_uuid(uuid: u64) -> Option<Arc<PersistentPool>> {
    registry().lock().unwrap().get(&uuid).map(|e| e.pool.clone())
}

/// Find the pool whose mapped address range contains `addr`, the analogue
/// of the teacher's `poolFromPointer`. Used when a method needs to know
/// which pool `self` lives in without being handed one explicitly (e.g.
/// `Handle::allocate` called on a handle embedded inside an already-
/// allocated object).
pub(crate) fn pool_from_pointer(addr: usize) -> Option<Arc<PersistentPool>> {
    registry()
        .lock()
        .unwrap()
        .values()
        .find(|e| e.pool.contains_address(addr))
        .map(|e| e.pool.clone())
}
