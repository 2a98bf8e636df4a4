//! Low-level persistence primitives.
//!
//! Stable Rust has no portable `clflush`/`clwb`/`sfence` intrinsics, so the
//! only persist path this crate carries is the `msync`-based one: flush the
//! containing page range back to the file with `libc::msync` and block until
//! it completes. Coarser than a cache-line flush, but it is the only
//! mechanism that does not require nightly inline asm.

#![allow(unused)]

/// Flush `len` bytes starting at `ptr` to the backing file and wait for
/// completion. `ptr` need not be page-aligned; the containing pages are
/// synced.
#[inline]
pub fn persist<T: ?Sized>(ptr: &T, len: usize) {
    unsafe {
        let start = ptr as *const T as *const u8 as usize;
        let end = start + len;
        let page = page_size();
        let aligned_start = start & !(page - 1);
        let sync_len = end - aligned_start;
        let rc = libc::msync(
            aligned_start as *mut libc::c_void,
            sync_len,
            libc::MS_SYNC,
        );
        assert!(rc == 0, "msync failed for range [{:#x}, {:#x})", aligned_start, aligned_start + sync_len);
    }
}

/// Flush the whole object back to the backing file.
#[inline]
pub fn persist_obj<T: ?Sized>(obj: &T) {
    persist(obj, std::mem::size_of_val(obj));
}

#[inline]
fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

/// A no-op memory fence placeholder. `msync` is itself a synchronous system
/// call, so callers on this persist path do not need an additional fence;
/// kept as a named call site so persist-ordering in the rest of the crate
/// reads the same regardless of which persist backend is active.
#[inline(always)]
pub fn mfence() {}
