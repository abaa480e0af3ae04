//! The shared memory region itself.
//!
//! In production this is a BAR-mapped region the hypervisor exposes to
//! both the guest producer and the host consumers; how that mapping is
//! discovered is explicitly out of scope (§1). What every side agrees on
//! is a base address and a length. `SharedRegion` models exactly that: an
//! RAII-owned block of memory of a fixed size, backed by an anonymous
//! `memmap2` mapping so the allocator and header logic below can be
//! exercised without any platform-specific discovery code. A real
//! producer/consumer pair would instead construct a `SharedRegion` over a
//! mapping obtained from whatever platform glue hands it the BAR.

use std::sync::atomic::{AtomicU8, Ordering};

use memmap2::MmapMut;

use crate::errors::{Result, TransportError};

/// An owned, fixed-size block of shared memory, RAII-mapped and unmapped
/// exactly once. Cloned handles (`Arc<SharedRegion>`) all see the same
/// bytes, mirroring how a producer and every consumer map the same
/// physical pages in their own address spaces.
pub struct SharedRegion {
    mmap: std::cell::UnsafeCell<MmapMut>,
    size: usize,
}

// SAFETY: every field access goes through atomics or through code that
// upholds the transport's single-writer/single-reader discipline on each
// byte range (header fields, per-slot flag words, heap contents); see
// `queue.rs` and `host.rs`/`client.rs` for the discipline itself.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Allocate a fresh anonymous region of `size` bytes, zeroed.
    pub fn new_anonymous(size: usize) -> Result<Self> {
        let mmap = MmapMut::map_anon(size)?;
        Ok(Self { mmap: std::cell::UnsafeCell::new(mmap), size })
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Raw base pointer. Any use beyond what `queue.rs`/`heap.rs` do
    /// (atomic access to well-known offsets, or a `&[u8]` borrow over a
    /// range that the allocator has committed to the caller) is on the
    /// caller to justify.
    pub fn as_ptr(&self) -> *mut u8 {
        unsafe { (*self.mmap.get()).as_mut_ptr() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.size) }
    }

    /// # Safety
    /// Caller must ensure no other live reference aliases `range` in a
    /// conflicting way (see queue/heap single-writer discipline).
    pub unsafe fn slice_mut(&self, offset: usize, len: usize) -> &mut [u8] {
        debug_assert!(offset + len <= self.size);
        unsafe { std::slice::from_raw_parts_mut(self.as_ptr().add(offset), len) }
    }

    pub fn require_len(&self, need: usize) -> Result<()> {
        if self.size < need {
            return Err(TransportError::RegionTooSmall { need, have: self.size });
        }
        Ok(())
    }

    /// Atomic byte at `offset`, used for the handful of single-byte
    /// flags (e.g. per-slot subscriber acknowledgement bits) that don't
    /// warrant a whole `AtomicU32`.
    pub fn atomic_u8_at(&self, offset: usize) -> &AtomicU8 {
        unsafe { &*(self.as_ptr().add(offset) as *const AtomicU8) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_region_is_zeroed() {
        let region = SharedRegion::new_anonymous(4096).unwrap();
        assert!(region.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn require_len_rejects_too_small_region() {
        let region = SharedRegion::new_anonymous(16).unwrap();
        assert!(region.require_len(17).is_err());
        assert!(region.require_len(16).is_ok());
    }
}
