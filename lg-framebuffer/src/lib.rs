//! The frame-buffer streaming object (FB, §4.2): single-producer/
//! single-consumer streaming of a large pixel payload inside one queue
//! message, with a lightweight write-pointer/wait protocol so the
//! consumer can start reading before the producer finishes writing.
//!
//! A `FrameBuffer` never owns its memory — it is always a view over an
//! allocation the shared-memory transport's heap carved out (§2/§3 of
//! SPEC_FULL.md), mirroring how the teacher's `MemoryRing` never owns
//! the SECTION memory it maps, only a view into it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameBufferError {
    #[error("write of {len} bytes at offset {offset} would overflow capacity {capacity}")]
    Overflow { offset: usize, len: usize, capacity: usize },

    #[error("wait for {needed} bytes timed out after {0:?} bytes published", .published)]
    Timeout { needed: usize, published: usize },
}

/// Size of the atomic write-pointer header every `FrameBuffer` view
/// starts with, for callers that need to lay out a slot's memory (the
/// header plus payload) themselves before calling [`FrameBuffer::at`].
pub const HEADER_SIZE: usize = std::mem::size_of::<AtomicU64>();

/// View over a frame buffer's backing bytes: an atomic write-pointer
/// header followed by the payload region. `base` must point to at least
/// `HEADER_SIZE + capacity` valid, exclusively-owned-for-this-FB bytes
/// for the lifetime of the `FrameBuffer`.
pub struct FrameBuffer {
    base: *mut u8,
    capacity: usize,
}

// SAFETY: all mutation of the header goes through the atomic; all
// mutation of the payload is performed only by the producer side
// (`write`/`set_write_ptr`), matching the SPSC contract in §4.2.
unsafe impl Send for FrameBuffer {}
unsafe impl Sync for FrameBuffer {}

impl FrameBuffer {
    /// # Safety
    /// `base` must point to `HEADER_SIZE + capacity` bytes, valid and
    /// exclusively used as this frame buffer's backing storage for as
    /// long as the returned `FrameBuffer` is alive.
    pub unsafe fn at(base: *mut u8, capacity: usize) -> Self {
        Self { base, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn header(&self) -> &AtomicU64 {
        unsafe { &*(self.base as *const AtomicU64) }
    }

    fn payload_ptr(&self) -> *mut u8 {
        unsafe { self.base.add(HEADER_SIZE) }
    }

    // ---- producer side ----

    /// Zero the write-pointer at the start of a new publication.
    pub fn prepare(&self) {
        self.header().store(0, Ordering::Release);
    }

    /// Copy `src` to the current write-pointer and advance/publish it.
    pub fn write(&self, src: &[u8]) -> Result<(), FrameBufferError> {
        let wp = self.header().load(Ordering::Relaxed) as usize;
        if wp + src.len() > self.capacity {
            return Err(FrameBufferError::Overflow { offset: wp, len: src.len(), capacity: self.capacity });
        }
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), self.payload_ptr().add(wp), src.len());
        }
        self.header().store((wp + src.len()) as u64, Ordering::Release);
        Ok(())
    }

    /// Publish `n` bytes the caller already wrote directly into
    /// `data_mut()` (e.g. a GPU readback that targeted this memory
    /// directly) without going through `write`.
    pub fn set_write_ptr(&self, n: usize) -> Result<(), FrameBufferError> {
        if n > self.capacity {
            return Err(FrameBufferError::Overflow { offset: 0, len: n, capacity: self.capacity });
        }
        self.header().store(n as u64, Ordering::Release);
        Ok(())
    }

    /// Raw mutable access to the payload region, for producers that
    /// stream bytes in directly (e.g. `backend.get_frame`) rather than
    /// going through `write`.
    ///
    /// # Safety
    /// Caller must not write past `capacity` and must call
    /// `set_write_ptr` to publish what it wrote.
    pub unsafe fn data_mut(&self) -> *mut u8 {
        self.payload_ptr()
    }

    // ---- consumer side ----

    pub fn write_ptr(&self) -> usize {
        self.header().load(Ordering::Acquire) as usize
    }

    /// Block (with a short bounded spin, then yielding) until at least
    /// `needed_bytes` have been published, or `timeout` elapses.
    pub fn wait(&self, needed_bytes: usize, timeout: Duration) -> Result<(), FrameBufferError> {
        const SPIN_ITERS: u32 = 1000;
        let deadline = Instant::now() + timeout;
        loop {
            for _ in 0..SPIN_ITERS {
                if self.write_ptr() >= needed_bytes {
                    return Ok(());
                }
                std::hint::spin_loop();
            }
            if self.write_ptr() >= needed_bytes {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(FrameBufferError::Timeout { needed: needed_bytes, published: self.write_ptr() });
            }
            std::thread::yield_now();
        }
    }

    /// Copy into `dst`, converting from `src_pitch` to `dst_pitch` if
    /// the two differ (e.g. the destination buffer is packed tighter
    /// than the source payload).
    pub fn read(&self, dst: &mut [u8], dst_pitch: usize, width: usize, height: usize, bpp: usize, src_pitch: usize) {
        let row_bytes = width * bpp;
        let src = self.payload_ptr();
        for row in 0..height {
            let src_off = row * src_pitch;
            let dst_off = row * dst_pitch;
            unsafe {
                std::ptr::copy_nonoverlapping(src.add(src_off), dst.as_mut_ptr().add(dst_off), row_bytes);
            }
        }
    }

    /// Raw pointer to the payload, for zero-copy DMA import.
    pub fn data(&self) -> *const u8 {
        self.payload_ptr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backing(capacity: usize) -> Vec<u8> {
        vec![0u8; HEADER_SIZE + capacity]
    }

    #[test]
    fn prepare_resets_write_pointer() {
        let mut buf = backing(64);
        let fb = unsafe { FrameBuffer::at(buf.as_mut_ptr(), 64) };
        fb.write(&[1, 2, 3, 4]).unwrap();
        assert_eq!(fb.write_ptr(), 4);
        fb.prepare();
        assert_eq!(fb.write_ptr(), 0);
    }

    #[test]
    fn write_ptr_is_monotone_within_one_publication() {
        let mut buf = backing(64);
        let fb = unsafe { FrameBuffer::at(buf.as_mut_ptr(), 64) };
        fb.prepare();
        fb.write(&[1, 2]).unwrap();
        let after_first = fb.write_ptr();
        fb.write(&[3, 4]).unwrap();
        assert!(fb.write_ptr() >= after_first);
    }

    #[test]
    fn write_past_capacity_is_rejected() {
        let mut buf = backing(4);
        let fb = unsafe { FrameBuffer::at(buf.as_mut_ptr(), 4) };
        assert!(fb.write(&[0u8; 8]).is_err());
    }

    #[test]
    fn wait_returns_once_enough_bytes_published() {
        let mut buf = backing(64);
        let fb = unsafe { FrameBuffer::at(buf.as_mut_ptr(), 64) };
        fb.prepare();
        fb.write(&[0u8; 16]).unwrap();
        assert!(fb.wait(16, Duration::from_millis(100)).is_ok());
        assert!(fb.wait(32, Duration::from_millis(10)).is_err());
    }

    #[test]
    fn read_converts_pitch() {
        let mut buf = backing(64);
        let fb = unsafe { FrameBuffer::at(buf.as_mut_ptr(), 64) };
        fb.prepare();
        // 2 rows of 4 "pixels" at 1 byte each, source pitch 8 (padded).
        let mut src_row0 = vec![1u8, 2, 3, 4, 0, 0, 0, 0];
        let src_row1 = vec![5u8, 6, 7, 8, 0, 0, 0, 0];
        src_row0.extend(src_row1);
        fb.write(&src_row0).unwrap();

        let mut dst = vec![0u8; 8];
        fb.read(&mut dst, 4, 4, 2, 1, 8);
        assert_eq!(dst, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
