//! A portable, synchronous reference backend (§4, SPEC_FULL.md): since
//! the real platform backends (DXGI, NvFBC, XCB) are out of scope, this
//! produces a deterministic pixel buffer on every `capture` call and is
//! used directly by the integration tests for scenarios S1 and S6.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lg_common::{DamageRect, Rotation};
use lg_framebuffer::FrameBuffer;

use crate::backend::{CaptureBackend, PointerSink};
use crate::error::{CaptureError, CaptureResult};
use crate::frame::{CaptureFormat, CaptureFrameInfo};

/// Synchronous backend that replays a single caller-supplied BGRA8
/// pixel buffer every frame. `capture`/`wait_frame`/`get_frame` never
/// block: the "frame" is always already available.
pub struct TestPatternBackend {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    format_version: u32,
    force_reinit: AtomicBool,
    _pointer_sink: Option<Arc<dyn PointerSink>>,
}

impl TestPatternBackend {
    /// `pixels` must be exactly `width * height * 4` bytes of BGRA8.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        assert_eq!(pixels.len(), (width * height * 4) as usize);
        Self {
            width,
            height,
            pixels,
            format_version: 1,
            force_reinit: AtomicBool::new(false),
            _pointer_sink: None,
        }
    }

    /// A small built-in gradient, useful when a test doesn't care about
    /// the exact pixel values.
    pub fn gradient(width: u32, height: u32) -> Self {
        let mut pixels = vec![0u8; (width * height * 4) as usize];
        for y in 0..height {
            for x in 0..width {
                let i = ((y * width + x) * 4) as usize;
                pixels[i] = (x % 256) as u8;
                pixels[i + 1] = (y % 256) as u8;
                pixels[i + 2] = 0;
                pixels[i + 3] = 255;
            }
        }
        Self::new(width, height, pixels)
    }

    /// Replace the pixel buffer the next `capture` call will serve
    /// (simulating a content change between frames).
    pub fn set_pixels(&mut self, pixels: Vec<u8>) {
        assert_eq!(pixels.len(), self.pixels.len());
        self.pixels = pixels;
    }

    /// Test hook (§4, SPEC_FULL.md): make the next `capture`/`wait_frame`
    /// call return `Reinit`, exercising scenario S3.
    pub fn force_reinit(&self) {
        self.force_reinit.store(true, Ordering::Release);
    }

    fn take_reinit(&self) -> bool {
        self.force_reinit.swap(false, Ordering::AcqRel)
    }
}

impl CaptureBackend for TestPatternBackend {
    fn short_name(&self) -> &'static str {
        "test-pattern"
    }

    fn display_name(&self) -> &'static str {
        "Test Pattern (synchronous)"
    }

    fn async_capture(&self) -> bool {
        false
    }

    fn create(&mut self, pointer_sink: Arc<dyn PointerSink>, _n_frame_buffers: usize) -> CaptureResult<()> {
        self._pointer_sink = Some(pointer_sink);
        Ok(())
    }

    fn init(&mut self, alignment: &mut usize) -> CaptureResult<()> {
        *alignment = (*alignment).max(16);
        Ok(())
    }

    fn capture(&mut self, _frame_buffer_index: usize) -> CaptureResult<()> {
        if self.take_reinit() {
            return Err(CaptureError::Reinit);
        }
        Ok(())
    }

    fn wait_frame(&mut self, _frame_buffer_index: usize, max_payload_size: usize) -> CaptureResult<CaptureFrameInfo> {
        if self.pixels.len() > max_payload_size {
            return Err(CaptureError::Backend(format!(
                "frame of {} bytes exceeds max payload {max_payload_size}",
                self.pixels.len()
            )));
        }
        Ok(CaptureFrameInfo {
            format_version: self.format_version,
            screen_width: self.width,
            screen_height: self.height,
            data_width: self.width,
            data_height: self.height,
            frame_width: self.width,
            frame_height: self.height,
            pitch: self.width * 4,
            stride: self.width,
            format: CaptureFormat::Bgra,
            truncated: false,
            hdr: false,
            hdr_pq: false,
            rotation: Rotation::Rot0,
            color_metadata: Default::default(),
            damage_rects: Vec::<DamageRect>::new(),
        })
    }

    fn get_frame(&mut self, _frame_buffer_index: usize, fb: &FrameBuffer, max_payload_size: usize) -> CaptureResult<()> {
        if self.pixels.len() > max_payload_size {
            return Err(CaptureError::Backend("frame exceeds max payload size".into()));
        }
        fb.write(&self.pixels).map_err(|e| CaptureError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopSink;
    impl PointerSink for NoopSink {
        fn get_pointer_buffer(&self) -> (*mut u8, usize) {
            (std::ptr::null_mut(), 0)
        }
        fn post_pointer_buffer(&self, _update: crate::frame::CapturePointerUpdate) {}
    }

    #[test]
    fn serves_the_same_frame_every_capture() {
        let mut backend = TestPatternBackend::gradient(4, 2);
        backend.create(Arc::new(NoopSink), 4).unwrap();
        backend.init(&mut 16).unwrap();
        for _ in 0..3 {
            backend.capture(0).unwrap();
            let info = backend.wait_frame(0, 1 << 20).unwrap();
            assert_eq!((info.frame_width, info.frame_height), (4, 2));
        }
    }

    #[test]
    fn force_reinit_surfaces_once() {
        let mut backend = TestPatternBackend::gradient(2, 2);
        backend.create(Arc::new(NoopSink), 4).unwrap();
        backend.init(&mut 16).unwrap();
        backend.force_reinit();
        assert!(matches!(backend.capture(0), Err(CaptureError::Reinit)));
        assert!(backend.capture(0).is_ok());
    }
}
