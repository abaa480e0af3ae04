//! A portable, asynchronous reference backend (§4, SPEC_FULL.md): spawns
//! its own capture thread on `start`; `capture` enqueues a request and
//! returns immediately, `wait_frame`/`get_frame` block on a channel fed
//! by that thread. Exercises the orchestrator's frame-thread path
//! (§4.3, §5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};

use lg_common::Rotation;
use lg_framebuffer::FrameBuffer;

use crate::backend::{CaptureBackend, PointerSink};
use crate::error::{CaptureError, CaptureResult};
use crate::frame::{CaptureFormat, CaptureFrameInfo};

enum CaptureOutcome {
    Frame { info: CaptureFrameInfo, pixels: Vec<u8> },
    Reinit,
}

/// Asynchronous backend that replays a fixed BGRA8 pattern, generated on
/// a dedicated thread started by `start` and stopped by `stop`.
pub struct ThreadedTestBackend {
    width: u32,
    height: u32,
    pixels: Arc<Vec<u8>>,
    request_tx: Option<Sender<()>>,
    outcome_rx: Option<Receiver<CaptureOutcome>>,
    worker: Option<JoinHandle<()>>,
    force_reinit: Arc<AtomicBool>,
    pending: Mutex<Option<Vec<u8>>>,
    _pointer_sink: Option<Arc<dyn PointerSink>>,
}

impl ThreadedTestBackend {
    pub fn gradient(width: u32, height: u32) -> Self {
        let mut pixels = vec![0u8; (width * height * 4) as usize];
        for y in 0..height {
            for x in 0..width {
                let i = ((y * width + x) * 4) as usize;
                pixels[i] = (x % 256) as u8;
                pixels[i + 1] = (y % 256) as u8;
                pixels[i + 2] = 128;
                pixels[i + 3] = 255;
            }
        }
        Self {
            width,
            height,
            pixels: Arc::new(pixels),
            request_tx: None,
            outcome_rx: None,
            worker: None,
            force_reinit: Arc::new(AtomicBool::new(false)),
            pending: Mutex::new(None),
            _pointer_sink: None,
        }
    }

    pub fn force_reinit(&self) {
        self.force_reinit.store(true, Ordering::Release);
    }
}

impl CaptureBackend for ThreadedTestBackend {
    fn short_name(&self) -> &'static str {
        "threaded-test"
    }

    fn display_name(&self) -> &'static str {
        "Threaded Test Pattern (asynchronous)"
    }

    fn async_capture(&self) -> bool {
        true
    }

    fn create(&mut self, pointer_sink: Arc<dyn PointerSink>, _n_frame_buffers: usize) -> CaptureResult<()> {
        self._pointer_sink = Some(pointer_sink);
        Ok(())
    }

    fn init(&mut self, alignment: &mut usize) -> CaptureResult<()> {
        *alignment = (*alignment).max(16);
        Ok(())
    }

    fn start(&mut self) -> CaptureResult<()> {
        let (request_tx, request_rx) = bounded::<()>(4);
        let (outcome_tx, outcome_rx) = bounded::<CaptureOutcome>(1);
        let pixels = self.pixels.clone();
        let width = self.width;
        let height = self.height;
        let force_reinit = self.force_reinit.clone();

        let worker = std::thread::Builder::new()
            .name("lg-capture-threaded-test".into())
            .spawn(move || {
                for () in request_rx.iter() {
                    let outcome = if force_reinit.swap(false, Ordering::AcqRel) {
                        CaptureOutcome::Reinit
                    } else {
                        CaptureOutcome::Frame {
                            info: CaptureFrameInfo {
                                format_version: 1,
                                screen_width: width,
                                screen_height: height,
                                data_width: width,
                                data_height: height,
                                frame_width: width,
                                frame_height: height,
                                pitch: width * 4,
                                stride: width,
                                format: CaptureFormat::Bgra,
                                truncated: false,
                                hdr: false,
                                hdr_pq: false,
                                rotation: Rotation::Rot0,
                                color_metadata: Default::default(),
                                damage_rects: Vec::new(),
                            },
                            pixels: (*pixels).clone(),
                        }
                    };
                    if outcome_tx.send(outcome).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| CaptureError::Backend(e.to_string()))?;

        self.request_tx = Some(request_tx);
        self.outcome_rx = Some(outcome_rx);
        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) {
        self.request_tx.take();
        self.outcome_rx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    /// Async backends merely enqueue a request; the worker thread does
    /// the real work (§4.3).
    fn capture(&mut self, _frame_buffer_index: usize) -> CaptureResult<()> {
        match &self.request_tx {
            Some(tx) => tx.send(()).map_err(|_| CaptureError::Backend("capture thread gone".into())),
            None => Err(CaptureError::Backend("backend not started".into())),
        }
    }

    fn wait_frame(&mut self, _frame_buffer_index: usize, max_payload_size: usize) -> CaptureResult<CaptureFrameInfo> {
        let rx = self.outcome_rx.as_ref().ok_or_else(|| CaptureError::Backend("backend not started".into()))?;
        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(CaptureOutcome::Frame { info, pixels }) => {
                if pixels.len() > max_payload_size {
                    return Err(CaptureError::Backend(format!(
                        "frame of {} bytes exceeds max payload {max_payload_size}",
                        pixels.len()
                    )));
                }
                *self.pending.lock().expect("pending mutex poisoned") = Some(pixels);
                Ok(info)
            }
            Ok(CaptureOutcome::Reinit) => Err(CaptureError::Reinit),
            Err(RecvTimeoutError::Timeout) => Err(CaptureError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::Backend("capture thread gone".into())),
        }
    }

    fn get_frame(&mut self, _frame_buffer_index: usize, fb: &FrameBuffer, max_payload_size: usize) -> CaptureResult<()> {
        let pixels = self.pending.lock().expect("pending mutex poisoned").take();
        let pixels = pixels.ok_or_else(|| CaptureError::Backend("get_frame called before wait_frame".into()))?;
        if pixels.len() > max_payload_size {
            return Err(CaptureError::Backend("frame exceeds max payload size".into()));
        }
        fb.write(&pixels).map_err(|e| CaptureError::Backend(e.to_string()))
    }
}

impl Drop for ThreadedTestBackend {
    fn drop(&mut self) {
        self.stop();
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
    fn capture_then_wait_then_get_frame_round_trips() {
        let mut backend = ThreadedTestBackend::gradient(4, 2);
        backend.create(Arc::new(NoopSink), 4).unwrap();
        backend.init(&mut 16).unwrap();
        backend.start().unwrap();

        backend.capture(0).unwrap();
        let info = backend.wait_frame(0, 1 << 20).unwrap();
        assert_eq!((info.frame_width, info.frame_height), (4, 2));

        let mut storage = vec![0u8; 8 + 4 * 2 * 4];
        let fb = unsafe { FrameBuffer::at(storage.as_mut_ptr(), 4 * 2 * 4) };
        fb.prepare();
        backend.get_frame(0, &fb, 1 << 20).unwrap();
        assert_eq!(fb.write_ptr(), 4 * 2 * 4);

        backend.stop();
    }

    #[test]
    fn force_reinit_is_reported_through_wait_frame() {
        let mut backend = ThreadedTestBackend::gradient(2, 2);
        backend.create(Arc::new(NoopSink), 4).unwrap();
        backend.init(&mut 16).unwrap();
        backend.start().unwrap();
        backend.force_reinit();

        backend.capture(0).unwrap();
        assert!(matches!(backend.wait_frame(0, 1 << 20), Err(CaptureError::Reinit)));
        backend.stop();
    }
}
