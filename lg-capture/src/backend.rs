use std::sync::Arc;

use lg_framebuffer::FrameBuffer;

use crate::error::CaptureResult;
use crate::frame::{CaptureFrameInfo, CapturePointerUpdate};

/// The two callbacks a backend is handed at `create` time
/// (`CaptureGetPointerBuffer`/`CapturePostPointerBuffer` in
/// `interface/capture.h`). Modeled as a trait object behind an `Arc`
/// rather than raw function pointers or a back-reference to the
/// orchestrator, per the "cyclic references" design note in SPEC_FULL.md
/// §9: the backend holds a cheaply-cloned handle with its own lifetime,
/// never a borrow of the orchestrator itself.
pub trait PointerSink: Send + Sync {
    /// Returns a pointer to, and the capacity of, the shape buffer the
    /// backend should write the next pointer shape's pixels into.
    ///
    /// # Safety
    /// The returned pointer is valid only until the next call to
    /// `get_pointer_buffer` or `post_pointer_buffer` on this sink.
    fn get_pointer_buffer(&self) -> (*mut u8, usize);

    /// Publish a completed pointer update (position-only or with a new
    /// shape, per `update.shape_update`).
    fn post_pointer_buffer(&self, update: CapturePointerUpdate);
}

/// The capture-backend contract (§4.3): a small, uniform capability set
/// so different platform capture mechanisms plug in interchangeably. Two
/// flavors distinguished only by [`CaptureBackend::async_capture`]: for
/// synchronous backends, `capture` blocks until a frame is ready; for
/// asynchronous backends, `capture` enqueues work and returns
/// immediately, and a backend-owned thread fulfils `wait_frame` /
/// `get_frame` sometime later. The orchestrator's external behavior must
/// not depend on which flavor it's driving (SPEC_FULL.md §9).
pub trait CaptureBackend: Send {
    fn short_name(&self) -> &'static str;
    fn display_name(&self) -> &'static str;
    fn async_capture(&self) -> bool;

    /// Deprecated backends are skipped by auto-selection and must be
    /// named explicitly in configuration (mirrors `app.c`'s
    /// `CaptureInterfaces[i]->deprecated` check).
    fn deprecated(&self) -> bool {
        false
    }

    /// Allocate internal state, given the callbacks for the cursor path
    /// and the number of frame buffers the orchestrator rotates through.
    fn create(&mut self, pointer_sink: Arc<dyn PointerSink>, n_frame_buffers: usize) -> CaptureResult<()>;

    /// Bind to the shared region and negotiate a minimum pixel-data
    /// alignment; `alignment` is in/out: the backend may only widen it.
    fn init(&mut self, alignment: &mut usize) -> CaptureResult<()>;

    fn start(&mut self) -> CaptureResult<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn deinit(&mut self) -> CaptureResult<()> {
        Ok(())
    }

    /// For sync backends: block until a frame is ready. For async
    /// backends: enqueue a capture request and return immediately
    /// (almost always `Ok(())`; a backend thread reports the real result
    /// through `wait_frame`/`get_frame`).
    fn capture(&mut self, frame_buffer_index: usize) -> CaptureResult<()>;

    /// Fill in the descriptor fields for the next ready frame.
    fn wait_frame(&mut self, frame_buffer_index: usize, max_payload_size: usize) -> CaptureResult<CaptureFrameInfo>;

    /// Stream pixels into `fb`. Called after the frame has already been
    /// posted to the queue ("post first, copy second", §4.5) so readers
    /// can begin consuming bytes as `fb`'s write-pointer advances.
    fn get_frame(&mut self, frame_buffer_index: usize, fb: &FrameBuffer, max_payload_size: usize) -> CaptureResult<()>;
}
