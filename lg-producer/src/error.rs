use thiserror::Error;

/// Errors the orchestrator itself can raise, distinct from a capture
/// backend's [`lg_capture::CaptureError`] or the transport's
/// [`lg_transport::TransportError`] (both of which it wraps and reacts
/// to directly rather than merely propagating).
#[derive(Error, Debug)]
pub enum ProducerError {
    #[error(transparent)]
    Transport(#[from] lg_transport::TransportError),

    #[error(transparent)]
    Capture(#[from] lg_capture::CaptureError),

    #[error(transparent)]
    PostProcess(#[from] lg_postprocess::PostProcessError),

    #[error(transparent)]
    FrameBuffer(#[from] lg_framebuffer::FrameBufferError),

    #[error("no supported capture backend available")]
    NoBackend,
}

pub type Result<T> = std::result::Result<T, ProducerError>;

/// The well-known exit codes from spec.md §7: `{USER, CAPTURE, KILLED,
/// FAILED, FATAL}`. An external supervisor (out of scope per spec.md §1)
/// may restart the process on any of these except `User`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Clean shutdown requested by the user (`app_quit`'s normal path).
    User = 0,
    /// Exit while a capture backend was in a state that forced process
    /// termination (distinct from `Failed`: the capture subsystem itself
    /// is the diagnosis, not the orchestrator's bookkeeping).
    Capture = 1,
    /// A second shutdown request arrived before the first completed
    /// (mirrors `app_quit`'s "force quitting" branch).
    Killed = 2,
    /// The orchestrator could not complete a required transition
    /// (`captureStart`/`startThreads`/`stopThreads`/`captureStop`
    /// failing in the original).
    Failed = 3,
    /// Fatal to the current process per spec.md §7: out-of-memory at
    /// startup, shared region unmappable, required capability absent.
    Fatal = 4,
}
