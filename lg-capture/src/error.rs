use thiserror::Error;

/// The three non-OK outcomes a capture backend can report (§4.3), plus
/// the payload-carrying success case folded into `Result::Ok` by the
/// methods that return one of these. Mirrors `CAPTURE_RESULT_*` in
/// `original_source/host/include/interface/capture.h`, but as a Rust
/// error type rather than an enum shared between success and failure.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture timed out")]
    Timeout,

    /// "please restart me": display mode change, session switch to the
    /// secure desktop, lost device, etc. The orchestrator stops,
    /// deinits, reinits and restarts the backend without restarting the
    /// process (§4.3, §4.5).
    #[error("capture backend requested reinitialization")]
    Reinit,

    /// Unrecoverable by REINIT; the orchestrator treats this as fatal
    /// to the current process (§7).
    #[error("capture backend error: {0}")]
    Backend(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;
