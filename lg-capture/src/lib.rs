//! Capture-Backend Interface (CBI, §4.3 of spec.md): the trait contract
//! platform capture mechanisms implement, plus two portable reference
//! backends used for testing the producer orchestrator end to end.

mod backend;
mod error;
mod frame;
mod test_pattern;
mod threaded;

pub use backend::{CaptureBackend, PointerSink};
pub use error::{CaptureError, CaptureResult};
pub use frame::{CaptureFormat, CaptureFrameInfo, CapturePointerUpdate, PointerFormat};
pub use test_pattern::TestPatternBackend;
pub use threaded::ThreadedTestBackend;
