//! Producer orchestrator (PO, spec.md §4.5): the component that owns
//! the shared-memory transport's queues, drives the capture backend's
//! state machine, post-processes frames, and publishes them alongside
//! a parallel cursor pipeline.

pub mod config;
pub mod damage;
pub mod error;
pub mod host_os;
mod orchestrator;
pub mod pointer;
pub mod state;

pub use config::OrchestratorConfig;
pub use error::{ExitCode, ProducerError, Result};
pub use host_os::{HostOsHooks, NullHostOs};
pub use orchestrator::Orchestrator;
pub use pointer::PointerPipeline;
pub use state::{AppState, SharedState};
