//! The producer orchestrator's state machine (spec.md §4.5 / §5).

use std::sync::atomic::{AtomicU8, Ordering};

/// Mirrors `AppState` in `original_source/host/src/app.c`. `Shutdown` is
/// terminal and reachable from any other state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AppState {
    Idle = 0,
    Starting = 1,
    Running = 2,
    TransitionToIdle = 3,
    ReinitLgmp = 4,
    Shutdown = 5,
}

impl AppState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::TransitionToIdle,
            4 => Self::ReinitLgmp,
            _ => Self::Shutdown,
        }
    }
}

/// Shared across the main thread and any worker thread (frame thread,
/// pointer thread) that needs to observe or request a transition, per
/// §5's "Cancellation: set a shared `state`..." Mirrors `setAppState`'s
/// "once SHUTDOWN, stay SHUTDOWN" rule.
#[derive(Debug)]
pub struct SharedState(AtomicU8);

impl SharedState {
    pub fn new(initial: AppState) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn get(&self) -> AppState {
        AppState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// `setAppState`: a no-op once the state is already `Shutdown`.
    pub fn set(&self, next: AppState) {
        if self.get() == AppState::Shutdown {
            return;
        }
        self.0.store(next as u8, Ordering::Release);
    }

    /// `app_quit`: unconditional, bypasses the "ignore once shut down"
    /// rule so shutdown itself is always reachable.
    pub fn shutdown(&self) {
        self.0.store(AppState::Shutdown as u8, Ordering::Release);
    }
}
