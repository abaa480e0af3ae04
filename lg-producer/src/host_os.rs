//! The host-OS collaborator seam (SPEC_FULL.md §7). `os_blockScreensaver`
//! and `os_getAndClearPendingActivationRequest` in
//! `original_source/host/src/app.c` are platform glue explicitly out of
//! scope per spec.md §1; what *is* in scope is that `send_frame` reads
//! both of them every frame to compute `FrameFlags`. This trait is the
//! explicit context parameter spec.md §9 asks for in place of a hidden
//! global.

/// Two hooks into platform state that affect frame flags (§4.5). A real
/// deployment supplies a platform-specific implementation; this crate
/// ships only [`NullHostOs`], which always reports "nothing to do".
pub trait HostOsHooks: Send + Sync {
    /// Whether the screensaver should be blocked on this frame
    /// (`FrameFlags::BLOCK_SCREENSAVER`).
    fn should_block_screensaver(&self) -> bool {
        false
    }

    /// Consumes and clears any pending window-activation request
    /// (`FrameFlags::REQUEST_ACTIVATION`); `get-and-clear` semantics,
    /// same one-shot shape as `queue_new_subs`.
    fn take_pending_activation_request(&self) -> bool {
        false
    }

    /// Applies a `SET_CURSOR_POS` command read off the transport's
    /// reverse channel (§6). A real deployment forwards this to the
    /// platform's cursor-warp API; out of scope here beyond the seam.
    fn set_cursor_pos(&self, _x: i32, _y: i32) {}
}

/// Default implementation used when no platform glue is wired in (e.g.
/// every test in this crate, and `lg-host-agent` until it supplies a
/// real one).
#[derive(Default)]
pub struct NullHostOs;

impl HostOsHooks for NullHostOs {}
