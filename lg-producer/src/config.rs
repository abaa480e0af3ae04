//! Orchestrator configuration (spec.md §4.5 / §6). Values here are the
//! in-process equivalents of the CLI/config-file knobs
//! `original_source/host/src/app.c` reads at startup: queue sizing,
//! throttle, the alignment floor negotiated with `backend.init`, and
//! the wire damage-rect cap.

use std::time::Duration;

use lg_common::constants::{
    DEFAULT_ALIGN_SIZE, DEFAULT_SUBSCRIBER_TIMEOUT_MS, KVMFR_MAX_DAMAGE_RECTS, LGMP_Q_FRAME_LEN,
};

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Written into the transport header at `Host::host_init` and on
    /// every `REINIT_LGMP`.
    pub host_version: String,
    /// Frame-queue ring capacity (`LGMP_Q_FRAME_LEN` in the original).
    pub frame_queue_capacity: usize,
    /// Pointer-queue ring capacity; independent of the shape/position
    /// pool sizes `PointerPipeline` rotates through (`POINTER_SHAPE_BUFFERS`
    /// / `LGMP_Q_POINTER_LEN` in `lg-common::constants`), same way the
    /// frame queue's ring capacity is independent of `n_frame_buffers`.
    pub pointer_queue_capacity: usize,
    /// Number of frame-buffer memory slots the capture backend rotates
    /// through; usually equal to `frame_queue_capacity`.
    pub n_frame_buffers: usize,
    /// Upper bound on a single frame's pixel payload, in bytes.
    pub max_frame_payload: usize,
    /// Minimum pixel-data alignment requested at `backend.init`; the
    /// backend may only widen this.
    pub align_size: usize,
    /// Capture rate cap; `0` means unthrottled.
    pub throttle_fps: u32,
    /// Per-queue subscriber inactivity timeout before eviction.
    pub subscriber_timeout: Duration,
    /// Wire cap on damage rectangles per frame descriptor; a merged
    /// rect list longer than this falls back to whole-frame damage.
    pub max_damage_rects: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            host_version: env!("CARGO_PKG_VERSION").to_string(),
            frame_queue_capacity: LGMP_Q_FRAME_LEN,
            pointer_queue_capacity: 16,
            n_frame_buffers: LGMP_Q_FRAME_LEN,
            max_frame_payload: 64 * 1024 * 1024,
            align_size: DEFAULT_ALIGN_SIZE,
            throttle_fps: 0,
            subscriber_timeout: Duration::from_millis(DEFAULT_SUBSCRIBER_TIMEOUT_MS as u64),
            max_damage_rects: KVMFR_MAX_DAMAGE_RECTS,
        }
    }
}

impl OrchestratorConfig {
    /// `0` throttle_fps disables the sleep in `FrameWorker::throttle_self`.
    pub fn throttle_interval(&self) -> Duration {
        if self.throttle_fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(1_000_000 / self.throttle_fps as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_fps_means_unthrottled() {
        let config = OrchestratorConfig { throttle_fps: 0, ..Default::default() };
        assert_eq!(config.throttle_interval(), Duration::ZERO);
    }

    #[test]
    fn nonzero_fps_yields_matching_interval() {
        let config = OrchestratorConfig { throttle_fps: 100, ..Default::default() };
        assert_eq!(config.throttle_interval(), Duration::from_micros(10_000));
    }
}
