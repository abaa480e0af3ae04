use lg_common::DamageRect;

use crate::desc::{FrameDescription, PixelBuffer, StageConfig};
use crate::error::PostProcessResult;
use crate::gpu::GpuContext;

/// One stage in the post-process chain (§4.4). A stage is reconfigured
/// whenever the upstream description changes; between reconfigurations
/// `run`/`adjust_damage` are called once per captured frame.
///
/// The original's `setup`/`init`/`free`/`finish` GPU-resource lifecycle
/// collapses here into ordinary construction and `Drop`: a `GpuContext`
/// is threaded through `run` rather than stashed across calls, since
/// Rust's ownership model makes the "who frees this" bookkeeping that
/// `free`/`finish` existed for unnecessary.
pub trait PostProcessStage: Send {
    fn name(&self) -> &'static str;

    /// Given the input description, decide whether this stage applies
    /// and if so what it outputs. `Bypass` means this stage is skipped
    /// for every frame until reconfigured again.
    fn configure(&mut self, input: &FrameDescription) -> StageConfig;

    /// Transform one frame. Only called while configured (not bypassed).
    /// `gpu` is `Some` when a `GpuContext` is available; stages that
    /// don't implement a GPU path ignore it and always run on the CPU.
    fn run(&mut self, input: &PixelBuffer, gpu: Option<&GpuContext>) -> PostProcessResult<PixelBuffer>;

    /// Rewrite damage rectangles from input coordinates to output
    /// coordinates. Identity unless the stage changes geometry.
    fn adjust_damage(&self, rects: &[DamageRect]) -> Vec<DamageRect> {
        rects.to_vec()
    }
}
