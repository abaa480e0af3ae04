//! Post-process chain (PP, §4.4): the ordered set of GPU/CPU stages
//! applied between capture and publication into a frame buffer.

mod chain;
mod desc;
mod downsample;
mod error;
mod gpu;
mod hdr16_to_pq10;
mod rgb24_pack;
mod sdr_white_level;
mod stage;

pub use chain::PostProcessChain;
pub use desc::{FrameDescription, PixelBuffer, StageConfig};
pub use downsample::{adjust_damage_for_downsample, downsample, DownsampleRule, DownsampleStage};
pub use error::{PostProcessError, PostProcessResult};
pub use gpu::GpuContext;
pub use hdr16_to_pq10::{hdr16_to_pq10, pq_encode, Hdr16ToPq10Stage};
pub use rgb24_pack::{adjust_damage_for_rgb24, pack_rgb24, packed_container_dims, Rgb24PackStage};
pub use sdr_white_level::{sdr_white_level, SdrWhiteLevelStage};
pub use stage::PostProcessStage;
