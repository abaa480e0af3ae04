use bytemuck::{Pod, Zeroable};

/// Display color-metadata block carried alongside a frame descriptor.
/// Mirrors the handful of fields the PP chain and a renderer need to
/// correctly interpret HDR content; not a full color management profile.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Default, Pod, Zeroable)]
pub struct ColorMetadata {
    /// Reference white level in nits, used by the SDR-white-level stage.
    pub sdr_white_level_nits: f32,
    /// Mastering display maximum luminance in nits, 0 if unknown.
    pub max_luminance_nits: f32,
    /// Maximum content light level in nits, 0 if unknown.
    pub max_content_light_level_nits: f32,
    /// Maximum frame-average light level in nits, 0 if unknown.
    pub max_frame_average_light_level_nits: f32,
}
