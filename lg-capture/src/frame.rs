use lg_common::{ColorMetadata, DamageRect, PixelFormat, Rotation};

/// The pixel format a capture backend or post-process stage produces,
/// distinct from [`lg_common::PixelFormat`] (the *wire* format): a
/// backend's `CaptureFormat` is translated to a `PixelFormat` by the
/// producer orchestrator when it builds a frame descriptor (§4.5
/// "translate the capture pixel format to the wire pixel format; fail
/// cleanly on unknown"). Mirrors `CaptureFormat` in
/// `original_source/host/include/interface/capture.h`, frame variants
/// only — the pointer-shape variants live in [`PointerFormat`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CaptureFormat {
    Bgra,
    Rgba,
    Rgba10,
    Rgba16F,
    Bgr32,
    Rgb24,
    Yuv420,
}

impl CaptureFormat {
    /// Translate to the wire pixel format. Every `CaptureFormat` variant
    /// has a corresponding wire format today, but this stays fallible so
    /// a future capture-only format doesn't silently miscode on the
    /// wire (§4.5: "fail cleanly on unknown").
    pub fn to_wire(self) -> Option<PixelFormat> {
        Some(match self {
            Self::Bgra => PixelFormat::Bgra,
            Self::Rgba => PixelFormat::Rgba,
            Self::Rgba10 => PixelFormat::Rgba10,
            Self::Rgba16F => PixelFormat::Rgba16F,
            Self::Bgr32 => PixelFormat::Bgr32,
            Self::Rgb24 => PixelFormat::Rgb24,
            Self::Yuv420 => PixelFormat::Yuv420,
        })
    }
}

/// Cursor shape pixel encoding (§3, §6). Separate from `CaptureFormat`
/// because a backend never produces these as a *frame*.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PointerFormat {
    Color,
    Monochrome,
    Masked,
}

/// Everything `wait_frame` fills in about a ready frame (§3 "Frame
/// descriptor"), in backend/capture-side units rather than wire bytes.
/// The producer orchestrator converts this into a
/// [`lg_common::FrameDescriptor`] when it calls `send_frame` (§4.5).
#[derive(Clone, Debug)]
pub struct CaptureFrameInfo {
    pub format_version: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    pub data_width: u32,
    pub data_height: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub pitch: u32,
    pub stride: u32,
    pub format: CaptureFormat,
    pub truncated: bool,
    pub hdr: bool,
    pub hdr_pq: bool,
    pub rotation: Rotation,
    pub color_metadata: ColorMetadata,
    /// Damage rectangles produced directly by the backend (§4.3); an
    /// empty vec means "whole frame damaged" per the disambiguation
    /// rule in SPEC_FULL.md §2 (distinguished from "not yet known" by
    /// the caller combining this with the descriptor's `UPDATE` flag).
    pub damage_rects: Vec<DamageRect>,
}

/// A single pointer update, delivered to the orchestrator via
/// [`crate::backend::PointerSink::post_pointer_buffer`] (§4.3's
/// `postPointerBufferFn` callback). Mirrors `CapturePointer` in
/// `interface/capture.h`.
#[derive(Clone, Debug)]
pub struct CapturePointerUpdate {
    pub position_update: bool,
    pub x: i32,
    pub y: i32,
    pub visible: bool,

    pub shape_update: bool,
    pub format: PointerFormat,
    pub hotspot_x: u32,
    pub hotspot_y: u32,
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
}
