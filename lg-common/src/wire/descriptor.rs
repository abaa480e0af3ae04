use bytemuck::{Pod, Zeroable};

use super::color::ColorMetadata;
use super::format::{CursorFlags, CursorType, FrameFlags, PixelFormat, Rotation};
use crate::constants::KVMFR_MAX_DAMAGE_RECTS;
use crate::errors::WireError;
use crate::rects::DamageRect;

/// Frame descriptor, the payload of every frame-queue message (§3, §6).
/// Enum and bitflag fields are stored as their raw wire byte/word so the
/// whole struct stays `Pod`; use the typed accessors below rather than
/// reading the raw fields directly.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameDescriptor {
    pub format_version: u32,
    pub frame_serial: u64,
    pub screen_width: u32,
    pub screen_height: u32,
    pub data_width: u32,
    pub data_height: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub pitch: u32,
    pub stride: u32,
    pixel_format: u8,
    rotation: u8,
    flags: u8,
    _pad0: u8,
    pub color_metadata: ColorMetadata,
    pub damage_rect_count: u32,
    pub damage_rects: [DamageRect; KVMFR_MAX_DAMAGE_RECTS],
    /// Byte offset from the start of this descriptor to the first pixel
    /// byte; always a multiple of the alignment negotiated at
    /// `backend.init` time (Testable Property 5).
    pub data_offset: u64,
}

impl FrameDescriptor {
    pub fn pixel_format(&self) -> Result<PixelFormat, WireError> {
        PixelFormat::from_wire(self.pixel_format)
    }

    pub fn set_pixel_format(&mut self, format: PixelFormat) {
        self.pixel_format = format.to_wire();
    }

    pub fn rotation(&self) -> Result<Rotation, WireError> {
        Rotation::from_wire(self.rotation)
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation.to_wire();
    }

    pub fn flags(&self) -> FrameFlags {
        FrameFlags::from_bits_truncate(self.flags)
    }

    pub fn set_flags(&mut self, flags: FrameFlags) {
        self.flags = flags.bits();
    }

    /// The active damage rectangles, or `None` when `damage_rect_count`
    /// is zero and the frame's `UPDATE` flag is set, meaning "whole
    /// frame damaged" rather than "no information" (see Open Question
    /// in SPEC_FULL.md §6 / spec.md §9).
    pub fn damage_rects(&self) -> Option<&[DamageRect]> {
        if self.damage_rect_count == 0 {
            return None;
        }
        let n = (self.damage_rect_count as usize).min(KVMFR_MAX_DAMAGE_RECTS);
        Some(&self.damage_rects[..n])
    }

    pub fn set_damage_rects(&mut self, rects: &[DamageRect]) -> Result<(), WireError> {
        if rects.len() > KVMFR_MAX_DAMAGE_RECTS {
            return Err(WireError::TooManyDamageRects(rects.len()));
        }
        self.damage_rect_count = rects.len() as u32;
        self.damage_rects = Default::default();
        self.damage_rects[..rects.len()].copy_from_slice(rects);
        Ok(())
    }
}

/// Cursor descriptor, the payload of every pointer-queue message (§3,
/// §6). Pixel data, when the `SHAPE` cursor flag is set on the post,
/// follows immediately at `data_offset`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct CursorDescriptor {
    pub shape_version: u64,
    pub x: i32,
    pub y: i32,
    pub hotspot_x: i32,
    pub hotspot_y: i32,
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    shape_type: u8,
    message_flags: u8,
    _pad0: u16,
    pub data_offset: u64,
}

impl CursorDescriptor {
    pub fn shape_type(&self) -> Result<CursorType, WireError> {
        CursorType::from_wire(self.shape_type)
    }

    pub fn set_shape_type(&mut self, shape_type: CursorType) {
        self.shape_type = shape_type.to_wire();
    }

    pub fn message_flags(&self) -> CursorFlags {
        CursorFlags::from_bits_truncate(self.message_flags)
    }

    pub fn set_message_flags(&mut self, flags: CursorFlags) {
        self.message_flags = flags.bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_descriptor_roundtrips_flags_and_format() {
        let mut d: FrameDescriptor = Zeroable::zeroed();
        d.set_pixel_format(PixelFormat::Rgba16F);
        d.set_rotation(Rotation::Rot90);
        d.set_flags(FrameFlags::HDR | FrameFlags::UPDATE);
        assert_eq!(d.pixel_format().unwrap(), PixelFormat::Rgba16F);
        assert_eq!(d.rotation().unwrap(), Rotation::Rot90);
        assert!(d.flags().contains(FrameFlags::HDR));
        assert!(d.flags().contains(FrameFlags::UPDATE));
        assert!(!d.flags().contains(FrameFlags::TRUNCATED));
    }

    #[test]
    fn zero_damage_count_means_no_rects_available() {
        let d: FrameDescriptor = Zeroable::zeroed();
        assert!(d.damage_rects().is_none());
    }

    #[test]
    fn damage_rects_over_capacity_are_rejected() {
        let mut d: FrameDescriptor = Zeroable::zeroed();
        let rects = vec![DamageRect::new(0, 0, 1, 1); KVMFR_MAX_DAMAGE_RECTS + 1];
        assert!(d.set_damage_rects(&rects).is_err());
    }

    #[test]
    fn cursor_descriptor_roundtrips_flags_and_shape() {
        let mut c: CursorDescriptor = Zeroable::zeroed();
        c.set_shape_type(CursorType::MaskedColor);
        c.set_message_flags(CursorFlags::POSITION | CursorFlags::VISIBLE | CursorFlags::SHAPE);
        assert_eq!(c.shape_type().unwrap(), CursorType::MaskedColor);
        assert!(c.message_flags().contains(CursorFlags::SHAPE));
    }
}
