use crate::errors::WireError;

/// Pixel format carried by a frame descriptor. Numeric values are the
/// wire values (§6); `BGRA` starting at 1 leaves 0 as an always-invalid
/// sentinel so a zeroed descriptor is recognizably unset.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PixelFormat {
    Bgra = 1,
    Rgba = 2,
    Rgba10 = 3,
    Rgba16F = 4,
    Bgr32 = 5,
    Rgb24 = 6,
    Yuv420 = 7,
}

impl PixelFormat {
    pub fn from_wire(v: u8) -> Result<Self, WireError> {
        Ok(match v {
            1 => Self::Bgra,
            2 => Self::Rgba,
            3 => Self::Rgba10,
            4 => Self::Rgba16F,
            5 => Self::Bgr32,
            6 => Self::Rgb24,
            7 => Self::Yuv420,
            other => return Err(WireError::UnknownPixelFormat(other)),
        })
    }

    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// Bytes per pixel for formats with a uniform pixel size. Packed
    /// formats (`Rgb24`, `Yuv420`) are not uniform and must be sized via
    /// pitch/stride instead.
    pub fn bytes_per_pixel(self) -> Option<u32> {
        match self {
            Self::Bgra | Self::Rgba | Self::Bgr32 => Some(4),
            Self::Rgba10 => Some(4),
            Self::Rgba16F => Some(8),
            Self::Rgb24 | Self::Yuv420 => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Rotation {
    Rot0 = 0,
    Rot90 = 1,
    Rot180 = 2,
    Rot270 = 3,
}

impl Rotation {
    pub fn from_wire(v: u8) -> Result<Self, WireError> {
        Ok(match v {
            0 => Self::Rot0,
            1 => Self::Rot90,
            2 => Self::Rot180,
            3 => Self::Rot270,
            other => return Err(WireError::UnknownRotation(other)),
        })
    }

    pub fn to_wire(self) -> u8 {
        self as u8
    }
}

bitflags::bitflags! {
    /// Frame descriptor flag bits (§6).
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct FrameFlags: u8 {
        const UPDATE              = 1 << 0;
        const TRUNCATED           = 1 << 1;
        const HDR                 = 1 << 2;
        const HDR_PQ              = 1 << 3;
        const BLOCK_SCREENSAVER   = 1 << 4;
        const REQUEST_ACTIVATION  = 1 << 5;
    }
}

bitflags::bitflags! {
    /// Cursor message flag bits, posted in the per-message user data
    /// rather than in the descriptor itself (§6).
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct CursorFlags: u8 {
        const POSITION = 1 << 0;
        const VISIBLE  = 1 << 1;
        const SHAPE    = 1 << 2;
    }
}

/// Cursor shape encoding (§6).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CursorType {
    Color = 1,
    Monochrome = 2,
    MaskedColor = 3,
}

impl CursorType {
    pub fn from_wire(v: u8) -> Result<Self, WireError> {
        Ok(match v {
            1 => Self::Color,
            2 => Self::Monochrome,
            3 => Self::MaskedColor,
            other => return Err(WireError::UnknownPixelFormat(other)),
        })
    }

    pub fn to_wire(self) -> u8 {
        self as u8
    }
}
