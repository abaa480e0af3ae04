//! Wire types and constants shared by every Looking Glass component:
//! the transport header, frame/cursor descriptors, pixel formats and
//! damage rectangles, plus the config-loading error type shared by the
//! crates that read a TOML config file.

pub mod constants;
pub mod errors;
pub mod rects;
pub mod wire;

pub use rects::DamageRect;
pub use wire::{
    ColorMetadata, CursorDescriptor, CursorFlags, CursorType, FrameDescriptor, FrameFlags,
    PixelFormat, Rotation, TransportHeader,
};
