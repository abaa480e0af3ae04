//! Wire types carried inside the shared memory region: the transport
//! header, frame descriptors and cursor descriptors (§3, §6 of
//! SPEC_FULL.md). All fixed-size types are `#[repr(C)]` and
//! `bytemuck::Pod` so a descriptor can be read or written by casting a
//! byte slice, with no serialization step, which is what makes the
//! zero-copy DMA import path possible.

mod color;
mod descriptor;
mod format;
mod header;

pub use color::ColorMetadata;
pub use descriptor::{CursorDescriptor, FrameDescriptor};
pub use format::{CursorFlags, CursorType, FrameFlags, PixelFormat, Rotation};
pub use header::{iter_records, Record, RecordType, TransportHeader};
