use thiserror::Error;

/// Errors raised while interpreting bytes as a wire type defined in
/// [`crate::wire`]. These never occur for data this process produced
/// itself; they guard against a peer on a different protocol version or a
/// corrupted shared region.
#[derive(Error, Debug)]
pub enum WireError {
    #[error("buffer too small: need at least {need} bytes, got {got}")]
    Truncated { need: usize, got: usize },

    #[error("bad transport header magic")]
    BadMagic,

    #[error("unsupported transport header version {got} (expected {expected})")]
    UnsupportedVersion { got: u32, expected: u32 },

    #[error("unknown pixel format code {0}")]
    UnknownPixelFormat(u8),

    #[error("unknown rotation code {0}")]
    UnknownRotation(u8),

    #[error("damage rect count {0} exceeds KVMFR_MAX_DAMAGE_RECTS ({max})", max = crate::constants::KVMFR_MAX_DAMAGE_RECTS)]
    TooManyDamageRects(usize),
}
