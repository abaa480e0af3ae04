use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostProcessError {
    #[error("input buffer of {actual} bytes is too small for {expected} bytes ({reason})")]
    ShortInput { expected: usize, actual: usize, reason: &'static str },

    #[error("{stage}: no downsample rule matches {width}x{height}")]
    NoMatchingRule { stage: &'static str, width: u32, height: u32 },

    #[error("gpu path unavailable: {0}")]
    GpuUnavailable(String),
}

pub type PostProcessResult<T> = Result<T, PostProcessError>;
