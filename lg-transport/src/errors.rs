use thiserror::Error;

/// Errors raised by the shared-memory transport (§4.1 / §7 in
/// SPEC_FULL.md). `Corrupted` and `NoMemory` are the two statuses the
/// contract calls out as non-fatal: the producer orchestrator reinits
/// the transport on `Corrupted`, and retries or drops on `NoMemory`.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("header corrupted: {0}")]
    Corrupted(&'static str),

    #[error("heap exhausted allocating {requested} bytes")]
    NoMemory { requested: usize },

    #[error("queue {queue_id} is full")]
    QueueFull { queue_id: u32 },

    #[error("unknown queue id {0}")]
    UnknownQueue(u32),

    #[error("subscriber {0} is not subscribed to this queue")]
    NotSubscribed(u32),

    #[error("shared region too small: need at least {need} bytes, have {have}")]
    RegionTooSmall { need: usize, have: usize },

    #[error("failed to map shared region: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wire(#[from] lg_common::errors::WireError),
}

pub type Result<T> = std::result::Result<T, TransportError>;
