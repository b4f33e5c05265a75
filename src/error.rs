use std::net::Ipv4Addr;

use thiserror::Error;

/// Errors that end a scan invocation. Per-host failures (closed ports,
/// handshake timeouts, store errors) are never reported through this type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("start or end ip is missing")]
    MissingBounds,

    #[error("invalid ipv4 address: {0:?}")]
    InvalidFormat(String),

    #[error("start ip {start} is greater than end ip {end}")]
    StartAfterEnd { start: Ipv4Addr, end: Ipv4Addr },

    #[error("batch size must be at least 1")]
    BatchSizeTooSmall,

    #[error("batch size {size} is over the maximum of {max}")]
    BatchSizeTooLarge { size: usize, max: usize },

    #[error("scan task failed: {0}")]
    TaskFailed(String),
}
