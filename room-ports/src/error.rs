use thiserror::Error;

/// Errors produced while parsing or allocating port ranges.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("Invalid port range format: {0} (expected START-END, e.g. 59000-59009)")]
    InvalidFormat(String),

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Invalid range: start ({start}) must not be greater than end ({end})")]
    Reversed { start: u16, end: u16 },

    #[error("Invalid width: {0} (at least one port is required)")]
    ZeroWidth(u16),

    #[error("No free range of {width} ports left in pool {pool}")]
    PoolExhausted { pool: String, width: u16 },
}
