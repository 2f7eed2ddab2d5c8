use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("frame of {0} bytes exceeds the packet limit")]
    FrameTooLarge(usize),

    #[error("peer closed the connection")]
    Closed,

    #[error("read timed out")]
    Timeout,

    #[error("handshake failed: {0}")]
    Handshake(&'static str),

    #[error("challenge is for chain {got}, expected {expected}")]
    ChainMismatch { expected: u8, got: u8 },

    #[error("clock drift too large: {drift_ms}ms")]
    ClockDrift { drift_ms: u64 },

    #[error("handshake signature is invalid")]
    InvalidSignature,

    #[error("peer is not authorized")]
    Unauthorized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
