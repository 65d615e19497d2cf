//! Error types for the remote transport

use thiserror::Error;

/// Transport error types
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("bad frame magic: {0:02x?}")]
    BadMagic([u8; 2]),

    #[error("protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u8, got: u8 },

    #[error("unknown frame kind: {0}")]
    UnknownFrameKind(u8),

    #[error("frame too large: {size} bytes exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("{0} already defined")]
    AlreadyDefined(&'static str),

    #[error("cannot listen on port {port}: {source}")]
    ListenFailed {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;
