//! Error types for the ARQ core protocol engine

use crate::protocol::SeqNum;
use std::fmt;

/// Result type for ARQ core operations
pub type ArqCoreResult<T> = std::result::Result<T, ArqCoreError>;

/// Error types produced by the codec and the state machines.
#[derive(Debug, Clone, PartialEq)]
pub enum ArqCoreError {
    /// Received bytes could not be parsed as a frame
    MalformedFrame { reason: String },
    /// Checksum mismatch or an explicit error-kind frame
    CorruptFrame { seq: SeqNum },
    /// Admission attempted while the effective window is full
    WindowFull { in_flight: u32, limit: u32 },
    /// Window bookkeeping no longer matches base / next_seq
    Invariant { message: String },
}

impl ArqCoreError {
    /// Create a malformed-frame error
    pub fn malformed(reason: impl Into<String>) -> Self {
        ArqCoreError::MalformedFrame {
            reason: reason.into(),
        }
    }

    /// Create an invariant-violation error
    pub fn invariant(message: impl Into<String>) -> Self {
        ArqCoreError::Invariant {
            message: message.into(),
        }
    }

    /// Check if this is a fatal error that should stop the transfer
    pub fn is_fatal(&self) -> bool {
        matches!(self, ArqCoreError::Invariant { .. })
    }
}

impl fmt::Display for ArqCoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArqCoreError::MalformedFrame { reason } => write!(f, "Malformed frame: {reason}"),
            ArqCoreError::CorruptFrame { seq } => write!(f, "Corrupt frame (seq {seq})"),
            ArqCoreError::WindowFull { in_flight, limit } => {
                write!(f, "Send window full ({in_flight}/{limit} in flight)")
            }
            ArqCoreError::Invariant { message } => write!(f, "Invariant violated: {message}"),
        }
    }
}

impl std::error::Error for ArqCoreError {}
