//! Error types for the async ARQ runtime.
//!
//! [`ArqError`] extends [`arq_core::ArqCoreError`] with I/O, channel,
//! retry and config variants needed by the event loops.

use arq_core::ArqCoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArqError>;

// ── Error types ─────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ArqError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] ArqCoreError),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Channel receive timed out after {timeout_ms}ms")]
    ChannelTimeout { timeout_ms: u64 },

    #[error("Gave up after {retries} consecutive retransmission timeouts")]
    RetriesExhausted { retries: u32 },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

// ── Constructors ────────────────────────────────────────────────────────

impl ArqError {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self::ChannelTimeout { timeout_ms }
    }
}

// ── Classification ──────────────────────────────────────────────────────

impl ArqError {
    /// Transient failures the event loops absorb and retry past
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            Self::Frame(e) => !e.is_fatal(),
            Self::ChannelTimeout { .. } => true,
            _ => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            Self::ChannelClosed => true,
            Self::Io(e) => is_closed_kind(e.kind()),
            _ => false,
        }
    }
}

/// I/O error kinds that mean the transport is gone for good
pub(crate) fn is_closed_kind(kind: std::io::ErrorKind) -> bool {
    matches!(
        kind,
        std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::UnexpectedEof
    )
}
