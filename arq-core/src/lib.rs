//! Pure synchronous ARQ protocol engine.
//!
//! This crate implements the reliability core with zero runtime
//! dependencies: no tokio, no async, no I/O. It only depends on `bytes`
//! and `tracing`.
//!
//! ```text
//! ┌─────────────────────────────────┐
//! │  arq-core                       │
//! │                                 │
//! │  protocol    ← wire frames      │
//! │  congestion  ← cwnd / ssthresh  │
//! │  sender      ← send window      │
//! │  receiver    ← cumulative ACKs  │
//! │  config      ← tuning           │
//! │  error       ← 4 variants       │
//! └─────────────────────────────────┘
//! ```
//!
//! The state machines never touch a socket. Callers feed them frames and
//! timer expirations and transmit whatever frames they hand back.

pub mod config;
pub mod congestion;
pub mod error;
pub mod protocol;
pub mod receiver;
pub mod sender;
pub mod stats;

pub use config::ArqCoreConfig;
pub use congestion::{CongestionController, CongestionMode, CongestionState};
pub use error::{ArqCoreError, ArqCoreResult};
pub use protocol::*;
pub use receiver::{ArqReceiver, ReceiveOutcome};
pub use sender::{AckOutcome, ArqSender, InFlight, TimerAction};
pub use stats::ArqStats;
