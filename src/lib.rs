//! # arq-tokio: reliable in-order delivery over lossy datagrams
//!
//! A sliding-window ARQ with TCP-style congestion control (slow start,
//! congestion avoidance, fast retransmit on three duplicate ACKs) running
//! on Tokio over any datagram transport.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────┐
//! │  arq-tokio  (this crate)              │
//! │                                       │
//! │  Endpoint                 ← user API  │
//! │  SenderEngine / Receiver  ← loops     │
//! │  timer                    ← RTO       │
//! │  channel                  ← faults    │
//! │  transport                ← I/O       │
//! ├───────────────────────────────────────┤
//! │  arq-core  (dependency)               │
//! │                                       │
//! │  ArqSender / ArqReceiver  ← sync FSMs │
//! │  congestion               ← cwnd law  │
//! │  protocol                 ← wire fmt  │
//! └───────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arq_tokio::{ArqConfig, Endpoint, MemoryTransport};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> arq_tokio::Result<()> {
//!     let (a, b) = MemoryTransport::pair();
//!     let client = Endpoint::new(Arc::new(a), ArqConfig::local())?;
//!     let server = Endpoint::new(Arc::new(b), ArqConfig::local())?;
//!     let server_addr = server.local_addr()?;
//!
//!     let receiving = tokio::spawn(async move { server.receive_all().await });
//!     client.send_all(&server_addr, ["hello", "world", "END"]).await?;
//!
//!     let received = receiving.await.expect("receiver task")?;
//!     assert_eq!(received.len(), 3);
//!     Ok(())
//! }
//! ```

// ── Layer 1: Core protocol (re-exported from arq-core) ─────────────────

/// Core protocol types, constants, and wire format.
pub use arq_core::protocol;

/// Direct access to the standalone `arq-core` crate.
pub use arq_core;

pub use arq_core::{ArqStats, CongestionMode, Frame, FrameKind, SeqNum};

// ── Layer 2: Transport & channel ────────────────────────────────────────

pub mod channel;
pub mod transport;
pub use channel::Channel;
pub use transport::{Addr, MemoryAddr, MemoryTransport, Transport};
#[cfg(feature = "udp")]
pub use transport::UdpTransport;

// ── Layer 3: Configuration & errors (extends core with I/O concerns) ────

pub mod config;
pub mod error;
pub use config::{ArqConfig, FaultConfig};
pub use error::{ArqError, Result};

// ── Layer 4: Engines ────────────────────────────────────────────────────

pub mod endpoint;
pub mod receiver;
pub mod sender;
pub mod timer;
pub use endpoint::Endpoint;
pub use receiver::ReceiverEngine;
pub use sender::{SenderEngine, SenderObserver, SenderSnapshot};
pub use timer::{RetransmitTimer, TimerFired, TimerHandle};

// ── Version info ────────────────────────────────────────────────────────

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
