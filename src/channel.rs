//! Frame-level send/receive over a [`Transport`], with optional fault
//! injection.
//!
//! The channel is where loss and corruption enter the system. Outbound
//! frames may be dropped or damaged before they reach the transport;
//! inbound frames may be dropped after they leave it. Decoding happens here
//! too, so malformed datagrams never reach an engine.

use crate::config::FaultConfig;
use crate::error::{is_closed_kind, ArqError, Result};
use crate::transport::Transport;

use arq_core::protocol::constants;
use arq_core::Frame;
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, trace, warn};

// ── Fault injection ─────────────────────────────────────────────────────

/// Outcome of rolling the outbound dice for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Impairment {
    None,
    Drop,
    Corrupt,
}

struct FaultInjector {
    config: FaultConfig,
    rng: Mutex<StdRng>,
}

impl FaultInjector {
    fn new(config: FaultConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng: Mutex::new(rng),
        }
    }

    fn roll(&self, probability: f64) -> bool {
        if probability <= 0.0 {
            return false;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen::<f64>() < probability
    }

    fn outbound(&self) -> Impairment {
        if self.roll(self.config.loss_probability) {
            Impairment::Drop
        } else if self.roll(self.config.error_probability) {
            Impairment::Corrupt
        } else {
            Impairment::None
        }
    }

    fn drop_inbound(&self) -> bool {
        self.roll(self.config.inbound_loss_probability)
    }

    fn corrupt(&self, frame: &Frame) -> Frame {
        if self.config.substitute_error_frame {
            return Frame::error(frame.seq, frame.ack);
        }

        let mut damaged = frame.clone();
        if frame.payload.is_empty() {
            damaged.checksum ^= 0xFF;
        } else {
            let mut payload = frame.payload.to_vec();
            let index = {
                let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                rng.gen_range(0..payload.len())
            };
            payload[index] ^= 0xFF;
            damaged.payload = Bytes::from(payload);
        }
        damaged
    }
}

// ── Channel ─────────────────────────────────────────────────────────────

/// Frame channel bound to one transport
pub struct Channel<T: Transport> {
    transport: Arc<T>,
    faults: Option<FaultInjector>,
    // one datagram-sized scratch buffer; receives are serialized on it
    recv_buf: tokio::sync::Mutex<Vec<u8>>,
}

impl<T: Transport> Channel<T> {
    pub fn new(transport: Arc<T>, faults: Option<FaultConfig>) -> Self {
        Self {
            transport,
            faults: faults.map(FaultInjector::new),
            recv_buf: tokio::sync::Mutex::new(vec![0u8; constants::MAX_DATAGRAM]),
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn local_addr(&self) -> Result<T::Addr> {
        Ok(self.transport.local_addr()?)
    }

    /// Encode and transmit `frame`. A frame the fault injector drops still
    /// reports success.
    pub async fn send(&self, frame: &Frame, to: &T::Addr) -> Result<()> {
        let impairment = self
            .faults
            .as_ref()
            .map_or(Impairment::None, FaultInjector::outbound);

        let wire = match (impairment, &self.faults) {
            (Impairment::Drop, _) => {
                debug!(seq = frame.seq, ack = frame.ack, to = %to, "Frame lost in transit");
                return Ok(());
            }
            (Impairment::Corrupt, Some(faults)) => {
                debug!(seq = frame.seq, ack = frame.ack, to = %to, "Frame corrupted in transit");
                faults.corrupt(frame).to_bytes()
            }
            _ => frame.to_bytes(),
        };

        trace!(seq = frame.seq, ack = frame.ack, len = wire.len(), to = %to, "Sending frame");
        self.transport
            .send_to(&wire, to)
            .await
            .map_err(map_io_error)?;
        Ok(())
    }

    /// Wait up to `timeout` for one frame.
    ///
    /// Returns `Ok(None)` when the wait times out, when the datagram does not
    /// decode, or when the fault injector drops it on arrival.
    pub async fn receive(&self, timeout: Duration) -> Result<Option<(Frame, T::Addr)>> {
        let recv = async {
            let mut buf = self.recv_buf.lock().await;
            let (n, from) = self.transport.recv_from(&mut buf[..]).await?;
            Ok::<_, io::Error>((Bytes::copy_from_slice(&buf[..n]), from))
        };
        let (datagram, from) = match tokio::time::timeout(timeout, recv).await {
            Err(_elapsed) => return Ok(None),
            Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                // ICMP port unreachable from an earlier send; the peer may not be up yet
                debug!(error = %e, "Peer unreachable");
                return Ok(None);
            }
            Ok(Err(e)) => return Err(map_io_error(e)),
            Ok(Ok(received)) => received,
        };
        let n = datagram.len();

        if self.faults.as_ref().is_some_and(FaultInjector::drop_inbound) {
            debug!(from = %from, len = n, "Frame lost on arrival");
            return Ok(None);
        }

        match Frame::decode(datagram) {
            Ok(frame) => {
                trace!(seq = frame.seq, ack = frame.ack, len = n, from = %from, "Received frame");
                Ok(Some((frame, from)))
            }
            Err(e) => {
                warn!(error = %e, from = %from, len = n, "Discarding malformed datagram");
                Ok(None)
            }
        }
    }
}

fn map_io_error(e: io::Error) -> ArqError {
    if is_closed_kind(e.kind()) {
        ArqError::ChannelClosed
    } else {
        ArqError::Io(e)
    }
}
