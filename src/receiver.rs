//! Async Receiver Engine: drives an [`ArqReceiver`] over a [`Channel`].
//!
//! Frames are fed to the state machine as they arrive and every
//! acknowledgment goes back to the frame's source. Once the end-of-stream
//! marker is delivered the engine lingers, re-acknowledging retransmissions
//! so the sender is not stranded by a lost final ACK.

use crate::channel::Channel;
use crate::config::ArqConfig;
use crate::error::{ArqError, Result};
use crate::transport::Transport;

use arq_core::{ArqReceiver, ArqStats, Frame, ReceiveOutcome};
use bytes::Bytes;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Reliable receiver for one transfer at a time
pub struct ReceiverEngine<T: Transport> {
    channel: Arc<Channel<T>>,
    config: ArqConfig,
    stats: ArqStats,
}

impl<T: Transport> ReceiverEngine<T> {
    pub fn new(channel: Arc<Channel<T>>, config: ArqConfig) -> Self {
        Self {
            channel,
            config,
            stats: ArqStats::default(),
        }
    }

    /// Counters for the most recent transfer
    pub fn stats(&self) -> &ArqStats {
        &self.stats
    }

    /// Receive one stream, up to and including the end-of-stream marker.
    pub async fn receive_all(&mut self) -> Result<Vec<Bytes>> {
        self.receive_from().await.map(|(data, _)| data)
    }

    /// Like [`receive_all`](Self::receive_all), also returning the address
    /// the stream came from.
    pub async fn receive_from(&mut self) -> Result<(Vec<Bytes>, T::Addr)> {
        self.config.validate()?;
        let mut receiver = ArqReceiver::new(&self.config.core_config());
        let result = self.run(&mut receiver).await;
        self.stats = receiver.stats().clone();

        let peer = result?;
        info!(
            peer = %peer,
            delivered = receiver.received().len(),
            out_of_order = self.stats.out_of_order,
            corrupt = self.stats.corrupt_dropped,
            "Stream received"
        );
        Ok((receiver.into_received(), peer))
    }

    async fn run(&self, receiver: &mut ArqReceiver) -> Result<T::Addr> {
        let poll = self.config.timeout_interval;
        let mut last_heard = Instant::now();

        let peer = loop {
            let Some((frame, from)) = self.channel.receive(poll).await? else {
                if let Some(limit) = self.config.receive_timeout {
                    if last_heard.elapsed() >= limit {
                        return Err(ArqError::timeout(limit.as_millis() as u64));
                    }
                }
                continue;
            };
            last_heard = Instant::now();

            if self.handle(receiver, &frame, &from).await? {
                break from;
            }
        };

        self.linger(receiver).await?;
        Ok(peer)
    }

    /// Apply one frame and acknowledge it. Returns `true` when this frame
    /// completed the stream.
    async fn handle(
        &self,
        receiver: &mut ArqReceiver,
        frame: &Frame,
        from: &T::Addr,
    ) -> Result<bool> {
        let outcome = receiver.on_frame(frame);
        if let Some(ack) = outcome.ack() {
            self.channel.send(&Frame::ack(ack), from).await?;
        }
        Ok(matches!(
            outcome,
            ReceiveOutcome::Delivered {
                end_of_stream: true,
                ..
            }
        ))
    }

    async fn linger(&self, receiver: &mut ArqReceiver) -> Result<()> {
        let linger = self.config.effective_linger();
        if linger.is_zero() {
            return Ok(());
        }

        let deadline = Instant::now() + linger;
        debug!(linger_ms = linger.as_millis() as u64, "Lingering for retransmissions");
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }

            let (frame, from) = match self.channel.receive(remaining).await {
                Ok(Some(received)) => received,
                Ok(None) => continue,
                Err(e) if e.is_closed() => return Ok(()),
                Err(e) => return Err(e),
            };

            match self.handle(receiver, &frame, &from).await {
                Ok(_) => {}
                Err(e) if e.is_closed() => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }
}
