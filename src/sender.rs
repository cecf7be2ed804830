//! Async Sender Engine: drives an [`ArqSender`] over a [`Channel`].
//!
//! One task runs a cooperative loop: admit as many pending messages as the
//! window allows, then wait on whichever comes first of a timer expiry or an
//! inbound frame. The window and timer live together behind one async mutex;
//! each handler computes the frames to transmit under the lock and sends
//! them after releasing it.

use crate::channel::Channel;
use crate::config::ArqConfig;
use crate::error::{ArqError, Result};
use crate::timer::{RetransmitTimer, TimerFired};
use crate::transport::Transport;

use arq_core::{AckOutcome, ArqSender, ArqStats, CongestionMode, Frame, SeqNum, TimerAction};
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, trace, warn};

/// Point-in-time view of the send window and congestion state
#[derive(Debug, Clone, PartialEq)]
pub struct SenderSnapshot {
    pub base: SeqNum,
    pub next_seq: SeqNum,
    pub in_flight: u32,
    pub cwnd: f64,
    pub ssthresh: f64,
    pub duplicate_acks: u32,
    pub mode: CongestionMode,
    pub timer_armed: bool,
}

/// Window state plus the timer that guards it
struct SenderShared {
    sender: ArqSender,
    timer: RetransmitTimer,
    consecutive_timeouts: u32,
}

impl SenderShared {
    fn apply(&mut self, action: TimerAction, timeout: Duration) {
        match action {
            TimerAction::Start | TimerAction::Restart => {
                self.timer.arm(timeout);
            }
            TimerAction::Cancel => {
                self.timer.disarm();
            }
            TimerAction::Unchanged => {}
        }
    }

    fn snapshot(&self) -> SenderSnapshot {
        let cc = self.sender.congestion();
        SenderSnapshot {
            base: self.sender.base(),
            next_seq: self.sender.next_seq(),
            in_flight: self.sender.in_flight(),
            cwnd: cc.cwnd,
            ssthresh: cc.ssthresh,
            duplicate_acks: cc.duplicate_acks,
            mode: cc.mode,
            timer_armed: self.timer.is_armed(),
        }
    }
}

/// Clonable read-only view of a running [`SenderEngine`]
#[derive(Clone)]
pub struct SenderObserver {
    shared: Arc<Mutex<SenderShared>>,
}

impl SenderObserver {
    pub async fn snapshot(&self) -> SenderSnapshot {
        self.shared.lock().await.snapshot()
    }

    pub async fn stats(&self) -> ArqStats {
        self.shared.lock().await.sender.stats().clone()
    }
}

/// Reliable sender bound to one peer
pub struct SenderEngine<T: Transport> {
    channel: Arc<Channel<T>>,
    peer: T::Addr,
    config: ArqConfig,
    shared: Arc<Mutex<SenderShared>>,
    fired_rx: mpsc::UnboundedReceiver<TimerFired>,
}

impl<T: Transport> SenderEngine<T> {
    pub fn new(channel: Arc<Channel<T>>, peer: T::Addr, config: ArqConfig) -> Self {
        let (shared, fired_rx) = Self::fresh_state(&config);
        Self {
            channel,
            peer,
            config,
            shared: Arc::new(Mutex::new(shared)),
            fired_rx,
        }
    }

    fn fresh_state(config: &ArqConfig) -> (SenderShared, mpsc::UnboundedReceiver<TimerFired>) {
        let (timer, fired_rx) = RetransmitTimer::new();
        let shared = SenderShared {
            sender: ArqSender::new(config.core_config()),
            timer,
            consecutive_timeouts: 0,
        };
        (shared, fired_rx)
    }

    pub fn peer(&self) -> &T::Addr {
        &self.peer
    }

    pub async fn snapshot(&self) -> SenderSnapshot {
        self.shared.lock().await.snapshot()
    }

    /// Counters for the current (or most recent) transfer
    pub async fn stats(&self) -> ArqStats {
        self.shared.lock().await.sender.stats().clone()
    }

    pub fn observer(&self) -> SenderObserver {
        SenderObserver {
            shared: self.shared.clone(),
        }
    }

    /// Deliver every message to the peer, in order, and wait until all of
    /// them are acknowledged.
    ///
    /// Each call starts from fresh window and congestion state at sequence
    /// number zero. Messages must be non-empty. An invalid configuration is
    /// rejected before anything is sent.
    pub async fn send_all<I, B>(&mut self, messages: I) -> Result<()>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        self.config.validate()?;
        let mut pending: VecDeque<Bytes> = messages.into_iter().map(Into::into).collect();
        if let Some(index) = pending.iter().position(Bytes::is_empty) {
            return Err(ArqError::protocol(format!(
                "message {index} is empty; empty payloads are reserved for acknowledgments"
            )));
        }

        let (fresh, fired_rx) = Self::fresh_state(&self.config);
        *self.shared.lock().await = fresh;
        self.fired_rx = fired_rx;

        info!(peer = %self.peer, messages = pending.len(), "Transfer started");
        let result = self.run(&mut pending).await;

        let mut shared = self.shared.lock().await;
        shared.timer.disarm();
        let stats = shared.sender.stats();
        match &result {
            Ok(()) => info!(
                peer = %self.peer,
                frames = stats.frames_sent,
                retransmissions = stats.retransmissions,
                fast_retransmissions = stats.fast_retransmissions,
                timeouts = stats.timeouts,
                "Transfer complete"
            ),
            Err(e) => warn!(
                peer = %self.peer,
                error = %e,
                base = shared.sender.base(),
                "Transfer failed"
            ),
        }
        result
    }

    async fn run(&mut self, pending: &mut VecDeque<Bytes>) -> Result<()> {
        loop {
            self.admit_pending(pending).await?;

            if pending.is_empty() && self.shared.lock().await.sender.is_idle() {
                return Ok(());
            }

            tokio::select! {
                biased;

                fired = self.fired_rx.recv() => {
                    let fired = fired
                        .ok_or_else(|| ArqError::internal("retransmission timer queue closed"))?;
                    self.on_timer(fired).await?;
                }

                received = self.channel.receive(self.config.timeout_interval) => {
                    if let Some((frame, from)) = received? {
                        self.on_frame(frame, from).await?;
                    }
                }
            }
        }
    }

    async fn admit_pending(&self, pending: &mut VecDeque<Bytes>) -> Result<()> {
        let frames = {
            let mut shared = self.shared.lock().await;
            let mut frames = Vec::new();
            while shared.sender.can_admit() {
                let Some(payload) = pending.pop_front() else {
                    break;
                };
                let (frame, action) = shared.sender.admit(payload)?;
                shared.apply(action, self.config.timeout_interval);
                frames.push(frame);
            }
            frames
        };

        self.transmit(&frames).await
    }

    async fn on_frame(&self, frame: Frame, from: T::Addr) -> Result<()> {
        if from != self.peer {
            trace!(from = %from, "Frame from unexpected source ignored");
            return Ok(());
        }

        let retransmit = {
            let mut shared = self.shared.lock().await;
            if frame.is_corrupt() {
                shared.sender.discard(&frame);
                return Ok(());
            }
            if !frame.is_ack() {
                trace!(seq = frame.seq, "Data frame ignored while sending");
                return Ok(());
            }

            match shared.sender.on_ack(frame.ack)? {
                AckOutcome::Advanced { timer, .. } => {
                    shared.consecutive_timeouts = 0;
                    shared.apply(timer, self.config.timeout_interval);
                    None
                }
                AckOutcome::FastRetransmit { frame } => Some(frame),
                AckOutcome::Duplicate { count } => {
                    debug!(ack = frame.ack, count, "Duplicate ACK");
                    None
                }
                AckOutcome::Ignored => None,
            }
        };

        match retransmit {
            Some(frame) => self.transmit(std::slice::from_ref(&frame)).await,
            None => Ok(()),
        }
    }

    async fn on_timer(&self, fired: TimerFired) -> Result<()> {
        let frames = {
            let mut shared = self.shared.lock().await;
            if !shared.timer.accept(&fired) {
                return Ok(());
            }

            let frames = shared.sender.on_timeout();
            if frames.is_empty() {
                return Ok(());
            }

            shared.consecutive_timeouts += 1;
            if let Some(max) = self.config.max_retries {
                if shared.consecutive_timeouts > max {
                    return Err(ArqError::RetriesExhausted { retries: max });
                }
            }

            shared.timer.arm(self.config.timeout_interval);
            frames
        };

        self.transmit(&frames).await
    }

    async fn transmit(&self, frames: &[Frame]) -> Result<()> {
        for frame in frames {
            self.channel.send(frame, &self.peer).await?;
        }
        Ok(())
    }
}
