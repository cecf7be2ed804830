//! Send-side window state machine.
//!
//! [`ArqSender`] owns the in-flight window and the congestion controller for
//! one logical transfer. It decides what to (re)transmit and when the
//! retransmission timer should move; all socket I/O and the timer itself are
//! the caller's responsibility.
//!
//! ```text
//!      base              next_seq
//!       │                   │
//!  ─────┼───────────────────┼──────────────▶ seq space
//!       │ <── in flight ──▶ │ <── admissible while
//!                                 in_flight < min(window_size, floor(cwnd))
//! ```

use crate::config::ArqCoreConfig;
use crate::congestion::{CongestionController, CongestionState};
use crate::error::{ArqCoreError, ArqCoreResult};
use crate::protocol::{Frame, SeqNum};
use crate::stats::ArqStats;

use bytes::Bytes;
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// A frame awaiting acknowledgment
#[derive(Debug, Clone)]
pub struct InFlight {
    pub frame: Frame,
    /// Total number of times this frame has been transmitted
    pub transmissions: u32,
}

/// What the caller must do with the retransmission timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Window went from empty to non-empty
    Start,
    /// Base advanced and frames remain in flight
    Restart,
    /// Window drained
    Cancel,
    /// Leave the timer as it is
    Unchanged,
}

/// Result of feeding one acknowledgment number to the sender
#[derive(Debug, Clone, PartialEq)]
pub enum AckOutcome {
    /// New cumulative progress
    Advanced { acked: u32, timer: TimerAction },
    /// Acknowledgment of `base - 1` below the fast retransmit threshold
    Duplicate { count: u32 },
    /// Threshold reached: resend this frame immediately
    FastRetransmit { frame: Frame },
    /// Stale or out-of-window acknowledgment
    Ignored,
}

/// Send-side protocol state for one transfer
#[derive(Debug)]
pub struct ArqSender {
    config: ArqCoreConfig,
    base: SeqNum,
    next_seq: SeqNum,
    window: VecDeque<InFlight>,
    congestion: CongestionController,
    stats: ArqStats,
}

impl ArqSender {
    /// Fresh transfer state: `base = next_seq = 0`, `cwnd = 1`
    pub fn new(config: ArqCoreConfig) -> Self {
        let congestion =
            CongestionController::new(config.initial_ssthresh, config.dup_ack_threshold);
        Self {
            window: VecDeque::with_capacity(config.window_size as usize),
            config,
            base: 0,
            next_seq: 0,
            congestion,
            stats: ArqStats::default(),
        }
    }

    /// Oldest unacknowledged sequence number
    pub fn base(&self) -> SeqNum {
        self.base
    }

    /// Sequence number the next admitted frame receives
    pub fn next_seq(&self) -> SeqNum {
        self.next_seq
    }

    /// Frames currently awaiting acknowledgment
    pub fn in_flight(&self) -> u32 {
        self.next_seq - self.base
    }

    /// `true` when nothing is awaiting acknowledgment
    pub fn is_idle(&self) -> bool {
        self.base == self.next_seq
    }

    pub fn congestion(&self) -> CongestionState {
        self.congestion.state()
    }

    pub fn stats(&self) -> &ArqStats {
        &self.stats
    }

    pub fn config(&self) -> &ArqCoreConfig {
        &self.config
    }

    /// Admission limit: the lesser of the flow-control and congestion windows
    pub fn effective_window(&self) -> u32 {
        self.config
            .window_size
            .min(self.congestion.admitted_frames())
    }

    /// `true` when `next_seq < base + min(window_size, floor(cwnd))`
    pub fn can_admit(&self) -> bool {
        self.in_flight() < self.effective_window()
    }

    /// In-flight frames from oldest to newest
    pub fn window_entries(&self) -> impl Iterator<Item = &InFlight> {
        self.window.iter()
    }

    /// Frame `payload` at `next_seq` and place it in the window.
    ///
    /// The caller transmits the returned frame and applies the timer action.
    pub fn admit(&mut self, payload: Bytes) -> ArqCoreResult<(Frame, TimerAction)> {
        let limit = self.effective_window();
        let in_flight = self.in_flight();
        if in_flight >= limit {
            return Err(ArqCoreError::WindowFull { in_flight, limit });
        }

        let seq = self.next_seq;
        let next = seq
            .checked_add(1)
            .ok_or_else(|| ArqCoreError::invariant("sequence space exhausted"))?;

        let timer = if self.window.is_empty() {
            TimerAction::Start
        } else {
            TimerAction::Unchanged
        };

        let frame = Frame::data(seq, payload);
        self.stats.frames_sent += 1;
        self.stats.bytes_sent += frame.payload.len() as u64;
        self.window.push_back(InFlight {
            frame: frame.clone(),
            transmissions: 1,
        });
        self.next_seq = next;

        trace!(seq, in_flight = self.in_flight(), limit, "Frame admitted");
        Ok((frame, timer))
    }

    /// Process the acknowledgment number of a valid ACK frame.
    pub fn on_ack(&mut self, ack: SeqNum) -> ArqCoreResult<AckOutcome> {
        if ack >= self.base && ack < self.next_seq {
            return self.advance(ack + 1);
        }

        if ack == self.base.wrapping_sub(1) && !self.window.is_empty() {
            self.stats.acks_received += 1;
            self.stats.duplicate_acks += 1;

            if self.congestion.on_duplicate_ack() {
                if let Some(oldest) = self.window.front_mut() {
                    oldest.transmissions += 1;
                    self.stats.retransmissions += 1;
                    self.stats.fast_retransmissions += 1;

                    let state = self.congestion.state();
                    warn!(
                        seq = oldest.frame.seq,
                        cwnd = state.cwnd,
                        ssthresh = state.ssthresh,
                        "Fast retransmit"
                    );
                    return Ok(AckOutcome::FastRetransmit {
                        frame: oldest.frame.clone(),
                    });
                }
            }

            return Ok(AckOutcome::Duplicate {
                count: self.congestion.duplicate_acks(),
            });
        }

        trace!(ack, base = self.base, next_seq = self.next_seq, "Stale ACK ignored");
        Ok(AckOutcome::Ignored)
    }

    /// Record an inbound frame that failed the integrity check
    pub fn discard(&mut self, frame: &Frame) {
        self.stats.corrupt_dropped += 1;
        debug!(seq = frame.seq, ack = frame.ack, "Corrupt ACK discarded");
    }

    /// The retransmission timer fired: collapse the congestion window and
    /// hand back every in-flight frame. `base` does not move.
    pub fn on_timeout(&mut self) -> Vec<Frame> {
        if self.window.is_empty() {
            return Vec::new();
        }

        self.congestion.on_timeout();
        self.stats.timeouts += 1;

        let frames: Vec<Frame> = self
            .window
            .iter_mut()
            .map(|entry| {
                entry.transmissions += 1;
                entry.frame.clone()
            })
            .collect();
        self.stats.retransmissions += frames.len() as u64;

        warn!(
            base = self.base,
            next_seq = self.next_seq,
            frames = frames.len(),
            "Retransmission timeout"
        );
        frames
    }

    fn advance(&mut self, new_base: SeqNum) -> ArqCoreResult<AckOutcome> {
        let acked = new_base - self.base;
        for _ in 0..acked {
            match self.window.pop_front() {
                Some(entry) if entry.frame.seq < new_base => {}
                Some(entry) => {
                    return Err(ArqCoreError::invariant(format!(
                        "in-flight frame {} is not below acknowledged base {}",
                        entry.frame.seq, new_base
                    )));
                }
                None => {
                    return Err(ArqCoreError::invariant(format!(
                        "window underflow acknowledging {} frames from base {}",
                        acked, self.base
                    )));
                }
            }
        }

        self.base = new_base;
        self.stats.acks_received += 1;
        self.congestion.on_new_ack();
        debug_assert_eq!(self.window.len() as u32, self.in_flight());

        let timer = if self.is_idle() {
            TimerAction::Cancel
        } else {
            TimerAction::Restart
        };

        debug!(
            base = self.base,
            acked,
            cwnd = self.congestion.cwnd(),
            "Window advanced"
        );
        Ok(AckOutcome::Advanced { acked, timer })
    }
}
