//! Slow start / congestion avoidance / fast retransmit window law
//!
//! The controller is pure state: it never sees frames, only the three events
//! the sender classifies for it (new cumulative ACK, duplicate ACK, timer
//! expiry). `cwnd` is kept as a real number; the sender admits
//! `floor(cwnd)` frames.

use crate::protocol::constants;

/// Growth regime, derived from `cwnd` and `ssthresh`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CongestionMode {
    /// `cwnd < ssthresh`: +1 per new ACK
    SlowStart,
    /// `cwnd >= ssthresh`: +1/cwnd per new ACK
    CongestionAvoidance,
}

/// Point-in-time copy of the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CongestionState {
    pub cwnd: f64,
    pub ssthresh: f64,
    pub duplicate_acks: u32,
    pub mode: CongestionMode,
}

/// Congestion window state machine for one connection
#[derive(Debug, Clone)]
pub struct CongestionController {
    cwnd: f64,
    ssthresh: f64,
    dup_acks: u32,
    dup_threshold: u32,
}

impl CongestionController {
    /// Start in slow start with `cwnd = 1`
    pub fn new(initial_ssthresh: f64, dup_threshold: u32) -> Self {
        Self {
            cwnd: constants::MIN_CWND,
            ssthresh: initial_ssthresh.max(constants::MIN_SSTHRESH),
            dup_acks: 0,
            dup_threshold: dup_threshold.max(1),
        }
    }

    pub fn cwnd(&self) -> f64 {
        self.cwnd
    }

    pub fn ssthresh(&self) -> f64 {
        self.ssthresh
    }

    pub fn duplicate_acks(&self) -> u32 {
        self.dup_acks
    }

    pub fn mode(&self) -> CongestionMode {
        if self.cwnd < self.ssthresh {
            CongestionMode::SlowStart
        } else {
            CongestionMode::CongestionAvoidance
        }
    }

    pub fn state(&self) -> CongestionState {
        CongestionState {
            cwnd: self.cwnd,
            ssthresh: self.ssthresh,
            duplicate_acks: self.dup_acks,
            mode: self.mode(),
        }
    }

    /// Frames the congestion window admits into flight (floor of `cwnd`)
    #[inline]
    pub fn admitted_frames(&self) -> u32 {
        // cwnd >= 1, so the floor is never zero
        self.cwnd.floor().min(u32::MAX as f64) as u32
    }

    /// A cumulative ACK advanced `base`
    pub fn on_new_ack(&mut self) {
        self.dup_acks = 0;
        match self.mode() {
            CongestionMode::SlowStart => self.cwnd += 1.0,
            CongestionMode::CongestionAvoidance => self.cwnd += 1.0 / self.cwnd,
        }
    }

    /// An ACK for `base - 1` arrived. Returns `true` exactly when the
    /// threshold is reached and the oldest frame must be resent now.
    pub fn on_duplicate_ack(&mut self) -> bool {
        self.dup_acks = self.dup_acks.saturating_add(1);
        if self.dup_acks != self.dup_threshold {
            return false;
        }

        self.ssthresh = (self.cwnd / 2.0).max(constants::MIN_SSTHRESH);
        self.cwnd = self.ssthresh + self.dup_threshold as f64;
        true
    }

    /// The retransmission timer fired
    pub fn on_timeout(&mut self) {
        self.ssthresh = (self.cwnd / 2.0).max(constants::MIN_SSTHRESH);
        self.cwnd = constants::MIN_CWND;
        self.dup_acks = 0;
    }
}
