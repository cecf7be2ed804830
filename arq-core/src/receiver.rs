//! Receive-side in-order delivery.
//!
//! Only the frame whose sequence number equals `expected` is accepted.
//! Everything else valid is answered with a duplicate acknowledgment of
//! `expected - 1` so the sender can detect the gap.

use crate::config::ArqCoreConfig;
use crate::protocol::{Frame, SeqNum};
use crate::stats::ArqStats;

use bytes::Bytes;
use tracing::{debug, trace};

/// What the receiver did with one incoming frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Payload appended in order; acknowledge `ack`
    Delivered { ack: SeqNum, end_of_stream: bool },
    /// Not the expected frame; re-acknowledge the last in-order frame
    OutOfOrder { ack: SeqNum },
    /// Failed integrity check; no acknowledgment
    Discarded,
    /// Empty payload, not a data frame; no acknowledgment
    Ignored,
}

impl ReceiveOutcome {
    /// Acknowledgment number to send back, if any
    pub fn ack(&self) -> Option<SeqNum> {
        match self {
            ReceiveOutcome::Delivered { ack, .. } | ReceiveOutcome::OutOfOrder { ack } => Some(*ack),
            ReceiveOutcome::Discarded | ReceiveOutcome::Ignored => None,
        }
    }
}

/// Receive-side protocol state for one transfer
#[derive(Debug)]
pub struct ArqReceiver {
    end_marker: Bytes,
    expected: SeqNum,
    received: Vec<Bytes>,
    finished: bool,
    stats: ArqStats,
}

impl ArqReceiver {
    pub fn new(config: &ArqCoreConfig) -> Self {
        Self {
            end_marker: config.end_marker.clone(),
            expected: 0,
            received: Vec::new(),
            finished: false,
            stats: ArqStats::default(),
        }
    }

    /// Next in-order sequence number
    pub fn expected(&self) -> SeqNum {
        self.expected
    }

    /// Payloads delivered so far, in sequence order
    pub fn received(&self) -> &[Bytes] {
        &self.received
    }

    pub fn into_received(self) -> Vec<Bytes> {
        self.received
    }

    /// `true` once the end-of-stream marker has been delivered in order
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stats(&self) -> &ArqStats {
        &self.stats
    }

    /// Apply one decoded frame.
    pub fn on_frame(&mut self, frame: &Frame) -> ReceiveOutcome {
        if let Err(e) = frame.check() {
            self.stats.corrupt_dropped += 1;
            debug!(error = %e, "Frame discarded");
            return ReceiveOutcome::Discarded;
        }

        if frame.is_ack() {
            trace!(ack = frame.ack, "Stray acknowledgment ignored");
            return ReceiveOutcome::Ignored;
        }

        self.stats.acks_sent += 1;

        if frame.seq != self.expected || self.finished {
            self.stats.out_of_order += 1;
            let ack = self.expected.wrapping_sub(1);
            debug!(seq = frame.seq, expected = self.expected, ack, "Out-of-order frame");
            return ReceiveOutcome::OutOfOrder { ack };
        }

        let end_of_stream = frame.is_end_of_stream(&self.end_marker);
        self.stats.frames_delivered += 1;
        self.stats.bytes_received += frame.payload.len() as u64;
        self.received.push(frame.payload.clone());

        let ack = self.expected;
        self.expected = self.expected.wrapping_add(1);
        if end_of_stream {
            self.finished = true;
            debug!(seq = ack, delivered = self.received.len(), "End of stream");
        } else {
            trace!(seq = ack, "Frame delivered");
        }

        ReceiveOutcome::Delivered { ack, end_of_stream }
    }
}
