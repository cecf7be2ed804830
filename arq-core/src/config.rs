//! Configuration types for the ARQ core protocol engine

use crate::error::{ArqCoreError, ArqCoreResult};
use crate::protocol::constants;
use bytes::Bytes;

/// Core protocol configuration
#[derive(Debug, Clone)]
pub struct ArqCoreConfig {
    /// Flow-control window: maximum frames in flight regardless of cwnd
    pub window_size: u32,
    /// Initial slow start threshold
    pub initial_ssthresh: f64,
    /// Duplicate ACKs that trigger a fast retransmit
    pub dup_ack_threshold: u32,
    /// Payload that terminates the receiver when delivered in order
    pub end_marker: Bytes,
}

impl Default for ArqCoreConfig {
    fn default() -> Self {
        Self {
            window_size: constants::DEFAULT_WINDOW_SIZE,
            initial_ssthresh: constants::DEFAULT_SSTHRESH,
            dup_ack_threshold: constants::DUP_ACK_THRESHOLD,
            end_marker: Bytes::from_static(constants::END_OF_STREAM),
        }
    }
}

impl ArqCoreConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flow-control window
    pub fn window_size(mut self, frames: u32) -> Self {
        self.window_size = frames;
        self
    }

    /// Set the initial slow start threshold
    pub fn initial_ssthresh(mut self, ssthresh: f64) -> Self {
        self.initial_ssthresh = ssthresh;
        self
    }

    /// Set the duplicate-ACK threshold for fast retransmit
    pub fn dup_ack_threshold(mut self, threshold: u32) -> Self {
        self.dup_ack_threshold = threshold;
        self
    }

    /// Set the end-of-stream marker
    pub fn end_marker(mut self, marker: impl Into<Bytes>) -> Self {
        self.end_marker = marker.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> ArqCoreResult<()> {
        if self.window_size == 0 {
            return Err(ArqCoreError::invariant("window size must be at least 1"));
        }
        if self.initial_ssthresh.is_nan() || self.initial_ssthresh < constants::MIN_SSTHRESH {
            return Err(ArqCoreError::invariant(
                "initial slow start threshold must be at least 1",
            ));
        }
        if self.dup_ack_threshold == 0 {
            return Err(ArqCoreError::invariant(
                "duplicate ACK threshold must be at least 1",
            ));
        }
        if self.end_marker.is_empty() {
            return Err(ArqCoreError::invariant(
                "end-of-stream marker must not be empty",
            ));
        }
        Ok(())
    }
}
