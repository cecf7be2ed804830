//! Configuration types for the ARQ runtime.
//!
//! [`ArqConfig`] extends the core [`ArqCoreConfig`] with timing settings
//! (retransmission timeout, receiver linger, retry limit) and optional
//! fault injection for the channel.

use crate::error::{ArqError, Result};
use arq_core::protocol::constants;
use arq_core::ArqCoreConfig;
use bytes::Bytes;
use std::time::Duration;

// ── FaultConfig ─────────────────────────────────────────────────────────

/// Randomized channel impairments, for tests and demos
#[derive(Debug, Clone, PartialEq)]
pub struct FaultConfig {
    /// Probability an outbound frame is silently dropped
    pub loss_probability: f64,
    /// Probability a received frame is dropped before the engine sees it
    pub inbound_loss_probability: f64,
    /// Probability an outbound frame is corrupted
    pub error_probability: f64,
    /// Corrupt by sending an `error`-kind frame instead of flipping a byte
    pub substitute_error_frame: bool,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            loss_probability: 0.0,
            inbound_loss_probability: 0.0,
            error_probability: 0.0,
            substitute_error_frame: true,
            seed: None,
        }
    }
}

impl FaultConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loss(mut self, probability: f64) -> Self {
        self.loss_probability = probability;
        self
    }

    pub fn inbound_loss(mut self, probability: f64) -> Self {
        self.inbound_loss_probability = probability;
        self
    }

    pub fn error(mut self, probability: f64) -> Self {
        self.error_probability = probability;
        self
    }

    pub fn substitute_error_frame(mut self, enabled: bool) -> Self {
        self.substitute_error_frame = enabled;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, p) in [
            ("loss_probability", self.loss_probability),
            ("inbound_loss_probability", self.inbound_loss_probability),
            ("error_probability", self.error_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ArqError::config(format!(
                    "{name} must be within [0, 1], got {p}"
                )));
            }
        }
        Ok(())
    }
}

// ── ArqConfig ───────────────────────────────────────────────────────────

/// Full ARQ configuration: protocol settings plus runtime settings.
#[derive(Debug, Clone)]
pub struct ArqConfig {
    // Protocol settings (forwarded to the arq-core state machines)
    pub window_size: u32,
    pub initial_ssthresh: f64,
    pub dup_ack_threshold: u32,
    pub end_marker: Bytes,

    // Runtime settings (used only by the event loops)
    pub timeout_interval: Duration,
    pub max_retries: Option<u32>,
    /// Post-stream linger; `None` means three retransmission timeouts
    pub linger: Option<Duration>,
    pub receive_timeout: Option<Duration>,
    pub faults: Option<FaultConfig>,
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self {
            window_size: constants::DEFAULT_WINDOW_SIZE,
            initial_ssthresh: constants::DEFAULT_SSTHRESH,
            dup_ack_threshold: constants::DUP_ACK_THRESHOLD,
            end_marker: Bytes::from_static(constants::END_OF_STREAM),
            timeout_interval: Duration::from_secs(1),
            max_retries: None,
            linger: None,
            receive_timeout: None,
            faults: None,
        }
    }
}

/// Extracts the protocol-only fields the state machines read.
impl From<&ArqConfig> for ArqCoreConfig {
    fn from(c: &ArqConfig) -> Self {
        ArqCoreConfig::new()
            .window_size(c.window_size)
            .initial_ssthresh(c.initial_ssthresh)
            .dup_ack_threshold(c.dup_ack_threshold)
            .end_marker(c.end_marker.clone())
    }
}

// ── Builder methods ─────────────────────────────────────────────────────

impl ArqConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Protocol tuning --

    pub fn window_size(mut self, frames: u32) -> Self {
        self.window_size = frames;
        self
    }

    pub fn initial_ssthresh(mut self, ssthresh: f64) -> Self {
        self.initial_ssthresh = ssthresh;
        self
    }

    pub fn dup_ack_threshold(mut self, threshold: u32) -> Self {
        self.dup_ack_threshold = threshold;
        self
    }

    pub fn end_marker(mut self, marker: impl Into<Bytes>) -> Self {
        self.end_marker = marker.into();
        self
    }

    // -- Runtime tuning --

    pub fn timeout_interval(mut self, timeout: Duration) -> Self {
        self.timeout_interval = timeout;
        self
    }

    pub fn max_retries(mut self, retries: Option<u32>) -> Self {
        self.max_retries = retries;
        self
    }

    /// How long a receiver keeps re-acknowledging after the stream ends
    pub fn linger(mut self, linger: Duration) -> Self {
        self.linger = Some(linger);
        self
    }

    /// Linger actually applied: the explicit value, else three timeouts
    pub fn effective_linger(&self) -> Duration {
        self.linger
            .unwrap_or(self.timeout_interval * constants::LINGER_TIMEOUTS)
    }

    /// Fail a receive that hears nothing for this long before the stream ends
    pub fn receive_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.receive_timeout = timeout;
        self
    }

    pub fn faults(mut self, faults: FaultConfig) -> Self {
        self.faults = Some(faults);
        self
    }

    pub fn core_config(&self) -> ArqCoreConfig {
        ArqCoreConfig::from(self)
    }

    // -- Validation --

    pub fn validate(&self) -> Result<()> {
        self.core_config()
            .validate()
            .map_err(|e| ArqError::config(e.to_string()))?;
        if self.timeout_interval.is_zero() {
            return Err(ArqError::config("Timeout interval must be greater than 0"));
        }
        if self.receive_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ArqError::config("Receive timeout must be greater than 0"));
        }
        if self.max_retries == Some(0) {
            return Err(ArqError::config("Max retries must be greater than 0"));
        }
        if let Some(faults) = &self.faults {
            faults.validate()?;
        }
        Ok(())
    }
}

// ── Presets ──────────────────────────────────────────────────────────────

impl ArqConfig {
    /// Channel that drops and corrupts outbound frames at the given rates
    pub fn lossy(loss_probability: f64, error_probability: f64) -> Self {
        Self::default().faults(
            FaultConfig::new()
                .loss(loss_probability)
                .error(error_probability),
        )
    }

    /// Short timers for loopback and in-process transports
    pub fn local() -> Self {
        Self::default().timeout_interval(Duration::from_millis(50))
    }
}
