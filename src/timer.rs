//! Single-shot retransmission timer.
//!
//! Arming spawns a sleep task that posts a [`TimerFired`] event to a queue
//! the owning event loop selects on. Every arm bumps a generation counter,
//! so an event from a timer that was canceled or re-armed after it fired
//! is recognised as stale and rejected by [`RetransmitTimer::accept`].

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Event posted when an armed timer expires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub generation: u64,
}

/// Identifies one arming of the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    generation: u64,
}

impl TimerHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct Armed {
    generation: u64,
    task: JoinHandle<()>,
}

pub struct RetransmitTimer {
    events: mpsc::UnboundedSender<TimerFired>,
    generation: u64,
    armed: Option<Armed>,
}

impl RetransmitTimer {
    /// Create a disarmed timer and the queue its expirations arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                events,
                generation: 0,
                armed: None,
            },
            rx,
        )
    }

    /// Cancel any armed timer and start a new one expiring after `after`.
    pub fn arm(&mut self, after: Duration) -> TimerHandle {
        self.disarm();
        self.generation += 1;

        let generation = self.generation;
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = events.send(TimerFired { generation });
        });

        trace!(generation, after_ms = after.as_millis() as u64, "Timer armed");
        self.armed = Some(Armed { generation, task });
        TimerHandle { generation }
    }

    /// Cancel the timer if `handle` is still the current arming.
    pub fn cancel(&mut self, handle: &TimerHandle) -> bool {
        match &self.armed {
            Some(armed) if armed.generation == handle.generation => self.disarm(),
            _ => false,
        }
    }

    /// Cancel whatever is armed. Returns `true` if a timer was armed.
    pub fn disarm(&mut self) -> bool {
        match self.armed.take() {
            Some(armed) => {
                armed.task.abort();
                trace!(generation = armed.generation, "Timer canceled");
                true
            }
            None => false,
        }
    }

    /// `true` from arming until the expiry is accepted or the timer canceled
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Consume an expiry event. Returns `false` for a stale generation.
    pub fn accept(&mut self, fired: &TimerFired) -> bool {
        match &self.armed {
            Some(armed) if armed.generation == fired.generation => {
                self.armed = None;
                true
            }
            _ => {
                trace!(generation = fired.generation, "Stale timer event");
                false
            }
        }
    }
}

impl Drop for RetransmitTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
