//! Idle-timeout detection for the read side.
//!
//! The watchdog owns one timer, armed for the idle duration and pushed
//! forward every time a line is delivered. The session polls
//! [`Watchdog::expired`] in the same `select!` that receives lines, so
//! "reset the timer" and "hand the line to the dispatcher" can never be
//! split by a firing timeout.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep};

use crate::error::SessionEnd;

pub struct Watchdog {
    idle: Duration,
    last_activity: Instant,
    timer: Pin<Box<Sleep>>,
}

impl Watchdog {
    /// Start a watchdog that expires `idle` from now.
    pub fn new(idle: Duration) -> Self {
        let now = Instant::now();
        Self {
            idle,
            last_activity: now,
            timer: Box::pin(tokio::time::sleep_until(now + idle)),
        }
    }

    /// Record inbound activity and re-arm the timer.
    pub fn reset(&mut self) {
        self.last_activity = Instant::now();
        self.timer.as_mut().reset(self.last_activity + self.idle);
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn deadline(&self) -> Instant {
        self.timer.deadline()
    }

    /// Resolves once the connection has been silent for the idle duration.
    pub async fn expired(&mut self) -> SessionEnd {
        self.timer.as_mut().await;
        tracing::warn!(idle_secs = self.idle.as_secs(), "No data received, connection stalled");
        SessionEnd::IdleTimeout(self.idle)
    }
}
