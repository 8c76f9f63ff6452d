use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

/// Minimum spacing between outbound frames.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(200);

/// Enforces a minimum gap between the end of one send and the start of the next.
///
/// The lock covers only the timestamp; waiting happens outside it.
#[derive(Debug)]
pub struct Pacer {
    min_interval: Duration,
    last_send: Mutex<Option<Instant>>,
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_send: Mutex::new(None),
        }
    }

    /// Time left before the next send may start.
    pub fn remaining(&self) -> Duration {
        let last_send = *self.last_send.lock().unwrap_or_else(PoisonError::into_inner);
        last_send
            .map(|at| self.min_interval.saturating_sub(at.elapsed()))
            .unwrap_or(Duration::ZERO)
    }

    /// Block until the minimum interval since the last send has elapsed.
    pub fn wait_turn(&self) {
        loop {
            let remaining = self.remaining();
            if remaining.is_zero() {
                return;
            }
            trace!(?remaining, "pacing");
            std::thread::sleep(remaining);
        }
    }

    /// Record that a send just finished.
    pub fn mark_sent(&self) {
        *self.last_send.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }
}
