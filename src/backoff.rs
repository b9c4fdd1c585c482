//! Exponential backoff schedule for the discovery poll interval.
//!
//! The interval doubles per cycle, clamped between a configured floor and
//! ceiling. Once the raw value reaches the ceiling the schedule saturates
//! and stays there. A floor at or above the ceiling disables backoff
//! entirely and every cycle runs at the fixed ceiling interval.

use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Growing(u32),
    Saturated,
}

/// Poll interval schedule, owned by one discovery session.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    initial_secs: u64,
    max_secs: u64,
    state: State,
}

impl BackoffSchedule {
    /// Creates a schedule growing from `initial_secs` towards `max_secs`.
    ///
    /// `initial_secs >= max_secs` yields the disabled, fixed-interval mode.
    pub fn new(initial_secs: u64, max_secs: u64) -> Self {
        Self {
            initial_secs,
            max_secs,
            state: State::Growing(1),
        }
    }

    /// Returns `true` when the schedule runs at a fixed interval.
    pub fn is_disabled(&self) -> bool {
        self.initial_secs >= self.max_secs
    }

    /// Computes the interval for the next poll and advances the schedule.
    ///
    /// Called exactly once per cycle that performed a resolution attempt,
    /// regardless of the attempt's outcome.
    pub fn next_interval(&mut self) -> Duration {
        if self.is_disabled() {
            return Duration::from_secs(self.max_secs);
        }

        match self.state {
            State::Saturated => Duration::from_secs(self.max_secs),
            State::Growing(iteration) => {
                let raw = 2u64.saturating_pow(iteration);
                let interval = raw.min(self.max_secs).max(self.initial_secs);
                if raw >= self.max_secs {
                    debug!(max_secs = self.max_secs, "Backoff saturated at ceiling");
                    self.state = State::Saturated;
                } else {
                    self.state = State::Growing(iteration.saturating_add(1));
                }
                Duration::from_secs(interval)
            }
        }
    }

    /// Restarts growth from the first iteration.
    ///
    /// No-op while backoff is disabled.
    pub fn reset(&mut self) {
        if self.is_disabled() {
            return;
        }
        if self.state != State::Growing(1) {
            debug!("Backoff reset to initial iteration");
        }
        self.state = State::Growing(1);
    }
}
