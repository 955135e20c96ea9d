//! Fixed-timestep accumulator.
//!
//! Wall-clock time is accumulated and paid out in whole steps only. A late
//! wakeup produces several steps in one batch; a remainder smaller than one
//! step carries over to the next call.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: Duration,
    accumulator: Duration,
    last: Instant,
}

impl FixedTimestep {
    pub fn new(tick_hz: u32, now: Instant) -> Self {
        Self {
            step: Duration::from_nanos(1_000_000_000 / u64::from(tick_hz.max(1))),
            accumulator: Duration::ZERO,
            last: now,
        }
    }

    /// Length of one step.
    pub fn step(&self) -> Duration {
        self.step
    }

    /// Time accrued but not yet paid out as a step.
    pub fn pending(&self) -> Duration {
        self.accumulator
    }

    /// Accrues time up to `now` and returns how many whole steps are due.
    pub fn advance(&mut self, now: Instant) -> u32 {
        self.accumulator += now.saturating_duration_since(self.last);
        self.last = now;

        let mut steps = 0;
        while self.accumulator >= self.step {
            self.accumulator -= self.step;
            steps += 1;
        }
        steps
    }
}
