//! Sleep quantum used by the polling loops.

use std::time::Duration;

/// Blocks the calling flow between two polls.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Real wall-clock sleep.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Returns immediately; keeps poll loops deterministic in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSleep;

impl Sleeper for NoSleep {
    fn sleep(&self, _duration: Duration) {}
}

/// Remaining time budget of a poll loop.
///
/// The budget is decremented by the sleep quantum on every poll rather
/// than measured against the wall clock, so the number of samples is a
/// function of budget and interval alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    remaining: Duration,
}

impl Budget {
    pub fn new(total: Duration) -> Self {
        Self { remaining: total }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_zero()
    }

    pub fn spend(&mut self, quantum: Duration) {
        self.remaining = self.remaining.saturating_sub(quantum);
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }
}
