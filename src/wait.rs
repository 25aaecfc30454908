//! Caller-side wait strategies.
//!
//! The ring buffer itself never waits: [`Producer::enqueue`] and
//! [`Consumer::dequeue`] return immediately when the buffer is full or empty.
//! Whatever should happen between two failed attempts is a policy of the
//! caller, expressed here as a [`WaitStrategy`] and plugged into
//! [`Producer::enqueue_with`] / [`Consumer::dequeue_with`].
//!
//! [`Producer::enqueue`]: crate::Producer::enqueue
//! [`Consumer::dequeue`]: crate::Consumer::dequeue
//! [`Producer::enqueue_with`]: crate::Producer::enqueue_with
//! [`Consumer::dequeue_with`]: crate::Consumer::dequeue_with

use std::time::Duration;

use minstant::Instant;

/// What to do between two attempts that found the ring full (or empty).
pub trait WaitStrategy {
    /// Called after each failed attempt.
    fn wait(&mut self);

    /// Called once before a new retry loop starts.
    fn reset(&mut self) {}
}

/// Busy-spins with a CPU relax hint (`pause` on x86_64).
///
/// Lowest latency; burns a full core while waiting.
#[derive(Debug, Default, Clone, Copy)]
pub struct Spin;

impl WaitStrategy for Spin {
    #[inline(always)]
    fn wait(&mut self) {
        core::hint::spin_loop();
    }
}

/// Gives the rest of the time slice back to the OS scheduler.
#[derive(Debug, Default, Clone, Copy)]
pub struct Yield;

impl WaitStrategy for Yield {
    #[inline(always)]
    fn wait(&mut self) {
        std::thread::yield_now();
    }
}

/// Exponential backoff: spins for a growing number of iterations, then
/// starts yielding once spinning stops paying off.
#[derive(Debug, Default)]
pub struct Backoff(crossbeam_utils::Backoff);

impl Backoff {
    /// Creates a backoff at its first, shortest spin step.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the backoff has escalated to yielding; a caller
    /// could switch to a heavier mechanism at this point.
    pub fn is_completed(&self) -> bool {
        self.0.is_completed()
    }
}

impl WaitStrategy for Backoff {
    #[inline]
    fn wait(&mut self) {
        self.0.snooze();
    }

    fn reset(&mut self) {
        self.0.reset();
    }
}

/// Upper bound on how long a retry loop may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Retry until the operation succeeds.
    Infinite,
    /// Give up once the duration has elapsed. `Duration::ZERO` makes exactly
    /// one attempt; a duration too large to be added to the current instant
    /// (e.g. `Duration::MAX`) never expires.
    Duration(Duration),
}

impl Timeout {
    pub(crate) fn deadline(self) -> Option<Instant> {
        match self {
            Timeout::Infinite => None,
            Timeout::Duration(d) => Instant::now().checked_add(d),
        }
    }

    /// Returns `true` once `deadline` has been reached.
    #[inline]
    pub(crate) fn expired(deadline: Option<Instant>) -> bool {
        deadline.is_some_and(|dl| Instant::now() >= dl)
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}
