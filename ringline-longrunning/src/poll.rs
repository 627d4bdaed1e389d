//! Delay between successive polls of an unfinished operation.

use std::fmt::Debug;
use std::time::Duration;

/// Decides how long to wait before each `GetOperation` poll.
///
/// `poll` counts from 1 for the first poll of a resolution.
pub trait PollStrategy: Debug + Send + Sync {
    fn delay_before(&self, poll: u32) -> Duration;
}

/// Poll again as soon as the previous poll returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Immediate;

impl PollStrategy for Immediate {
    fn delay_before(&self, _poll: u32) -> Duration {
        Duration::ZERO
    }
}

/// Wait the same interval before every poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);

impl PollStrategy for FixedDelay {
    fn delay_before(&self, _poll: u32) -> Duration {
        self.0
    }
}

/// `initial * multiplier^(poll - 1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub multiplier: f64,
    pub max: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, multiplier: f64, max: Duration) -> Self {
        Self {
            initial,
            multiplier,
            max,
        }
    }
}

impl PollStrategy for ExponentialBackoff {
    fn delay_before(&self, poll: u32) -> Duration {
        let exponent = poll.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max.as_secs_f64() {
            return self.max;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }
}
