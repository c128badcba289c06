// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exponential Backoff
//!
//! Retry policy used by the connection manager while (re)connecting. Attempts
//! are unbounded in number, intervals grow geometrically up to a ceiling and an
//! optional total elapsed budget makes the policy give up.

use std::time::Duration;

/// Shortest wait between two attempts.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Exponential backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    /// Total time the policy may spend waiting. `None` retries forever.
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
            max_elapsed: None,
        }
    }
}

impl RetryPolicy {
    /// Whether the policy grows its waits: a multiplier of at least one and a
    /// non-zero initial interval.
    pub fn is_valid(&self) -> bool {
        self.multiplier >= 1.0 && !self.initial_interval.is_zero()
    }

    /// Starts a backoff sequence. Out of range parameters are clamped: the
    /// multiplier to at least one (NaN counts as one) and both intervals to at
    /// least [`MIN_INTERVAL`].
    pub fn backoff(&self) -> Backoff {
        let initial_interval = self.initial_interval.max(MIN_INTERVAL);
        let policy = RetryPolicy {
            initial_interval,
            multiplier: if self.multiplier >= 1.0 {
                self.multiplier
            } else {
                1.0
            },
            max_interval: self.max_interval.max(initial_interval),
            max_elapsed: self.max_elapsed,
        };

        Backoff {
            next: policy.initial_interval,
            policy,
            elapsed: Duration::ZERO,
        }
    }
}

/// Iterator over the successive waits of a [`RetryPolicy`].
///
/// Yields `None` once the elapsed budget would be exceeded.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    next: Duration,
    elapsed: Duration,
}

impl Backoff {
    pub fn reset(&mut self) {
        self.next = self.policy.initial_interval;
        self.elapsed = Duration::ZERO;
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.next.min(self.policy.max_interval);

        if let Some(max_elapsed) = self.policy.max_elapsed {
            if self.elapsed + delay > max_elapsed {
                return None;
            }
        }

        self.elapsed += delay;
        let grown = (delay.as_nanos() as f64 * self.policy.multiplier) as u64;
        self.next = Duration::from_nanos(grown).min(self.policy.max_interval);

        Some(delay)
    }
}
