// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Exponential backoff for retrying failed List and Watch calls.
//!
//! Reflectors never give up: a failing API server only delays the next attempt.
//! The interval has no elapsed-time limit and is capped at the resync period.

use crate::constants::{
    RETRY_BACKOFF_MULTIPLIER, RETRY_INITIAL_INTERVAL_MILLIS, RETRY_RANDOMIZATION_FACTOR,
};
use std::time::Duration;

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent thundering herd.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Initial interval duration, restored by [`reset`](Self::reset)
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with specified parameters.
    #[must_use]
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval.min(max_interval),
            initial_interval,
            max_interval,
            multiplier,
            randomization_factor,
        }
    }

    /// Get the next backoff interval and grow the following one.
    pub fn next_backoff(&mut self) -> Duration {
        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        jittered
    }

    /// Start over from the initial interval after a successful call.
    pub fn reset(&mut self) {
        self.current_interval = self.initial_interval.min(self.max_interval);
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let jittered = rand::random_range((secs - delta)..=(secs + delta));

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Create the backoff used by reflectors.
///
/// # Configuration
///
/// - **Initial interval**: 100ms
/// - **Max interval**: `max_interval` (the resync period)
/// - **Multiplier**: 2.0 (exponential growth)
/// - **Randomization**: ±10% (prevents thundering herd)
#[must_use]
pub fn reflector_backoff(max_interval: Duration) -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(RETRY_INITIAL_INTERVAL_MILLIS),
        max_interval,
        RETRY_BACKOFF_MULTIPLIER,
        RETRY_RANDOMIZATION_FACTOR,
    )
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod backoff_tests;
