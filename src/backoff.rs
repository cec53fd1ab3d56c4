// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Exponential backoff with full jitter for requeueing failed reconciliations.
//!
//! The delay before retry `n` (zero-based) is drawn uniformly from
//! `[0, min(cap, base * 2^n)]`. Spreading retries over the whole window keeps many
//! failing queues from retrying against SQS in lockstep.

use crate::constants::{DEFAULT_BACKOFF_BASE_MILLIS, DEFAULT_BACKOFF_CAP_SECS};
use std::time::Duration;

/// Exponent beyond which `base * 2^n` is always past any sane cap.
const MAX_EXPONENT: u32 = 30;

/// Backoff schedule for transient failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Ceiling of the first retry.
    pub base: Duration,
    /// Upper bound on any single delay.
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    /// 1 second base, 5 minute cap.
    fn default() -> Self {
        Self {
            base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MILLIS),
            cap: Duration::from_secs(DEFAULT_BACKOFF_CAP_SECS),
        }
    }
}

impl BackoffPolicy {
    /// Create a policy. A cap below `base` is raised to `base`.
    #[must_use]
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap: cap.max(base),
        }
    }

    /// Largest delay that retry `attempt` may wait: `min(cap, base * 2^attempt)`.
    ///
    /// # Arguments
    ///
    /// * `attempt` - Number of consecutive failures before this retry, starting at 0
    #[must_use]
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(MAX_EXPONENT);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Randomized delay for retry `attempt`, uniform in `[0, ceiling(attempt)]`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.ceiling(attempt).mul_f64(rand::random::<f64>())
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod backoff_tests;
