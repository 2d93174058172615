// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Retry schedules for the upload step.
//!
//! Two layers exist: [`BackoffPolicy`] wraps the whole upload attempt, and
//! [`StatusRetry`] re-sends a single `PUT` when the service answers with a
//! transient status.

use std::time::Duration;

use reqwest::{Method, StatusCode};

/// Outer attempt budget with exponential delays: after failed attempt `n`
/// (1-based) the caller waits `base * 2^n`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    /// Delay after failed attempt `attempt`, or `None` when no attempt follows.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(self.base.saturating_mul(2u32.saturating_pow(attempt)))
    }
}

/// Statuses that warrant re-sending the same request.
const TRANSIENT_STATUSES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Adapter-level retry on transient statuses, limited to idempotent uploads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusRetry {
    pub max_retries: u32,
    pub backoff_factor: Duration,
}

impl Default for StatusRetry {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor: Duration::from_secs(2),
        }
    }
}

impl StatusRetry {
    /// Whether `status` for `method` should be re-sent given `retries_done` so far.
    pub fn should_retry(&self, method: &Method, status: StatusCode, retries_done: u32) -> bool {
        *method == Method::PUT
            && retries_done < self.max_retries
            && TRANSIENT_STATUSES.contains(&status)
    }

    /// Sleep before retry number `retry` (1-based): `factor * 2^(retry - 1)`.
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        self.backoff_factor
            .saturating_mul(2u32.saturating_pow(exponent))
    }
}
