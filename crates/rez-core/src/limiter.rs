// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};

/// Default ceiling on how long a caller may sit in the bucket queue before
/// being told to come back later.
const DEFAULT_WAIT_CAP: Duration = Duration::from_secs(30);

/// Token-bucket ingress limiter for the model path.
///
/// A blocked request waits up to the configured cap for a slot, then fails
/// — the caller maps that to HTTP 429.  The bucket lives in process memory:
/// each invocation enforces its own rate, which is the intended shape for
/// per-invocation serverless concurrency.
pub struct IngressLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    wait_cap: Duration,
}

impl IngressLimiter {
    pub fn per_minute(requests: u32) -> Self {
        Self::with_wait_cap(requests, DEFAULT_WAIT_CAP)
    }

    pub fn with_wait_cap(requests: u32, wait_cap: Duration) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests.max(1)).expect("nonzero"));
        Self {
            limiter: RateLimiter::direct(quota),
            wait_cap,
        }
    }

    /// Take one slot, waiting up to the cap.  `Err(())` means rate limited.
    pub async fn acquire(&self) -> Result<(), ()> {
        if self.limiter.check().is_ok() {
            return Ok(());
        }
        if self.wait_cap.is_zero() {
            return Err(());
        }
        tokio::time::timeout(self.wait_cap, self.limiter.until_ready())
            .await
            .map_err(|_| ())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
