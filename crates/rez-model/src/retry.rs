// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::provider::{ConverseRequest, ModelError, ModelProvider};
use crate::types::ModelResponse;

/// Base delay for the application-level throttle backoff.
const THROTTLE_BASE: Duration = Duration::from_secs(2);
/// Ceiling for any single throttle wait.
const THROTTLE_CAP: Duration = Duration::from_secs(30);

/// Run `op` with application-level backoff on throttling, independent of any
/// transport retries underneath.
///
/// Only [`ModelError::Throttled`] is retried here; everything else is either
/// handled lower down or not retryable at all.  A server-provided
/// `Retry-After` wins over the computed backoff (still capped).
pub async fn with_throttle_retry<F, Fut>(max_attempts: u32, mut op: F) -> Result<ModelResponse, ModelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ModelResponse, ModelError>>,
{
    let mut delay = THROTTLE_BASE;
    let mut last = None;

    for attempt in 1..=max_attempts.max(1) {
        match op().await {
            Ok(response) => return Ok(response),
            Err(ModelError::Throttled { retry_after_secs }) => {
                warn!(attempt, retry_after_secs, "model throttled");
                last = Some(ModelError::Throttled { retry_after_secs });
                if attempt < max_attempts {
                    let wait = retry_after_secs
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| with_jitter(delay))
                        .min(THROTTLE_CAP);
                    tokio::time::sleep(wait).await;
                    delay = (delay * 2).min(THROTTLE_CAP);
                }
            }
            Err(other) => return Err(other),
        }
    }
    Err(last.expect("at least one attempt"))
}

/// Convenience: a full converse call wrapped in the throttle policy.
pub async fn converse_with_retry(
    provider: &dyn ModelProvider,
    req: ConverseRequest,
    max_attempts: u32,
) -> Result<ModelResponse, ModelError> {
    with_throttle_retry(max_attempts, || provider.converse(req.clone())).await
}

/// ±25% jitter around the nominal delay.
fn with_jitter(delay: Duration) -> Duration {
    let nominal = delay.as_millis() as u64;
    let spread = (nominal / 2).max(1);
    let low = nominal - nominal / 4;
    Duration::from_millis(low + rand::random::<u64>() % spread)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
