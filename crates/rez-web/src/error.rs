// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use rez_store::StoreError;

/// Failures in the web-action path, split by handling policy.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// The URL guard refused the request before any I/O.  Caller error, 400.
    #[error("url rejected: {0}")]
    Forbidden(String),
    /// OAuth or JWT verification failed.  Never retried, 401.
    #[error("authorization failed: {0}")]
    Auth(String),
    /// Network trouble or 5xx after the retry budget.  Transient.
    #[error("transient failure: {0}")]
    Transient(String),
    /// The remote told us to slow down.
    #[error("rate limited by remote{}", retry_after_secs.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },
    /// A 4xx that retrying cannot fix.
    #[error("remote rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WebError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebError::Transient(_) | WebError::RateLimited { .. })
    }
}
