// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Guarded request execution.
//!
//! Redirects are not delegated to the HTTP client: each hop comes back
//! here, gets re-guarded, and counts against a hard hop budget.  Retries
//! follow the failure table — 5xx/408 and transport errors back off and
//! retry, 429 honors `Retry-After`, every other 4xx fails fast.

use std::time::{Duration, Instant};

use reqwest::{Method, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use rez_store::{ResultStore, WebActionResult};

use crate::error::WebError;
use crate::guard::UrlGuard;

/// Per-call deadline on any single outbound request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Redirect hop budget.
const MAX_REDIRECTS: u32 = 3;
/// Attempts per action: initial call plus two retries.
const MAX_ATTEMPTS: u32 = 3;
/// Backoff schedule base: 1 s, 2 s, 4 s.
const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// One outbound action to perform.
#[derive(Debug, Clone)]
pub struct WebRequest {
    /// Correlation id carried into the result record and every log line.
    pub message_id: String,
    /// Logical action name, e.g. `search_tee_times`.
    pub action: String,
    pub method: Method,
    pub url: String,
    /// JSON body for POST/PUT.
    pub body: Option<Value>,
    /// Bearer token attached as `Authorization`.
    pub bearer: Option<String>,
}

/// Final response of a successful action.
#[derive(Debug, Clone)]
pub struct HttpOutcome {
    pub status: u16,
    pub body: String,
}

pub struct WebActionExecutor<R: ResultStore> {
    guard: UrlGuard,
    client: reqwest::Client,
    results: R,
}

impl<R: ResultStore> WebActionExecutor<R> {
    pub fn new(guard: UrlGuard, results: R) -> Self {
        Self {
            guard,
            // Redirects handled manually so each hop is re-guarded.
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .expect("reqwest client"),
            results,
        }
    }

    /// Execute with retries, then persist the outcome.
    pub async fn execute(&self, request: &WebRequest) -> Result<HttpOutcome, WebError> {
        let started = Instant::now();
        let mut delay = BACKOFF_BASE;
        let mut last_err: Option<WebError> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(request).await {
                Ok(outcome) => {
                    self.persist(request, "completed", outcome.status, &outcome.body, started)
                        .await;
                    return Ok(outcome);
                }
                Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!(
                        message_id = %request.message_id,
                        attempt,
                        error = %err,
                        "retryable web action failure"
                    );
                    let wait = match &err {
                        WebError::RateLimited { retry_after_secs: Some(secs) } => {
                            Duration::from_secs(*secs)
                        }
                        _ => jittered(delay),
                    };
                    tokio::time::sleep(wait).await;
                    delay *= 2;
                    last_err = Some(err);
                }
                Err(err) => {
                    // Guard rejections never produce a result record — the
                    // request performed no I/O.
                    if !matches!(err, WebError::Forbidden(_)) {
                        self.persist(request, "failed", 0, &err.to_string(), started).await;
                    }
                    return Err(err);
                }
            }
        }

        let err = last_err.expect("at least one attempt failed");
        self.persist(request, "failed", 0, &err.to_string(), started).await;
        Err(err)
    }

    /// One attempt: guard, send, follow guarded redirects.
    async fn attempt(&self, request: &WebRequest) -> Result<HttpOutcome, WebError> {
        let mut url = self.guard.check(&request.url).await?;

        for _hop in 0..=MAX_REDIRECTS {
            let mut builder = self.client.request(request.method.clone(), url.clone());
            if let Some(token) = &request.bearer {
                builder = builder.bearer_auth(token);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| WebError::Transient(format!("request to {url}: {e}")))?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        WebError::Rejected {
                            status: status.as_u16(),
                            body: "redirect without Location".into(),
                        }
                    })?;
                let next = resolve_redirect(&url, location)?;
                debug!(message_id = %request.message_id, from = %url, to = %next, "following redirect");
                url = self.guard.check(next.as_str()).await?;
                continue;
            }

            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response
                .text()
                .await
                .map_err(|e| WebError::Transient(format!("body read: {e}")))?;

            return classify(status, retry_after, body);
        }

        Err(WebError::Rejected {
            status: 0,
            body: format!("more than {MAX_REDIRECTS} redirects"),
        })
    }

    async fn persist(
        &self,
        request: &WebRequest,
        status: &str,
        code: u16,
        body: &str,
        started: Instant,
    ) {
        let record = WebActionResult::new(
            request.message_id.clone(),
            request.action.clone(),
            request.url.clone(),
            status,
            code,
            body.to_string(),
            started.elapsed().as_millis() as u64,
        );
        if let Err(e) = self.results.put(&record).await {
            // Result persistence is observability, not correctness.
            warn!(message_id = %request.message_id, error = %e, "result persist failed");
        }
    }
}

/// Map a terminal (non-redirect) response onto the failure table.
fn classify(status: StatusCode, retry_after: Option<u64>, body: String) -> Result<HttpOutcome, WebError> {
    if status.is_success() {
        return Ok(HttpOutcome {
            status: status.as_u16(),
            body,
        });
    }
    match status.as_u16() {
        429 => Err(WebError::RateLimited {
            retry_after_secs: retry_after,
        }),
        408 => Err(WebError::Transient("request timeout (408)".into())),
        code if status.is_server_error() => {
            Err(WebError::Transient(format!("server error {code}")))
        }
        code => Err(WebError::Rejected { status: code, body }),
    }
}

/// Resolve a `Location` header value against the current URL.
fn resolve_redirect(current: &Url, location: &str) -> Result<Url, WebError> {
    current
        .join(location)
        .map_err(|e| WebError::Rejected {
            status: 0,
            body: format!("unresolvable redirect {location:?}: {e}"),
        })
}

/// Backoff with ±25% jitter.
fn jittered(delay: Duration) -> Duration {
    let nominal = delay.as_millis() as u64;
    let spread = (nominal / 2).max(1);
    Duration::from_millis(nominal - nominal / 4 + rand::random::<u64>() % spread)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rez_store::InMemoryResultStore;

    fn executor() -> WebActionExecutor<InMemoryResultStore> {
        WebActionExecutor::new(
            UrlGuard::new(vec!["birdsfoot.cps.golf".into()]),
            InMemoryResultStore::new(),
        )
    }

    // ── Classification table ──────────────────────────────────────────────────

    #[test]
    fn success_passes_body_through() {
        let outcome = classify(StatusCode::OK, None, "hello".into()).unwrap();
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.body, "hello");
    }

    #[test]
    fn server_errors_are_transient() {
        for code in [500u16, 502, 503, 504] {
            let err = classify(StatusCode::from_u16(code).unwrap(), None, String::new()).unwrap_err();
            assert!(err.is_retryable(), "{code}");
        }
    }

    #[test]
    fn request_timeout_is_transient() {
        let err = classify(StatusCode::REQUEST_TIMEOUT, None, String::new()).unwrap_err();
        assert!(matches!(err, WebError::Transient(_)));
    }

    #[test]
    fn too_many_requests_carries_retry_after() {
        let err = classify(StatusCode::TOO_MANY_REQUESTS, Some(7), String::new()).unwrap_err();
        assert!(matches!(err, WebError::RateLimited { retry_after_secs: Some(7) }));
    }

    #[test]
    fn too_many_requests_without_header_still_rate_limited() {
        let err = classify(StatusCode::TOO_MANY_REQUESTS, None, String::new()).unwrap_err();
        assert!(matches!(err, WebError::RateLimited { retry_after_secs: None }));
    }

    #[test]
    fn client_errors_fail_fast() {
        for code in [400u16, 401, 403, 404, 409, 422] {
            let err = classify(StatusCode::from_u16(code).unwrap(), None, "no".into()).unwrap_err();
            assert!(!err.is_retryable(), "{code}");
            assert!(matches!(err, WebError::Rejected { .. }));
        }
    }

    // ── Redirect resolution ───────────────────────────────────────────────────

    #[test]
    fn absolute_redirect_replaces_url() {
        let current = Url::parse("https://birdsfoot.cps.golf/a").unwrap();
        let next = resolve_redirect(&current, "https://other.example/b").unwrap();
        assert_eq!(next.as_str(), "https://other.example/b");
    }

    #[test]
    fn relative_redirect_joins_current() {
        let current = Url::parse("https://birdsfoot.cps.golf/api/v1/x").unwrap();
        let next = resolve_redirect(&current, "/api/v2/y").unwrap();
        assert_eq!(next.as_str(), "https://birdsfoot.cps.golf/api/v2/y");
    }

    // ── Guard integration ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn disallowed_host_rejected_before_any_io() {
        let ex = executor();
        let request = WebRequest {
            message_id: "m-1".into(),
            action: "probe".into(),
            method: Method::GET,
            url: "https://attacker.example/".into(),
            body: None,
            bearer: None,
        };
        let err = ex.execute(&request).await.unwrap_err();
        assert!(matches!(err, WebError::Forbidden(_)));
        // Guard rejections leave no result record.
        assert!(ex.results.get("m-1").await.unwrap().is_none());
    }

    #[test]
    fn jitter_band_around_one_second() {
        for _ in 0..50 {
            let d = jittered(Duration::from_secs(1));
            assert!(d >= Duration::from_millis(750));
            assert!(d < Duration::from_millis(1250));
        }
    }
}
