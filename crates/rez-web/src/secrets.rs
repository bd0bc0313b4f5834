// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::WebError;

/// Secrets live in cache for five minutes — long enough to amortize store
/// round-trips inside a warm invocation burst, short enough that rotation
/// lands promptly.
pub const SECRET_TTL: Duration = Duration::from_secs(5 * 60);

/// The external secret store surface (Secrets Manager analog).
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Fetch a secret by name.  The payload is a JSON object.
    async fn fetch(&self, name: &str) -> Result<Value, WebError>;
}

/// Fixed secrets for tests and local runs.
#[derive(Default)]
pub struct StaticSecrets {
    values: HashMap<String, Value>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }
}

#[async_trait]
impl SecretSource for StaticSecrets {
    async fn fetch(&self, name: &str) -> Result<Value, WebError> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| WebError::Auth(format!("secret {name:?} not found")))
    }
}

/// Read-through cache over a [`SecretSource`].
///
/// Correctness never depends on the cache: a cold start simply refetches.
/// Stale reads within the TTL are acceptable by design.
pub struct SecretCache<S: SecretSource> {
    source: S,
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, Value)>>,
}

impl<S: SecretSource> SecretCache<S> {
    pub fn new(source: S) -> Self {
        Self::with_ttl(source, SECRET_TTL)
    }

    pub fn with_ttl(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, name: &str) -> Result<Value, WebError> {
        {
            let entries = self.entries.read().await;
            if let Some((fetched_at, value)) = entries.get(name) {
                if fetched_at.elapsed() < self.ttl {
                    return Ok(value.clone());
                }
            }
        }

        let value = self.source.fetch(name).await?;
        debug!(secret = %name, "secret fetched");
        self.entries
            .write()
            .await
            .insert(name.to_string(), (Instant::now(), value.clone()));
        Ok(value)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingSource {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SecretSource for CountingSource {
        async fn fetch(&self, _name: &str) -> Result<Value, WebError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "username": "caddie" }))
        }
    }

    #[tokio::test]
    async fn fetch_is_cached_within_ttl() {
        let cache = SecretCache::new(CountingSource { calls: AtomicU32::new(0) });
        cache.get("golf").await.unwrap();
        cache.get("golf").await.unwrap();
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_refetches() {
        let cache =
            SecretCache::with_ttl(CountingSource { calls: AtomicU32::new(0) }, Duration::ZERO);
        cache.get("golf").await.unwrap();
        cache.get("golf").await.unwrap();
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn distinct_names_cached_separately() {
        let cache = SecretCache::new(CountingSource { calls: AtomicU32::new(0) });
        cache.get("golf").await.unwrap();
        cache.get("push").await.unwrap();
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_static_secret_is_auth_error() {
        let secrets = StaticSecrets::new().with("present", json!({}));
        assert!(matches!(
            secrets.fetch("absent").await.unwrap_err(),
            WebError::Auth(_)
        ));
        assert!(secrets.fetch("present").await.is_ok());
    }
}
