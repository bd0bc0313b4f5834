// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! OAuth2 password-grant token acquisition with in-memory caching.
//!
//! The golf backends hand out short-lived JWT access tokens via the
//! `password` grant.  Tokens are cached until 60 seconds before expiry;
//! the refresh margin absorbs clock skew and in-flight time.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::WebError;

/// Refresh this long before the token actually expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Everything needed to run the password grant against one course.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthCredentials {
    pub token_url: String,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + REFRESH_MARGIN < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Lifetime in seconds.
    expires_in: u64,
}

/// One cached token per cache instance (one per course client).
pub struct TokenCache {
    client: reqwest::Client,
    token: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            token: RwLock::new(None),
        }
    }

    /// Return a fresh bearer token, acquiring one if the cache is cold or
    /// near expiry.
    pub async fn bearer(&self, creds: &OAuthCredentials) -> Result<String, WebError> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.is_fresh(Utc::now()) {
                    return Ok(token.access_token.clone());
                }
            }
        }
        self.acquire(creds).await
    }

    async fn acquire(&self, creds: &OAuthCredentials) -> Result<String, WebError> {
        let form = [
            ("grant_type", "password"),
            ("username", creds.username.as_str()),
            ("password", creds.password.as_str()),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("scope", creds.scope.as_str()),
        ];

        let response = self
            .client
            .post(&creds.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| WebError::Transient(format!("token endpoint: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            // Bad credentials are not transient; a 5xx from the IdP is.
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(WebError::Transient(format!("token endpoint {status}")));
            }
            return Err(WebError::Auth(format!("token endpoint {status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| WebError::Auth(format!("token response decode: {e}")))?;

        let cached = CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Utc::now() + Duration::from_secs(token.expires_in),
        };
        debug!(expires_in = token.expires_in, "access token acquired");
        *self.token.write().await = Some(cached);
        Ok(token.access_token)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_in_secs: i64) -> CachedToken {
        CachedToken {
            access_token: "tok".into(),
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in_secs),
        }
    }

    #[test]
    fn token_with_plenty_of_life_is_fresh() {
        assert!(token(3600).is_fresh(Utc::now()));
    }

    #[test]
    fn token_inside_refresh_margin_is_stale() {
        assert!(!token(30).is_fresh(Utc::now()));
    }

    #[test]
    fn expired_token_is_stale() {
        assert!(!token(-10).is_fresh(Utc::now()));
    }

    #[test]
    fn margin_boundary_is_stale() {
        // exactly 60s out: now + 60 < expires_at is false
        assert!(!token(60).is_fresh(Utc::now()));
    }

    #[tokio::test]
    async fn cold_cache_holds_nothing() {
        let cache = TokenCache::new(reqwest::Client::new());
        assert!(cache.token.read().await.is_none());
    }

    #[test]
    fn token_response_decodes_standard_shape() {
        let decoded: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","expires_in":1799,"token_type":"Bearer"}"#)
                .unwrap();
        assert_eq!(decoded.access_token, "abc");
        assert_eq!(decoded.expires_in, 1799);
    }
}
