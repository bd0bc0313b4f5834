// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cost::StoreError;

/// Response bodies are truncated to this many bytes before persisting.
pub const RESULT_BODY_CAP: usize = 50 * 1024;

/// Web-action results live three days — long enough to debug, short enough
/// to keep the table lean.
const RESULT_TTL: Duration = Duration::from_secs(3 * 24 * 60 * 60);

/// Outcome of one executed web action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebActionResult {
    pub message_id: String,
    pub action: String,
    pub url: String,
    pub status: String,
    pub response_code: u16,
    pub response_body: String,
    pub execution_time_ms: u64,
    pub created_date: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl WebActionResult {
    pub fn new(
        message_id: impl Into<String>,
        action: impl Into<String>,
        url: impl Into<String>,
        status: impl Into<String>,
        response_code: u16,
        response_body: String,
        execution_time_ms: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            message_id: message_id.into(),
            action: action.into(),
            url: url.into(),
            status: status.into(),
            response_code,
            response_body: truncate_body(response_body),
            execution_time_ms,
            created_date: now,
            expires_at: now + RESULT_TTL,
        }
    }
}

/// Cap the body at [`RESULT_BODY_CAP`] bytes on a char boundary.
fn truncate_body(body: String) -> String {
    if body.len() <= RESULT_BODY_CAP {
        return body;
    }
    let mut cut = RESULT_BODY_CAP;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    body[..cut].to_string()
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn put(&self, result: &WebActionResult) -> Result<(), StoreError>;
    async fn get(&self, message_id: &str) -> Result<Option<WebActionResult>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryResultStore {
    records: Mutex<HashMap<String, WebActionResult>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, result: &WebActionResult) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap()
            .insert(result.message_id.clone(), result.clone());
        Ok(())
    }

    async fn get(&self, message_id: &str) -> Result<Option<WebActionResult>, StoreError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .get(message_id)
            .filter(|r| Utc::now() < r.expires_at)
            .cloned())
    }
}

#[async_trait]
impl<T: ResultStore + ?Sized> ResultStore for std::sync::Arc<T> {
    async fn put(&self, result: &WebActionResult) -> Result<(), StoreError> {
        (**self).put(result).await
    }
    async fn get(&self, message_id: &str) -> Result<Option<WebActionResult>, StoreError> {
        (**self).get(message_id).await
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
