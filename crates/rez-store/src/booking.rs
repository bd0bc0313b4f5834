// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cost::StoreError;

/// Where a booking attempt stands.  `Locked` and `Priced` are transient and
/// carry a server-enforced TTL; the rest are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingPhase {
    Locked,
    Priced,
    Reserved,
    Released,
    Failed,
}

impl BookingPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingPhase::Reserved | BookingPhase::Released | BookingPhase::Failed)
    }
}

/// The persisted view of one lock→price→reserve attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSessionRecord {
    pub session_id: String,
    pub tee_sheet_id: i64,
    pub transaction_id: Option<String>,
    pub golfer_id: String,
    pub acct: String,
    pub email: String,
    pub phase: BookingPhase,
    pub expires_at: DateTime<Utc>,
}

impl BookingSessionRecord {
    /// A lock in `Locked` or `Priced` state past its TTL has been released
    /// by the remote system; treat it as such locally.
    pub fn effective_phase(&self, now: DateTime<Utc>) -> BookingPhase {
        match self.phase {
            BookingPhase::Locked | BookingPhase::Priced if now >= self.expires_at => {
                BookingPhase::Released
            }
            phase => phase,
        }
    }
}

#[async_trait]
pub trait BookingSessionStore: Send + Sync {
    async fn put(&self, record: &BookingSessionRecord) -> Result<(), StoreError>;
    async fn get(&self, session_id: &str) -> Result<Option<BookingSessionRecord>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryBookingStore {
    records: Mutex<HashMap<String, BookingSessionRecord>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingSessionStore for InMemoryBookingStore {
    async fn put(&self, record: &BookingSessionRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap()
            .insert(record.session_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<BookingSessionRecord>, StoreError> {
        Ok(self.records.lock().unwrap().get(session_id).cloned())
    }
}

#[async_trait]
impl<T: BookingSessionStore + ?Sized> BookingSessionStore for std::sync::Arc<T> {
    async fn put(&self, record: &BookingSessionRecord) -> Result<(), StoreError> {
        (**self).put(record).await
    }
    async fn get(&self, session_id: &str) -> Result<Option<BookingSessionRecord>, StoreError> {
        (**self).get(session_id).await
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
