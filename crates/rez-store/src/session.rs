// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rez_model::Message;

use crate::cost::StoreError;

/// Conversations are short-lived; a day is generous.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// One persisted conversation.
///
/// Writes are full replacements — the message list is small and replacing it
/// wholesale sidesteps read-modify-write races that per-message appends
/// would invite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// A fresh, empty session expiring one TTL from now.
    pub fn fresh(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            created_at: now,
            expires_at: now + SESSION_TTL,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Conversation persistence, keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session.  A miss — including an expired record — yields a
    /// fresh empty session under the same id.
    async fn load(&self, session_id: &str) -> Result<SessionRecord, StoreError>;

    /// Full-replacement write.
    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError>;
}

/// In-memory store for tests and local runs.
#[derive(Default)]
pub struct InMemorySessionStore {
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<SessionRecord, StoreError> {
        let records = self.records.lock().unwrap();
        match records.get(session_id) {
            Some(record) if !record.is_expired(Utc::now()) => Ok(record.clone()),
            _ => Ok(SessionRecord::fresh(session_id)),
        }
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap()
            .insert(record.session_id.clone(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for std::sync::Arc<T> {
    async fn load(&self, session_id: &str) -> Result<SessionRecord, StoreError> {
        (**self).load(session_id).await
    }
    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        (**self).save(record).await
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_returns_fresh_empty_session() {
        let store = InMemorySessionStore::new();
        let session = store.load("s-1").await.unwrap();
        assert_eq!(session.session_id, "s-1");
        assert!(session.messages.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = InMemorySessionStore::new();
        let mut session = SessionRecord::fresh("s-2");
        session.messages.push(Message::user("hello"));
        store.save(&session).await.unwrap();

        let loaded = store.load("s-2").await.unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.messages[0].text(), "hello");
    }

    #[tokio::test]
    async fn expired_session_reads_as_fresh() {
        let store = InMemorySessionStore::new();
        let mut session = SessionRecord::fresh("s-3");
        session.messages.push(Message::user("old"));
        session.expires_at = Utc::now() - chrono::Duration::seconds(1);
        store.save(&session).await.unwrap();

        let loaded = store.load("s-3").await.unwrap();
        assert!(loaded.messages.is_empty(), "expired record must be a miss");
    }

    #[tokio::test]
    async fn save_replaces_wholesale() {
        let store = InMemorySessionStore::new();
        let mut session = SessionRecord::fresh("s-4");
        session.messages.push(Message::user("one"));
        store.save(&session).await.unwrap();
        session.messages = vec![Message::user("two")];
        store.save(&session).await.unwrap();

        let loaded = store.load("s-4").await.unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.messages[0].text(), "two");
    }

    #[test]
    fn fresh_session_expires_one_ttl_out() {
        let session = SessionRecord::fresh("s");
        let delta = session.expires_at - session.created_at;
        assert_eq!(delta.num_seconds(), SESSION_TTL.as_secs() as i64);
    }
}
