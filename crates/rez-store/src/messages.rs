use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::cost::StoreError;

/// Envelope persistence: a message is written once at ingress and referenced
/// by id afterwards.  Stored as raw JSON so this crate does not depend on
/// the bus envelope type.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn put(&self, id: &str, envelope: &Value) -> Result<(), StoreError>;
    async fn get(&self, id: &str) -> Result<Option<Value>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryMessageStore {
    records: Mutex<HashMap<String, Value>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn put(&self, id: &str, envelope: &Value) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap()
            .insert(id.to_string(), envelope.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.records.lock().unwrap().get(id).cloned())
    }
}

#[async_trait]
impl<T: MessageStore + ?Sized> MessageStore for std::sync::Arc<T> {
    async fn put(&self, id: &str, envelope: &Value) -> Result<(), StoreError> {
        (**self).put(id, envelope).await
    }
    async fn get(&self, id: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(id).await
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
