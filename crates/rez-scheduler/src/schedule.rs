// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use rez_bus::BusError;
use rez_config::Stage;

/// What a schedule produces when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    WebAction,
    Notify,
    AgentTask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Active,
    Paused,
    Deleted,
    Error,
}

/// What a caller submits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDefinition {
    /// Unique per stage.
    pub name: String,
    /// `cron(…)`, `rate(…)`, or `at(…)`.
    pub expression: String,
    /// IANA name.
    pub timezone: String,
    pub target_type: TargetType,
    /// Evaluated at trigger time; `${now}` and `${stage}` tokens are
    /// substituted.
    pub payload_template: Value,
}

/// The persisted control-plane record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub definition: ScheduleDefinition,
    pub target_topic_arn: String,
    pub status: ScheduleStatus,
    pub external_schedule_id: Option<String>,
    pub created_by: String,
    pub created_date: DateTime<Utc>,
    pub last_triggered: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid schedule: {0}")]
    Invalid(String),
    /// Same name, different definition.
    #[error("schedule {0:?} already exists with a different definition")]
    Conflict(String),
    #[error("schedule {0:?} not found")]
    NotFound(String),
    /// The external scheduler refused; the record is left in `Error`.
    #[error("external scheduler failure: {0}")]
    Backend(String),
    #[error("store failure: {0}")]
    Store(String),
    #[error(transparent)]
    Bus(#[from] BusError),
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn get_by_name(&self, stage: Stage, name: &str) -> Result<Option<Schedule>, ScheduleError>;
    async fn get_by_id(&self, id: &str) -> Result<Option<Schedule>, ScheduleError>;
    async fn put(&self, stage: Stage, schedule: &Schedule) -> Result<(), ScheduleError>;
}

#[derive(Default)]
pub struct InMemoryScheduleStore {
    by_name: Mutex<HashMap<(Stage, String), Schedule>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn get_by_name(&self, stage: Stage, name: &str) -> Result<Option<Schedule>, ScheduleError> {
        Ok(self
            .by_name
            .lock()
            .unwrap()
            .get(&(stage, name.to_string()))
            .cloned())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Schedule>, ScheduleError> {
        Ok(self
            .by_name
            .lock()
            .unwrap()
            .values()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn put(&self, stage: Stage, schedule: &Schedule) -> Result<(), ScheduleError> {
        self.by_name
            .lock()
            .unwrap()
            .insert((stage, schedule.definition.name.clone()), schedule.clone());
        Ok(())
    }
}

// ─── External scheduler ──────────────────────────────────────────────────────

/// The external scheduler service surface (EventBridge Scheduler analog).
#[async_trait]
pub trait SchedulerBackend: Send + Sync {
    /// Create an entry bound to `role_arn` (the publish-only execution
    /// role).  Returns the external entry id.
    async fn create_entry(&self, schedule: &Schedule, role_arn: &str) -> Result<String, ScheduleError>;
    async fn delete_entry(&self, external_id: &str) -> Result<(), ScheduleError>;
    async fn set_enabled(&self, external_id: &str, enabled: bool) -> Result<(), ScheduleError>;
}

/// Test backend: records calls, optionally failing creation.
#[derive(Default)]
pub struct RecordingBackend {
    pub created: Mutex<Vec<(String, String)>>,
    pub deleted: Mutex<Vec<String>>,
    pub enabled_calls: Mutex<Vec<(String, bool)>>,
    pub fail_create: Mutex<bool>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchedulerBackend for RecordingBackend {
    async fn create_entry(&self, schedule: &Schedule, role_arn: &str) -> Result<String, ScheduleError> {
        if *self.fail_create.lock().unwrap() {
            return Err(ScheduleError::Backend("create refused".into()));
        }
        let mut created = self.created.lock().unwrap();
        created.push((schedule.definition.name.clone(), role_arn.to_string()));
        Ok(format!("ext-{}", created.len()))
    }

    async fn delete_entry(&self, external_id: &str) -> Result<(), ScheduleError> {
        self.deleted.lock().unwrap().push(external_id.to_string());
        Ok(())
    }

    async fn set_enabled(&self, external_id: &str, enabled: bool) -> Result<(), ScheduleError> {
        self.enabled_calls
            .lock()
            .unwrap()
            .push((external_id.to_string(), enabled));
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
