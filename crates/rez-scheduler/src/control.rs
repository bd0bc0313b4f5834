// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use rez_bus::{BusTransport, Message, MessagePayload, MessageType, Producer, Publisher, Topology};
use rez_config::Stage;

use crate::expression::{validate_expression, validate_timezone};
use crate::schedule::{
    Schedule, ScheduleDefinition, ScheduleError, ScheduleStatus, ScheduleStore, SchedulerBackend,
    TargetType,
};

/// What the external scheduler delivers when an entry fires.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerEvent {
    pub schedule_id: String,
}

/// The control plane: validation, persistence, external binding, and
/// trigger handling.
pub struct ControlPlane<B, S, T>
where
    B: SchedulerBackend,
    S: ScheduleStore,
    T: BusTransport,
{
    backend: B,
    store: S,
    publisher: Publisher<T>,
    topology: Topology,
    stage: Stage,
    /// Execution role the external scheduler assumes to publish; read from
    /// config (see the wildcard resource note in the crate docs).
    role_arn: String,
}

impl<B, S, T> ControlPlane<B, S, T>
where
    B: SchedulerBackend,
    S: ScheduleStore,
    T: BusTransport,
{
    pub fn new(
        backend: B,
        store: S,
        publisher: Publisher<T>,
        topology: Topology,
        stage: Stage,
        role_arn: String,
    ) -> Self {
        Self {
            backend,
            store,
            publisher,
            topology,
            stage,
            role_arn,
        }
    }

    /// Create a schedule.
    ///
    /// Idempotent on name: an identical definition is a no-op success; a
    /// differing one is a conflict.  Backend failure persists the record in
    /// `Error` status and bubbles up.
    pub async fn create(&self, definition: ScheduleDefinition) -> Result<String, ScheduleError> {
        validate_expression(&definition.expression).map_err(ScheduleError::Invalid)?;
        validate_timezone(&definition.timezone).map_err(ScheduleError::Invalid)?;
        if definition.name.trim().is_empty() {
            return Err(ScheduleError::Invalid("empty schedule name".into()));
        }

        if let Some(existing) = self.store.get_by_name(self.stage, &definition.name).await? {
            if existing.status != ScheduleStatus::Deleted {
                return if existing.definition == definition {
                    info!(name = %definition.name, "schedule already exists, no-op");
                    Ok(existing.id)
                } else {
                    Err(ScheduleError::Conflict(definition.name))
                };
            }
        }

        let topic = self
            .topology
            .topic_for(message_type_for(definition.target_type))
            .to_string();
        let mut schedule = Schedule {
            id: Uuid::new_v4().to_string(),
            definition,
            target_topic_arn: topic,
            status: ScheduleStatus::Active,
            external_schedule_id: None,
            created_by: "user".into(),
            created_date: Utc::now(),
            last_triggered: None,
        };
        self.store.put(self.stage, &schedule).await?;

        match self.backend.create_entry(&schedule, &self.role_arn).await {
            Ok(external_id) => {
                schedule.external_schedule_id = Some(external_id);
                self.store.put(self.stage, &schedule).await?;
                info!(name = %schedule.definition.name, id = %schedule.id, "schedule created");
                Ok(schedule.id)
            }
            Err(e) => {
                warn!(name = %schedule.definition.name, error = %e, "external scheduler create failed");
                schedule.status = ScheduleStatus::Error;
                self.store.put(self.stage, &schedule).await?;
                Err(e)
            }
        }
    }

    pub async fn delete(&self, name: &str) -> Result<(), ScheduleError> {
        let mut schedule = self.require(name).await?;
        if let Some(external_id) = &schedule.external_schedule_id {
            self.backend.delete_entry(external_id).await?;
        }
        schedule.status = ScheduleStatus::Deleted;
        self.store.put(self.stage, &schedule).await?;
        info!(%name, "schedule deleted");
        Ok(())
    }

    pub async fn pause(&self, name: &str) -> Result<(), ScheduleError> {
        self.set_enabled(name, false).await
    }

    pub async fn resume(&self, name: &str) -> Result<(), ScheduleError> {
        self.set_enabled(name, true).await
    }

    async fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), ScheduleError> {
        let mut schedule = self.require(name).await?;
        if let Some(external_id) = &schedule.external_schedule_id {
            self.backend.set_enabled(external_id, enabled).await?;
        }
        schedule.status = if enabled {
            ScheduleStatus::Active
        } else {
            ScheduleStatus::Paused
        };
        self.store.put(self.stage, &schedule).await
    }

    /// Handle one firing: evaluate the template, assemble the envelope,
    /// publish, stamp `last_triggered`.
    pub async fn handle_trigger(&self, event: &TriggerEvent) -> Result<String, ScheduleError> {
        let mut schedule = self
            .store
            .get_by_id(&event.schedule_id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound(event.schedule_id.clone()))?;

        if schedule.status != ScheduleStatus::Active {
            return Err(ScheduleError::Invalid(format!(
                "schedule {:?} is {:?}, not active",
                schedule.definition.name, schedule.status
            )));
        }

        let payload = evaluate_template(&schedule.definition.payload_template, self.stage);
        let mut message = Message::new(
            Producer::Scheduler,
            self.stage,
            message_type_for(schedule.definition.target_type),
            MessagePayload::Json(payload),
        );
        let message_id = self.publisher.publish(&mut message).await?;

        schedule.last_triggered = Some(Utc::now());
        self.store.put(self.stage, &schedule).await?;
        info!(
            schedule = %schedule.definition.name,
            %message_id,
            "schedule trigger published"
        );
        Ok(message_id)
    }

    async fn require(&self, name: &str) -> Result<Schedule, ScheduleError> {
        match self.store.get_by_name(self.stage, name).await? {
            Some(s) if s.status != ScheduleStatus::Deleted => Ok(s),
            _ => Err(ScheduleError::NotFound(name.to_string())),
        }
    }
}

fn message_type_for(target: TargetType) -> MessageType {
    match target {
        TargetType::WebAction => MessageType::WebAction,
        TargetType::Notify => MessageType::Notify,
        TargetType::AgentTask => MessageType::Scheduled,
    }
}

/// Substitute `${now}` (RFC 3339 UTC) and `${stage}` in every string leaf.
fn evaluate_template(template: &Value, stage: Stage) -> Value {
    match template {
        Value::String(text) => Value::String(
            text.replace("${now}", &Utc::now().to_rfc3339())
                .replace("${stage}", stage.as_str()),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| evaluate_template(v, stage)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), evaluate_template(v, stage)))
                .collect(),
        ),
        other => other.clone(),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
