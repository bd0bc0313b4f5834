// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use rez_config::Stage;

/// Schema version stamped into every new envelope.
pub const ENVELOPE_VERSION: &str = "2.0";

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Producer {
    AiAgent,
    Scheduler,
    User,
}

/// Message class.  Selects the destination topic — there is exactly one
/// topic per variant and no broker-side filtering anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    WebAction,
    Notify,
    AgentResponse,
    Scheduled,
    ScheduleCreation,
    HelloWorld,
}

/// Envelope lifecycle.  Transitions form a DAG:
/// `created → queued → processing → (completed | failed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Created,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl MessageStatus {
    /// Whether moving to `next` is a legal forward edge in the lifecycle DAG.
    pub fn can_transition(&self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        matches!(
            (self, next),
            (Created, Queued) | (Queued, Processing) | (Processing, Completed) | (Processing, Failed)
        )
    }
}

/// Which external system a web action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebActionKind {
    Weather,
    Golf,
}

/// Payload of a [`MessageType::WebAction`] message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebActionPayload {
    pub action_type: WebActionKind,
    pub url: String,
    pub operation: String,
    /// Action-specific parameters (course id, date window, player count…).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Type-specific message body.
///
/// Serialized adjacent to `message_type` rather than as an internally-tagged
/// union so the envelope's discriminator remains a plain string column that
/// routing code can read without touching the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessagePayload {
    WebAction(WebActionPayload),
    /// Notification text, agent responses, scheduled prompts, hello-world
    /// probes: all plain JSON.
    Json(Value),
}

/// Reference to credentials plus the endpoint used to verify them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfigRef {
    pub secret_name: String,
    pub verify_url: String,
}

/// The core envelope carried on the bus.  Persisted once, referenced by id
/// thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Opaque unique id, monotonic-time prefixed so store range scans come
    /// back in rough creation order.
    pub id: String,
    pub version: String,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
    pub created_by: Producer,
    pub stage: Stage,
    pub message_type: MessageType,
    pub status: MessageStatus,
    pub payload: MessagePayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_config: Option<AuthConfigRef>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Message {
    /// Construct a fresh envelope in `created` state.
    pub fn new(
        created_by: Producer,
        stage: Stage,
        message_type: MessageType,
        payload: MessagePayload,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_message_id(now),
            version: ENVELOPE_VERSION.into(),
            created_date: now,
            updated_date: now,
            created_by,
            stage,
            message_type,
            status: MessageStatus::Created,
            payload,
            arguments: None,
            auth_config: None,
            retry_count: 0,
            error_message: None,
        }
    }

    /// Advance the lifecycle.  Illegal (backward or skipping) transitions
    /// are rejected so a bug in a consumer can never un-complete a message.
    pub fn transition(&mut self, next: MessageStatus) -> Result<(), super::BusError> {
        if !self.status.can_transition(next) {
            return Err(super::BusError::Validation(format!(
                "illegal status transition {:?} -> {:?} for message {}",
                self.status, next, self.id
            )));
        }
        self.status = next;
        self.updated_date = Utc::now();
        Ok(())
    }

    /// Record a failed processing attempt.  `retry_count` only ever grows.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.retry_count += 1;
        self.error_message = Some(error.into());
        self.updated_date = Utc::now();
    }

    /// Results of agent-produced work route back to the agent-response
    /// topic, not to the user-facing notification topic.
    pub fn results_route(&self) -> MessageType {
        match self.created_by {
            Producer::AiAgent => MessageType::AgentResponse,
            _ => MessageType::Notify,
        }
    }
}

/// `{unix_millis}-{uuid}` — sortable by creation time, unique by suffix.
fn new_message_id(now: DateTime<Utc>) -> String {
    format!("{}-{}", now.timestamp_millis(), Uuid::new_v4())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
