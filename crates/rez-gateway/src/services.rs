// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Service seams between HTTP routing and the component crates, so the
//! router is testable against doubles and the binary wires in the real
//! engines.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use rez_bus::{BusError, BusTransport, Message, Publisher};
use rez_core::{AgentEngine, AgentError, AgentReply, PrefetchedContext};
use rez_model::ModelProvider;
use rez_scheduler::{ControlPlane, ScheduleDefinition, ScheduleError, ScheduleStore, SchedulerBackend};
use rez_store::{CostStore, MessageStore, SessionStore};

/// Platform budget for one agent request, minus the persistence margin the
/// engine needs to save a partial session.
const AGENT_DEADLINE: Duration = Duration::from_secs(4 * 60 + 30);

// ─── Agent ───────────────────────────────────────────────────────────────────

#[async_trait]
pub trait AgentService: Send + Sync {
    async fn handle(
        &self,
        session_id: Option<String>,
        message: &str,
    ) -> Result<AgentReply, AgentError>;
}

#[async_trait]
impl<P, S, C> AgentService for AgentEngine<P, S, C>
where
    P: ModelProvider,
    S: SessionStore,
    C: CostStore,
{
    async fn handle(
        &self,
        session_id: Option<String>,
        message: &str,
    ) -> Result<AgentReply, AgentError> {
        self.handle_message(
            session_id,
            message,
            &PrefetchedContext::default(),
            Some(Instant::now() + AGENT_DEADLINE),
        )
        .await
    }
}

// ─── Schedules ───────────────────────────────────────────────────────────────

#[async_trait]
pub trait ScheduleService: Send + Sync {
    async fn create(&self, definition: ScheduleDefinition) -> Result<String, ScheduleError>;
}

#[async_trait]
impl<B, S, T> ScheduleService for ControlPlane<B, S, T>
where
    B: SchedulerBackend,
    S: ScheduleStore,
    T: BusTransport,
{
    async fn create(&self, definition: ScheduleDefinition) -> Result<String, ScheduleError> {
        ControlPlane::create(self, definition).await
    }
}

// ─── Messages ────────────────────────────────────────────────────────────────

#[async_trait]
pub trait MessageIngress: Send + Sync {
    /// Persist the envelope, then put it on the bus.  Returns the id.
    async fn submit(&self, message: Message) -> Result<String, BusError>;
}

/// The production ingress path: persist once, publish once.
pub struct MessagePipeline<T: BusTransport, M: MessageStore> {
    publisher: Publisher<T>,
    store: M,
}

impl<T: BusTransport, M: MessageStore> MessagePipeline<T, M> {
    pub fn new(publisher: Publisher<T>, store: M) -> Self {
        Self { publisher, store }
    }
}

#[async_trait]
impl<T: BusTransport, M: MessageStore> MessageIngress for MessagePipeline<T, M> {
    async fn submit(&self, mut message: Message) -> Result<String, BusError> {
        let id = self.publisher.publish(&mut message).await?;
        let envelope = serde_json::to_value(&message)
            .map_err(|e| BusError::Validation(format!("envelope serialization: {e}")))?;
        self.store
            .put(&id, &envelope)
            .await
            .map_err(|e| BusError::Validation(format!("message persist: {e}")))?;
        Ok(id)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
