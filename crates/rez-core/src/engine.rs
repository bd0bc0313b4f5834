// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use rez_model::{
    converse_with_retry, ContentBlock, ConverseRequest, Message, ModelError, ModelProvider, Role,
    StopReason, ToolSpec, Usage,
};
use rez_store::{
    seconds_until_utc_midnight, CostLimiter, CostStore, SessionStore, StoreError,
};
use rez_tools::{RegistryError, ToolCall, ToolRegistry};

use crate::limiter::IngressLimiter;
use crate::prompts::{system_prompt, PrefetchedContext};

/// Messages that short-circuit the loop and answer with cost status.
const COST_COMMANDS: &[&str] = &["cost", "usage", "spending", "budget"];

/// Token overhead of the system prompt, tool schemas, and response budget
/// used for the conservative pre-call estimate.
const ESTIMATE_BASE_INPUT_TOKENS: u64 = 3_000;
const ESTIMATE_OUTPUT_TOKENS: u64 = 1_000;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard ceiling on model turns in one conversation step.
    pub max_iterations: u32,
    /// Application-level attempts when the model throttles.
    pub llm_max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            llm_max_retries: 5,
        }
    }
}

/// A completed conversation step.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub session_id: String,
    pub message: String,
    pub usage: Usage,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Ingress token bucket is empty.  HTTP 429 upstream.
    #[error("rate limited")]
    RateLimited,
    /// Daily budget would be exceeded.  The model was never called.
    #[error("daily cost cap reached: spent {current_cost} of the cap")]
    BudgetExceeded {
        current_cost: Decimal,
        remaining_budget: Decimal,
        /// Seconds until the UTC-midnight reset, for `Retry-After`.
        retry_after_secs: u64,
    },
    /// The platform deadline arrived mid-conversation.  The session was
    /// persisted for inspection.  HTTP 504 upstream.
    #[error("deadline exceeded after {iterations} iterations")]
    Deadline { iterations: u32 },
    /// The loop ran out of iterations without a final text.
    #[error("no final response after {0} iterations")]
    NoResponse(u32),
    /// The model reported a stop reason we do not handle.
    #[error("unexpected stop reason: {0}")]
    UnexpectedStop(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The conversation engine.  Stateless across calls: everything lives in
/// the session store.
pub struct AgentEngine<P, S, C>
where
    P: ModelProvider,
    S: SessionStore,
    C: CostStore,
{
    model: P,
    tools: Arc<ToolRegistry>,
    sessions: S,
    cost: CostLimiter<C>,
    limiter: IngressLimiter,
    config: EngineConfig,
}

impl<P, S, C> AgentEngine<P, S, C>
where
    P: ModelProvider,
    S: SessionStore,
    C: CostStore,
{
    pub fn new(
        model: P,
        tools: Arc<ToolRegistry>,
        sessions: S,
        cost: CostLimiter<C>,
        limiter: IngressLimiter,
        config: EngineConfig,
    ) -> Self {
        Self {
            model,
            tools,
            sessions,
            cost,
            limiter,
            config,
        }
    }

    /// The underlying provider.  Used by callers that wire scripted
    /// providers in tests and need to inspect what the model saw.
    pub fn model(&self) -> &P {
        &self.model
    }

    /// Run one conversation step: append the user message, loop the model
    /// to completion, persist, reply.
    ///
    /// `deadline` is the platform cutoff minus a safety margin; `None`
    /// means unbounded (tests, CLI).
    pub async fn handle_message(
        &self,
        session_id: Option<String>,
        user_message: &str,
        context: &PrefetchedContext,
        deadline: Option<Instant>,
    ) -> Result<AgentReply, AgentError> {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        // Command messages bypass the model entirely.
        if let Some(reply) = self.cost_command(&session_id, user_message).await? {
            return Ok(reply);
        }

        if self.limiter.acquire().await.is_err() {
            warn!(%session_id, "agent request rate limited");
            return Err(AgentError::RateLimited);
        }

        // Budget gate BEFORE any model call.
        let estimate = CostLimiter::<C>::estimate(
            ESTIMATE_BASE_INPUT_TOKENS + (user_message.len() as u64) / 4,
            ESTIMATE_OUTPUT_TOKENS,
        );
        let decision = self.cost.check_budget(estimate).await?;
        if !decision.allowed {
            info!(%session_id, current = %decision.current_cost, "budget gate rejected request");
            return Err(AgentError::BudgetExceeded {
                current_cost: decision.current_cost,
                remaining_budget: decision.remaining_budget,
                retry_after_secs: seconds_until_utc_midnight(Utc::now()),
            });
        }

        let mut session = self.sessions.load(&session_id).await?;

        // Single system prefix: insert once, gated on "is the first message
        // already a system message" — never re-prepended on later steps.
        if session.messages.is_empty() {
            session.messages.push(Message::system(system_prompt(Utc::now(), context)));
        }
        debug_assert!(
            session.messages.first().map(|m| m.role == Role::System).unwrap_or(false)
                && session.messages.iter().filter(|m| m.role == Role::System).count() == 1,
            "conversation must start with exactly one system message"
        );

        session.messages.push(Message::user(user_message));

        let tools = self.tool_specs();
        let mut total_usage = Usage::default();
        let mut final_text: Option<String> = None;
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            iterations += 1;

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    warn!(%session_id, iterations, "deadline reached, persisting partial session");
                    self.sessions.save(&session).await?;
                    return Err(AgentError::Deadline { iterations });
                }
            }

            let request = ConverseRequest {
                system: None,
                messages: session.messages.clone(),
                tools: tools.clone(),
            };
            let response = match converse_with_retry(
                &self.model,
                request,
                self.config.llm_max_retries,
            )
            .await
            {
                Ok(response) => response,
                Err(e) => {
                    self.sessions.save(&session).await?;
                    return Err(e.into());
                }
            };

            total_usage.add(response.usage);
            self.cost
                .record_actual(
                    response.usage.input_tokens as u64,
                    response.usage.output_tokens as u64,
                )
                .await?;

            match response.stop_reason {
                StopReason::EndTurn | StopReason::MaxTokens => {
                    let text = response.text();
                    session.messages.push(Message::assistant_blocks(response.content));
                    final_text = Some(text);
                    break;
                }
                StopReason::ToolUse => {
                    let (results, notified) = self.run_tools(&session_id, &response.content).await;
                    session.messages.push(Message::assistant_blocks(response.content));
                    session.messages.push(Message::tool_results(results));

                    // The user has been notified; another model turn adds
                    // nothing.
                    if notified {
                        final_text = Some("Notification sent.".to_string());
                        break;
                    }
                }
                StopReason::Other(reason) => {
                    self.sessions.save(&session).await?;
                    return Err(AgentError::UnexpectedStop(reason));
                }
            }
        }

        self.sessions.save(&session).await?;
        let message = final_text.ok_or(AgentError::NoResponse(iterations))?;
        info!(%session_id, iterations, "conversation step complete");
        Ok(AgentReply {
            session_id,
            message,
            usage: total_usage,
        })
    }

    /// Execute every tool-use block in order, producing one result per use —
    /// failures included, never omitted — plus whether a push notification
    /// went out successfully.
    async fn run_tools(
        &self,
        session_id: &str,
        blocks: &[ContentBlock],
    ) -> (Vec<ContentBlock>, bool) {
        let mut results = Vec::new();
        let mut notified = false;

        for block in blocks {
            let ContentBlock::ToolUse { id, name, input } = block else {
                continue;
            };
            debug!(%session_id, tool = %name, "dispatching tool call");
            let call = ToolCall {
                id: id.clone(),
                name: name.clone(),
                args: input.clone(),
            };
            let (content, is_error) = match self.tools.execute(&call).await {
                Ok(output) => (output.content, output.is_error),
                // Registry-level refusals still produce a result block; the
                // pairing invariant does not care why a call failed.
                Err(RegistryError::UnknownTool(tool)) => {
                    (format!("tool {tool:?} does not exist"), true)
                }
                Err(RegistryError::InvalidInput { message, .. }) => (message, true),
                Err(RegistryError::Duplicate(tool)) => {
                    (format!("tool {tool:?} misconfigured"), true)
                }
            };
            if name == "send_push_notification" && !is_error {
                notified = true;
            }
            results.push(ContentBlock::ToolResult {
                tool_use_id: id.clone(),
                content,
                is_error,
            });
        }
        (results, notified)
    }

    async fn cost_command(
        &self,
        session_id: &str,
        user_message: &str,
    ) -> Result<Option<AgentReply>, AgentError> {
        let normalized = user_message.trim().to_lowercase();
        if !COST_COMMANDS.contains(&normalized.as_str()) {
            return Ok(None);
        }
        let usage = self.cost.get_usage().await?;
        let message = format!(
            "Today's usage: ${} of ${} ({} requests, {} input / {} output tokens).",
            usage.total_cost,
            self.cost.daily_cap(),
            usage.request_count,
            usage.input_tokens,
            usage.output_tokens,
        );
        Ok(Some(AgentReply {
            session_id: session_id.to_string(),
            message,
            usage: Usage::default(),
        }))
    }

    fn tool_specs(&self) -> Vec<ToolSpec> {
        self.tools
            .schemas()
            .into_iter()
            .map(|(name, description, input_schema)| ToolSpec {
                name,
                description,
                input_schema,
            })
            .collect()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
