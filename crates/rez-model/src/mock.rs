// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Scripted provider for tests.
//!
//! Plays back a fixed queue of responses while recording every request it
//! receives, and — because it runs the same [`validate_sequence`] check as
//! the real client — any ordering bug in the conversation engine fails the
//! test exactly where the real API would reject it.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::provider::{ConverseRequest, ModelError, ModelProvider};
use crate::types::{validate_sequence, ContentBlock, ModelResponse, StopReason, Usage};

pub struct ScriptedProvider {
    script: Mutex<std::collections::VecDeque<Result<ModelResponse, ModelError>>>,
    requests: Mutex<Vec<ConverseRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Default::default()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a plain end-of-turn text response.
    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.push_response(ModelResponse {
            content: vec![ContentBlock::Text { text: text.into() }],
            stop_reason: StopReason::EndTurn,
            usage: Usage { input_tokens: 100, output_tokens: 20 },
        })
    }

    /// Queue a tool-use turn: the model asks for `name(input)` under `id`.
    pub fn push_tool_use(&self, id: &str, name: &str, input: Value) -> &Self {
        self.push_response(ModelResponse {
            content: vec![ContentBlock::ToolUse {
                id: id.into(),
                name: name.into(),
                input,
            }],
            stop_reason: StopReason::ToolUse,
            usage: Usage { input_tokens: 100, output_tokens: 30 },
        })
    }

    pub fn push_response(&self, response: ModelResponse) -> &Self {
        self.script.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn push_error(&self, error: ModelError) -> &Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    /// Every request seen so far, in call order.
    pub fn requests(&self) -> Vec<ConverseRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn model_id(&self) -> &str {
        "scripted-mock"
    }

    async fn converse(&self, req: ConverseRequest) -> Result<ModelResponse, ModelError> {
        validate_sequence(&req.messages).map_err(ModelError::InvalidSequence)?;
        self.requests.lock().unwrap().push(req);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ModelError::Api {
                    status: 500,
                    message: "scripted provider ran out of responses".into(),
                })
            })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
