// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The Converse inference client.
//!
//! Non-streaming `POST /model/{modelId}/converse`, signed locally (see
//! [`crate::sign`]).  Tool-use and tool-result blocks map one-to-one onto
//! the wire's `toolUse` / `toolResult` content members, which is what makes
//! the strict pairing invariant checkable before serialization.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use crate::provider::{ConverseRequest, ModelError, ModelProvider};
use crate::sign::{encode_path, sign_post, Credentials};
use crate::types::{validate_sequence, ContentBlock, ModelResponse, Role, StopReason, Usage};

/// Default per-call deadline for inference requests.
const MODEL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ConverseProvider {
    model: String,
    region: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl ConverseProvider {
    pub fn new(model: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            region: region.into(),
            max_tokens: 4096,
            client: reqwest::Client::builder()
                .timeout(MODEL_TIMEOUT)
                .build()
                .expect("reqwest client"),
        }
    }

    fn endpoint(&self) -> (String, String) {
        let host = format!("bedrock-runtime.{}.amazonaws.com", self.region);
        let path = format!("/model/{}/converse", encode_path(&self.model));
        (host, path)
    }

    fn build_body(&self, req: &ConverseRequest) -> Value {
        let mut wire_messages: Vec<Value> = Vec::new();
        let mut system_parts: Vec<Value> = Vec::new();

        if let Some(system) = &req.system {
            system_parts.push(json!({ "text": system }));
        }

        for message in &req.messages {
            // A system message in the log is carried in the dedicated system
            // array; the wire rejects a "system" role inside messages.
            if message.role == Role::System {
                let text = message.text();
                if !text.is_empty() {
                    system_parts.push(json!({ "text": text }));
                }
                continue;
            }
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => unreachable!(),
            };
            let content: Vec<Value> = message.content.iter().map(block_to_wire).collect();
            wire_messages.push(json!({ "role": role, "content": content }));
        }

        let mut body = json!({
            "messages": wire_messages,
            "inferenceConfig": { "maxTokens": self.max_tokens },
        });
        if !system_parts.is_empty() {
            body["system"] = json!(system_parts);
        }
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "toolSpec": {
                            "name": t.name,
                            "description": t.description,
                            "inputSchema": { "json": t.input_schema },
                        }
                    })
                })
                .collect();
            body["toolConfig"] = json!({ "tools": tools });
        }
        body
    }
}

fn block_to_wire(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({ "text": text }),
        ContentBlock::ToolUse { id, name, input } => json!({
            "toolUse": { "toolUseId": id, "name": name, "input": input }
        }),
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            let mut result = json!({
                "toolUseId": tool_use_id,
                "content": [{ "text": content }],
            });
            if *is_error {
                result["status"] = json!("error");
            }
            json!({ "toolResult": result })
        }
    }
}

/// Decode the wire response into a [`ModelResponse`].
fn decode_response(body: &Value) -> ModelResponse {
    let mut content = Vec::new();
    if let Some(blocks) = body["output"]["message"]["content"].as_array() {
        for block in blocks {
            if let Some(text) = block["text"].as_str() {
                content.push(ContentBlock::Text { text: text.to_string() });
            }
            if let Some(tool_use) = block.get("toolUse") {
                content.push(ContentBlock::ToolUse {
                    id: tool_use["toolUseId"].as_str().unwrap_or_default().to_string(),
                    name: tool_use["name"].as_str().unwrap_or_default().to_string(),
                    input: tool_use["input"].clone(),
                });
            }
        }
    }

    let stop_reason = match body["stopReason"].as_str() {
        Some("end_turn") => StopReason::EndTurn,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("tool_use") => StopReason::ToolUse,
        Some(other) => StopReason::Other(other.to_string()),
        None => StopReason::Other("missing stopReason".into()),
    };

    let usage = Usage {
        input_tokens: body["usage"]["inputTokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: body["usage"]["outputTokens"].as_u64().unwrap_or(0) as u32,
    };

    ModelResponse { content, stop_reason, usage }
}

#[async_trait]
impl ModelProvider for ConverseProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn converse(&self, req: ConverseRequest) -> Result<ModelResponse, ModelError> {
        validate_sequence(&req.messages).map_err(ModelError::InvalidSequence)?;

        let creds = Credentials::from_env().map_err(|e| ModelError::Transport(e.to_string()))?;
        let body = self.build_body(&req);
        let body_bytes =
            serde_json::to_vec(&body).map_err(|e| ModelError::Transport(e.to_string()))?;
        let (host, path) = self.endpoint();
        let signed = sign_post(
            &creds,
            "bedrock",
            &self.region,
            &host,
            &path,
            &body_bytes,
            Utc::now(),
        );

        debug!(model = %self.model, region = %self.region, "inference request");

        let mut request = self
            .client
            .post(format!("https://{host}{path}"))
            .header("content-type", "application/json")
            .header("x-amz-date", &signed.amz_date)
            .header("Authorization", &signed.authorization)
            .body(body_bytes);
        if let Some(token) = &signed.security_token {
            request = request.header("x-amz-security-token", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ModelError::Throttled { retry_after_secs });
        }
        if status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(ModelError::Transport(format!("{status}: {text}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // The service reports throttling as a 400 with this exception
            // type in some regions.
            if text.contains("ThrottlingException") {
                return Err(ModelError::Throttled { retry_after_secs: None });
            }
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ModelError::Transport(format!("response decode: {e}")))?;
        Ok(decode_response(&body))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
