// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::Value;

/// A single tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier assigned by the model, forwarded verbatim into the
    /// paired tool result.
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments.
    pub args: Value,
}

/// The result of executing a tool.
///
/// Execution failures are results, not errors: the model sees the message
/// and can recover.  Protocol-level problems (unknown tool, invalid input)
/// are surfaced by the registry instead.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn err(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: message.into(),
            is_error: true,
        }
    }
}

/// Trait every tool implements.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema of the input object.  Frozen: this is the external
    /// contract of the MCP endpoint.
    fn input_schema(&self) -> Value;
    /// Execute the tool.  Failures are wrapped in [`ToolOutput::err`].
    async fn execute(&self, call: &ToolCall) -> ToolOutput;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_output_is_not_error() {
        let out = ToolOutput::ok("c1", "fine");
        assert_eq!(out.call_id, "c1");
        assert_eq!(out.content, "fine");
        assert!(!out.is_error);
    }

    #[test]
    fn err_output_is_error() {
        let out = ToolOutput::err("c2", "broke");
        assert!(out.is_error);
        assert_eq!(out.content, "broke");
    }
}
