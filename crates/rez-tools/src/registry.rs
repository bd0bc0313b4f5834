// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::validate::validate_input;

/// Registry-level failures.  These are protocol errors, distinct from tool
/// execution failures (which come back as `ToolOutput { is_error: true }`).
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool {0:?} is already registered")]
    Duplicate(String),
    #[error("unknown tool {0:?}")]
    UnknownTool(String),
    #[error("invalid input for {tool:?}: {message}")]
    InvalidInput { tool: String, message: String },
}

/// Name → tool map.  Registration is one-shot at startup; the registry is
/// immutable afterwards and shared behind an `Arc`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.  Duplicate names fail so a wiring mistake cannot
    /// silently shadow a tool.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        debug!(tool = %name, "tool registered");
        self.tools.insert(name, Arc::new(tool));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Sorted tool names, for stable discovery output.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// `(name, description, input_schema)` for every tool, sorted by name.
    pub fn schemas(&self) -> Vec<(String, String, Value)> {
        let mut out: Vec<(String, String, Value)> = self
            .tools
            .values()
            .map(|t| {
                (
                    t.name().to_string(),
                    t.description().to_string(),
                    t.input_schema(),
                )
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Validate and execute one call.
    ///
    /// Validation failures return an error and the tool never runs — a call
    /// that fails validation has no side effect.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolOutput, RegistryError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| RegistryError::UnknownTool(call.name.clone()))?;

        if let Err(message) = validate_input(&tool.input_schema(), &call.args) {
            warn!(tool = %call.name, %message, "tool input rejected");
            return Err(RegistryError::InvalidInput {
                tool: call.name.clone(),
                message,
            });
        }

        Ok(tool.execute(call).await)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
