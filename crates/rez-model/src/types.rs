use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Content blocks ──────────────────────────────────────────────────────────

/// A single content block inside a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// The model requests a tool invocation.
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// The caller reports one tool's outcome.  Failed calls still produce a
    /// result block (with `is_error: true`) — omitting one breaks the
    /// pairing invariant and the API rejects the whole conversation.
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in the ordered conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// Assistant message with explicit blocks (text and/or tool_use).
    pub fn assistant_blocks(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// The user message that answers an assistant's tool-use blocks.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: results,
        }
    }

    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The tool-use blocks of this message, in order.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &Value)> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }

    pub fn has_tool_use(&self) -> bool {
        self.content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolUse { .. }))
    }
}

// ─── Requests and responses ──────────────────────────────────────────────────

/// A tool definition handed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the input object.
    pub input_schema: Value,
}

/// Why the model stopped emitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ToolUse,
    /// Anything the API reports that we do not model; treated as a failure
    /// by the conversation engine.
    Other(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn add(&mut self, other: Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// One complete model turn.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

impl ModelResponse {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn tool_uses(&self) -> Vec<(&str, &str, &Value)> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }
}

// ─── Sequence invariants ─────────────────────────────────────────────────────

/// Validate the conversation-ordering invariants the model API enforces.
///
/// 1. A system message may appear only at index 0, and only once.
/// 2. Every assistant message containing tool-use blocks is immediately
///    followed by a user message whose content is exactly the matching
///    tool-result blocks, with ids in the same order.
///
/// Violations are unrecoverable API validation failures when sent upstream,
/// so callers check here first and treat a failure as a programming defect.
pub fn validate_sequence(messages: &[Message]) -> Result<(), String> {
    for (i, m) in messages.iter().enumerate() {
        if m.role == Role::System && i != 0 {
            return Err(format!("system message at index {i}, only index 0 is legal"));
        }
    }
    let system_count = messages.iter().filter(|m| m.role == Role::System).count();
    if system_count > 1 {
        return Err(format!("{system_count} system messages, at most 1 is legal"));
    }

    for (i, m) in messages.iter().enumerate() {
        if m.role != Role::Assistant {
            continue;
        }
        let uses = m.tool_uses();
        if uses.is_empty() {
            continue;
        }
        let Some(next) = messages.get(i + 1) else {
            return Err(format!(
                "assistant tool_use at index {i} has no following tool_result message"
            ));
        };
        if next.role != Role::User {
            return Err(format!(
                "message after tool_use at index {i} has role {:?}, expected user",
                next.role
            ));
        }
        let results: Vec<&str> = next
            .content
            .iter()
            .map(|b| match b {
                ContentBlock::ToolResult { tool_use_id, .. } => Ok(tool_use_id.as_str()),
                other => Err(format!(
                    "non-tool_result block {other:?} in the pairing message at index {}",
                    i + 1
                )),
            })
            .collect::<Result<_, _>>()?;
        let use_ids: Vec<&str> = uses.iter().map(|(id, _, _)| *id).collect();
        if results != use_ids {
            return Err(format!(
                "tool_result ids {results:?} do not match tool_use ids {use_ids:?} at index {i}"
            ));
        }
    }
    Ok(())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
