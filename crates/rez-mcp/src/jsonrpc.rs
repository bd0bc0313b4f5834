// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP protocol revision this server speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

// JSON-RPC 2.0 reserved codes.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

// MCP-specific codes, outside the reserved range.
/// `tools/call` named a tool the registry does not have.
pub const TOOL_NOT_FOUND: i64 = -32000;
/// Reserved for tools that cannot produce any output at all.  Ordinary
/// execution failures do NOT use this — they return `is_error: true`
/// inside a successful response.
pub const TOOL_EXECUTION_FAILED: i64 = -32001;
/// A method other than `initialize` arrived before `initialize`.
pub const NOT_INITIALIZED: i64 = -32002;
/// Missing or mismatched API key.
pub const UNAUTHORIZED: i64 = -32003;

/// Request id: number, string, or absent (a notification).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(i64),
    String(String),
    Null,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<RpcId>,
}

impl RpcRequest {
    /// A request without an id is a notification: it gets no response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: RpcId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: RpcId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: RpcId, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(error),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_with_numeric_id_parses() {
        let req: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"ping","id":7}"#).unwrap();
        assert_eq!(req.method, "ping");
        assert_eq!(req.id, Some(RpcId::Number(7)));
        assert!(!req.is_notification());
    }

    #[test]
    fn request_with_string_id_parses() {
        let req: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"ping","id":"a-1"}"#).unwrap();
        assert_eq!(req.id, Some(RpcId::String("a-1".into())));
    }

    #[test]
    fn request_without_id_is_notification() {
        let req: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"ping"}"#).unwrap();
        assert!(req.is_notification());
    }

    #[test]
    fn success_response_omits_error_member() {
        let resp = RpcResponse::success(RpcId::Number(1), json!({ "ok": true }));
        let text = serde_json::to_string(&resp).unwrap();
        assert!(text.contains("\"result\""));
        assert!(!text.contains("\"error\""));
    }

    #[test]
    fn failure_response_omits_result_member() {
        let resp = RpcResponse::failure(RpcId::Null, RpcError::new(PARSE_ERROR, "bad json"));
        let text = serde_json::to_string(&resp).unwrap();
        assert!(text.contains("-32700"));
        assert!(!text.contains("\"result\""));
    }

    #[test]
    fn mcp_codes_stay_clear_of_reserved_range() {
        for code in [TOOL_NOT_FOUND, TOOL_EXECUTION_FAILED, NOT_INITIALIZED, UNAUTHORIZED] {
            assert!(code > -32100 && code <= -32000, "{code} in server range");
        }
    }
}
