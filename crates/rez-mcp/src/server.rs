// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use rez_tools::{RegistryError, ToolCall, ToolRegistry};

use crate::jsonrpc::{
    RpcError, RpcId, RpcRequest, RpcResponse, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    NOT_INITIALIZED, PARSE_ERROR, PROTOCOL_VERSION, TOOL_NOT_FOUND, UNAUTHORIZED,
};

const SERVER_NAME: &str = "rez-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The MCP server.  One instance per invocation; `initialize` gates every
/// other method for that instance's lifetime.
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    api_key: Option<String>,
    initialized: AtomicBool,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>, api_key: Option<String>) -> Self {
        Self {
            registry,
            api_key,
            initialized: AtomicBool::new(false),
        }
    }

    /// Handle one HTTP body: a single request or a batch.  Returns the
    /// serialized response body, or `None` when nothing is owed (a lone
    /// notification, or a batch of only notifications).
    pub async fn handle(&self, body: &str, presented_key: Option<&str>) -> Option<String> {
        if let Err(error) = self.check_key(presented_key) {
            return Some(serde_json::to_string(&RpcResponse::failure(RpcId::Null, error)).unwrap());
        }

        let parsed: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => {
                let resp =
                    RpcResponse::failure(RpcId::Null, RpcError::new(PARSE_ERROR, e.to_string()));
                return Some(serde_json::to_string(&resp).unwrap());
            }
        };

        match parsed {
            Value::Array(items) => {
                if items.is_empty() {
                    let resp = RpcResponse::failure(
                        RpcId::Null,
                        RpcError::new(INVALID_REQUEST, "empty batch"),
                    );
                    return Some(serde_json::to_string(&resp).unwrap());
                }
                // Each sub-request is handled independently; responses keep
                // the batch order (notifications drop out).
                let mut responses = Vec::new();
                for item in items {
                    if let Some(resp) = self.handle_value(item).await {
                        responses.push(resp);
                    }
                }
                if responses.is_empty() {
                    None
                } else {
                    Some(serde_json::to_string(&responses).unwrap())
                }
            }
            single => self
                .handle_value(single)
                .await
                .map(|resp| serde_json::to_string(&resp).unwrap()),
        }
    }

    fn check_key(&self, presented: Option<&str>) -> Result<(), RpcError> {
        let Some(expected) = &self.api_key else {
            return Ok(());
        };
        let matches = presented
            .map(|p| p.as_bytes().ct_eq(expected.as_bytes()).into())
            .unwrap_or(false);
        if matches {
            Ok(())
        } else {
            warn!("MCP request with missing or mismatched API key");
            Err(RpcError::new(UNAUTHORIZED, "missing or invalid API key"))
        }
    }

    async fn handle_value(&self, value: Value) -> Option<RpcResponse> {
        let request: RpcRequest = match serde_json::from_value(value) {
            Ok(req) => req,
            Err(e) => {
                return Some(RpcResponse::failure(
                    RpcId::Null,
                    RpcError::new(INVALID_REQUEST, format!("not a request object: {e}")),
                ));
            }
        };
        let is_notification = request.is_notification();
        let id = request.id.clone().unwrap_or(RpcId::Null);

        let outcome = self.dispatch(request).await;
        if is_notification {
            return None;
        }
        Some(match outcome {
            Ok(result) => RpcResponse::success(id, result),
            Err(error) => RpcResponse::failure(id, error),
        })
    }

    async fn dispatch(&self, request: RpcRequest) -> Result<Value, RpcError> {
        if request.jsonrpc != "2.0" {
            return Err(RpcError::new(
                INVALID_REQUEST,
                format!("jsonrpc must be \"2.0\", got {:?}", request.jsonrpc),
            ));
        }

        match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            method if !self.initialized.load(Ordering::SeqCst) => Err(RpcError::new(
                NOT_INITIALIZED,
                format!("{method:?} before initialize"),
            )),
            "ping" => Ok(json!({ "status": "pong" })),
            "tools/list" => Ok(self.list_tools()),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("unknown method {other:?}"),
            )),
        }
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let params = params.unwrap_or_else(|| json!({}));
        let client = params["clientInfo"]["name"].as_str().unwrap_or("unknown");
        debug!(client, "MCP initialize");
        self.initialized.store(true, Ordering::SeqCst);
        Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
        }))
    }

    fn list_tools(&self) -> Value {
        let tools: Vec<Value> = self
            .registry
            .schemas()
            .into_iter()
            .map(|(name, description, input_schema)| {
                json!({
                    "name": name,
                    "description": description,
                    "input_schema": input_schema,
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let params = params.ok_or_else(|| RpcError::new(INVALID_PARAMS, "params required"))?;
        let name = params["name"]
            .as_str()
            .ok_or_else(|| RpcError::new(INVALID_PARAMS, "params.name required"))?
            .to_string();
        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));

        let call = ToolCall {
            id: format!("mcp-{name}"),
            name: name.clone(),
            args: arguments,
        };

        match self.registry.execute(&call).await {
            Ok(output) => {
                // Execution failure is a RESULT, so the model client can read
                // the message and try something else.
                let kind = if output.is_error { "error" } else { "text" };
                Ok(json!({
                    "content": [{ "type": kind, "text": output.content }],
                    "is_error": output.is_error,
                }))
            }
            Err(RegistryError::UnknownTool(tool)) => Err(RpcError::new(
                TOOL_NOT_FOUND,
                format!("tool {tool:?} not found"),
            )),
            Err(RegistryError::InvalidInput { tool, message }) => Err(RpcError::new(
                INVALID_PARAMS,
                format!("invalid input for {tool:?}: {message}"),
            )),
            Err(RegistryError::Duplicate(_)) => unreachable!("registration is startup-only"),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
