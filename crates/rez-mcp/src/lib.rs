// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The MCP tool server: a JSON-RPC 2.0 endpoint wrapping a
//! [`rez_tools::ToolRegistry`].
//!
//! Two failure channels, deliberately distinct: protocol problems (bad
//! JSON, unknown method, unknown tool, invalid params, missing API key)
//! are JSON-RPC errors; tool *execution* failures come back as successful
//! responses whose content carries `is_error: true`, so the model client
//! sees the message and can recover in-conversation.

mod jsonrpc;
mod server;

pub use jsonrpc::{
    RpcError, RpcId, RpcRequest, RpcResponse, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND, NOT_INITIALIZED, PARSE_ERROR, PROTOCOL_VERSION, TOOL_EXECUTION_FAILED,
    TOOL_NOT_FOUND, UNAUTHORIZED,
};
pub use server::McpServer;
