// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use crate::types::{Message, ModelResponse, ToolSpec};

/// One inference request: the system prefix is carried separately from the
/// user/assistant log because the wire format wants it that way.
#[derive(Debug, Clone, Default)]
pub struct ConverseRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
}

/// Inference failures, split by handling policy.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// 429 / ThrottlingException.  Retried at the application level with
    /// its own backoff budget, independent of transport retries.
    #[error("model throttled{}", retry_after_secs.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    Throttled { retry_after_secs: Option<u64> },
    /// Connection problems, timeouts, 5xx.  Transient.
    #[error("model transport failure: {0}")]
    Transport(String),
    /// The API rejected the request (4xx other than 429).  Not retryable;
    /// usually a sequence violation or malformed body.
    #[error("model API error {status}: {message}")]
    Api { status: u16, message: String },
    /// The local sequence check failed before any network I/O.  A
    /// programming defect in the caller.
    #[error("invalid message sequence: {0}")]
    InvalidSequence(String),
}

impl ModelError {
    pub fn is_throttle(&self) -> bool {
        matches!(self, ModelError::Throttled { .. })
    }
}

/// The inference surface.  Implemented by [`crate::ConverseProvider`] for
/// the real endpoint and [`crate::ScriptedProvider`] in tests.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn model_id(&self) -> &str;

    /// One non-streaming model turn.
    async fn converse(&self, req: ConverseRequest) -> Result<ModelResponse, ModelError>;
}
