// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

use rez_bus::BusError;
use rez_core::AgentError;
use rez_scheduler::ScheduleError;

/// The one error shape leaving the gateway: a status, a structured body,
/// and optionally a `Retry-After` header.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: serde_json::Value,
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
            retry_after_secs: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(secs) = self.retry_after_secs {
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::RateLimited => {
                warn!("agent request rate limited");
                ApiError::new(StatusCode::TOO_MANY_REQUESTS, "rate limited")
            }
            AgentError::BudgetExceeded {
                current_cost,
                remaining_budget,
                retry_after_secs,
            } => ApiError {
                status: StatusCode::TOO_MANY_REQUESTS,
                body: json!({
                    "error": "daily cost cap reached",
                    "current_cost": current_cost,
                    "remaining_budget": remaining_budget,
                    "retry_after_secs": retry_after_secs,
                }),
                retry_after_secs: Some(retry_after_secs),
            },
            AgentError::Deadline { .. } => {
                ApiError::new(StatusCode::GATEWAY_TIMEOUT, "deadline exceeded")
            }
            other => {
                error!(error = %other, "agent request failed");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl From<ScheduleError> for ApiError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::Conflict(name) => ApiError::new(
                StatusCode::CONFLICT,
                format!("schedule {name:?} already exists with a different definition"),
            ),
            ScheduleError::Invalid(message) => ApiError::new(StatusCode::BAD_REQUEST, message),
            ScheduleError::NotFound(name) => {
                ApiError::new(StatusCode::NOT_FOUND, format!("schedule {name:?} not found"))
            }
            other => {
                error!(error = %other, "schedule request failed");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl From<BusError> for ApiError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Validation(message) => ApiError::new(StatusCode::BAD_REQUEST, message),
            other => {
                error!(error = %other, "message submission failed");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
