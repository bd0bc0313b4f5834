// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use rez_bus::Message;
use rez_mcp::McpServer;
use rez_scheduler::ScheduleDefinition;

use crate::error::ApiError;
use crate::services::{AgentService, MessageIngress, ScheduleService};

/// Everything the routes need, type-erased behind the service seams.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<dyn AgentService>,
    pub schedules: Arc<dyn ScheduleService>,
    pub messages: Arc<dyn MessageIngress>,
    pub mcp: Arc<McpServer>,
}

/// Build the ingress router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/messages", post(submit_message))
        .route("/api/schedules", post(create_schedule))
        .route("/mcp", post(mcp))
        .route("/agent", post(agent))
        .route("/agent/card", get(agent_card))
        .route("/agent/.well-known/agent-card", get(agent_card))
        .with_state(state)
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn submit_message(
    State(state): State<AppState>,
    Json(message): Json<Message>,
) -> Result<Response, ApiError> {
    let id = state.messages.submit(message).await?;
    info!(message_id = %id, "message accepted");
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))).into_response())
}

async fn create_schedule(
    State(state): State<AppState>,
    Json(definition): Json<ScheduleDefinition>,
) -> Result<Response, ApiError> {
    let id = state.schedules.create(definition).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "id": id }))).into_response())
}

async fn mcp(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    match state.mcp.handle(&body, api_key).await {
        Some(response_body) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            response_body,
        )
            .into_response(),
        // A notification-only body owes no response.
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct AgentRequest {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
}

async fn agent(
    State(state): State<AppState>,
    Json(request): Json<AgentRequest>,
) -> Result<Response, ApiError> {
    let reply = state
        .agent
        .handle(request.session_id, &request.message)
        .await?;
    Ok(Json(json!({
        "session_id": reply.session_id,
        "message": reply.message,
        "usage": {
            "input_tokens": reply.usage.input_tokens,
            "output_tokens": reply.usage.output_tokens,
        },
    }))
    .into_response())
}

/// Static capability descriptor, served on both well-known paths.
async fn agent_card() -> Json<serde_json::Value> {
    Json(json!({
        "name": "rez",
        "description": "Agentic tee-time assistant: searches, books, and reports on golf reservations.",
        "version": env!("CARGO_PKG_VERSION"),
        "capabilities": {
            "streaming": false,
            "sessions": true,
        },
        "skills": [
            { "name": "golf_search_tee_times", "description": "Search available tee times" },
            { "name": "golf_book_tee_time", "description": "Book a tee time" },
            { "name": "golf_get_reservations", "description": "List upcoming reservations" },
            { "name": "get_weather", "description": "Course weather forecast" },
            { "name": "send_push_notification", "description": "Notify the user" },
        ],
    }))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use rez_bus::BusError;
    use rez_core::{AgentError, AgentReply};
    use rez_model::Usage;
    use rez_scheduler::ScheduleError;
    use rez_tools::ToolRegistry;
    use tower::ServiceExt;

    struct StubAgent {
        result: fn() -> Result<AgentReply, AgentError>,
    }

    #[async_trait]
    impl AgentService for StubAgent {
        async fn handle(
            &self,
            _session_id: Option<String>,
            _message: &str,
        ) -> Result<AgentReply, AgentError> {
            (self.result)()
        }
    }

    struct StubSchedules;

    #[async_trait]
    impl ScheduleService for StubSchedules {
        async fn create(&self, definition: ScheduleDefinition) -> Result<String, ScheduleError> {
            if definition.name == "taken" {
                Err(ScheduleError::Conflict("taken".into()))
            } else {
                Ok("sch-1".into())
            }
        }
    }

    struct StubIngress;

    #[async_trait]
    impl MessageIngress for StubIngress {
        async fn submit(&self, message: Message) -> Result<String, BusError> {
            Ok(message.id)
        }
    }

    fn state() -> AppState {
        state_with_agent(|| {
            Ok(AgentReply {
                session_id: "s-1".into(),
                message: "done".into(),
                usage: Usage { input_tokens: 10, output_tokens: 5 },
            })
        })
    }

    fn state_with_agent(result: fn() -> Result<AgentReply, AgentError>) -> AppState {
        AppState {
            agent: Arc::new(StubAgent { result }),
            schedules: Arc::new(StubSchedules),
            messages: Arc::new(StubIngress),
            mcp: Arc::new(McpServer::new(Arc::new(ToolRegistry::new()), Some("k".into()))),
        }
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            json!(null)
        } else {
            serde_json::from_slice(&bytes).unwrap_or(json!(null))
        };
        (status, body)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    // ── /agent ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn agent_happy_path_returns_reply() {
        let (status, body) = send(
            router(state()),
            post_json("/agent", json!({ "message": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_id"], "s-1");
        assert_eq!(body["message"], "done");
        assert_eq!(body["usage"]["input_tokens"], 10);
    }

    #[tokio::test]
    async fn agent_budget_exhaustion_is_429_with_retry_after() {
        let router = router(state_with_agent(|| {
            Err(AgentError::BudgetExceeded {
                current_cost: "4.95".parse().unwrap(),
                remaining_budget: "0.05".parse().unwrap(),
                retry_after_secs: 900,
            })
        }));
        let response = router
            .oneshot(post_json("/agent", json!({ "message": "hi" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get("retry-after").unwrap().to_str().unwrap(),
            "900"
        );
    }

    #[tokio::test]
    async fn agent_deadline_is_504() {
        let (status, _) = send(
            router(state_with_agent(|| Err(AgentError::Deadline { iterations: 7 }))),
            post_json("/agent", json!({ "message": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    }

    // ── /api/schedules ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn schedule_create_returns_202() {
        let (status, body) = send(
            router(state()),
            post_json(
                "/api/schedules",
                json!({
                    "name": "daily-golf-check",
                    "expression": "cron(0 12 * * ? *)",
                    "timezone": "America/New_York",
                    "target_type": "web_action",
                    "payload_template": { "action": "golf" }
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["id"], "sch-1");
    }

    #[tokio::test]
    async fn duplicate_schedule_name_is_409() {
        let (status, _) = send(
            router(state()),
            post_json(
                "/api/schedules",
                json!({
                    "name": "taken",
                    "expression": "cron(0 12 * * ? *)",
                    "timezone": "UTC",
                    "target_type": "notify",
                    "payload_template": {}
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    // ── /api/messages ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn message_submission_returns_201_with_id() {
        use rez_bus::{MessagePayload, MessageType, Producer};
        use rez_config::Stage;
        let message = Message::new(
            Producer::User,
            Stage::Dev,
            MessageType::Notify,
            MessagePayload::Json(json!({ "message": "hi" })),
        );
        let expected_id = message.id.clone();
        let (status, body) = send(
            router(state()),
            post_json("/api/messages", serde_json::to_value(&message).unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], expected_id.as_str());
    }

    #[tokio::test]
    async fn malformed_message_body_is_4xx() {
        let (status, _) = send(
            router(state()),
            post_json("/api/messages", json!({ "not": "an envelope" })),
        )
        .await;
        assert!(status.is_client_error(), "{status}");
    }

    // ── /mcp ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn mcp_without_key_gets_unauthorized_error_envelope() {
        let (status, body) = send(
            router(state()),
            post_json("/mcp", json!({ "jsonrpc": "2.0", "method": "ping", "id": 1 })),
        )
        .await;
        // JSON-RPC over HTTP: transport says 200, the envelope carries the error.
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"]["code"], rez_mcp::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn mcp_with_key_initializes() {
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .header("x-api-key", "k")
            .body(Body::from(
                json!({
                    "jsonrpc": "2.0",
                    "method": "initialize",
                    "params": { "protocolVersion": "2024-11-05", "clientInfo": { "name": "t" } },
                    "id": 1
                })
                .to_string(),
            ))
            .unwrap();
        let (status, body) = send(router(state()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["serverInfo"]["name"], "rez-mcp");
    }

    // ── Agent card ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn agent_card_served_on_both_paths() {
        for uri in ["/agent/card", "/agent/.well-known/agent-card"] {
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
            let (status, body) = send(router(state()), request).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(body["name"], "rez");
            assert!(body["skills"].as_array().unwrap().len() >= 5);
        }
    }
}
