// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::tool::{Tool, ToolCall, ToolOutput};

/// Notification priority as the push provider understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    Low,
    #[default]
    Default,
    High,
}

impl Priority {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "low" => Some(Priority::Low),
            "default" => Some(Priority::Default),
            "high" => Some(Priority::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Default => "default",
            Priority::High => "high",
        }
    }
}

/// Delivery seam.  The production implementation publishes a notify
/// message onto the bus; the push provider itself is someone else's
/// problem.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        title: Option<&str>,
        message: &str,
        priority: Priority,
    ) -> anyhow::Result<()>;
}

/// Test notifier that records what it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Option<String>, String, Priority)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        title: Option<&str>,
        message: &str,
        priority: Priority,
    ) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((title.map(String::from), message.to_string(), priority));
        Ok(())
    }
}

pub struct SendPushNotificationTool {
    pub notifier: Arc<dyn Notifier>,
}

#[async_trait]
impl Tool for SendPushNotificationTool {
    fn name(&self) -> &str {
        "send_push_notification"
    }

    fn description(&self) -> &str {
        "Send a push notification to the user's devices. \
         Use this to report results the user should see immediately, such as \
         a booked tee time or a problem that needs their attention."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Short headline shown above the message"
                },
                "message": {
                    "type": "string",
                    "description": "Notification body text"
                },
                "priority": {
                    "type": "string",
                    "enum": ["low", "default", "high"],
                    "description": "Delivery priority (default: default)"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let message = call.args["message"].as_str().unwrap_or_default();
        let title = call.args["title"].as_str();
        let priority = call.args["priority"]
            .as_str()
            .and_then(Priority::parse)
            .unwrap_or_default();

        match self.notifier.notify(title, message, priority).await {
            Ok(()) => {
                info!(priority = priority.as_str(), "push notification sent");
                ToolOutput::ok(&call.id, "notification sent")
            }
            Err(e) => ToolOutput::err(&call.id, format!("notification failed: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
