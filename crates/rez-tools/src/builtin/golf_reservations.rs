// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::builtin::CourseDirectory;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// List the golfer's existing reservations at a course.
pub struct GolfReservationsTool {
    pub directory: Arc<dyn CourseDirectory>,
}

#[async_trait]
impl Tool for GolfReservationsTool {
    fn name(&self) -> &str {
        "golf_get_reservations"
    }

    fn description(&self) -> &str {
        "List the user's upcoming reservations at a course. Use this to \
         avoid booking a day that already has a tee time."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "course_name": {
                    "type": "string",
                    "description": "Configured course name"
                }
            },
            "required": ["course_name"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let course_name = call.args["course_name"].as_str().unwrap_or_default();
        let session = match self.directory.session(course_name).await {
            Ok(session) => session,
            Err(e) => return ToolOutput::err(&call.id, format!("course unavailable: {e}")),
        };

        match session.api.reservations(course_name).await {
            Ok(reservations) if reservations.is_empty() => {
                ToolOutput::ok(&call.id, format!("No upcoming reservations at {course_name}."))
            }
            Ok(reservations) => {
                let mut lines = vec![format!("Upcoming reservations at {course_name}:")];
                for r in &reservations {
                    lines.push(format!(
                        "- {} for {} players (reservation {})",
                        r.start_time, r.num_players, r.reservation_id
                    ));
                }
                ToolOutput::ok(&call.id, lines.join("\n"))
            }
            Err(e) => ToolOutput::err(&call.id, format!("reservation lookup failed: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{CourseSession, InMemoryDirectory};
    use rez_booking::{RecordingGolfApi, ReservationView};
    use rez_web::VerifiedClaims;

    fn tool(existing: Vec<ReservationView>) -> GolfReservationsTool {
        let api = RecordingGolfApi::new();
        *api.existing.lock().unwrap() = existing;
        let session = CourseSession {
            api: Arc::new(api),
            claims: VerifiedClaims {
                golfer_id: "9999".into(),
                acct: "A".into(),
                email: "u@x".into(),
                exp: 0,
            },
        };
        GolfReservationsTool {
            directory: Arc::new(InMemoryDirectory::new().with("Birdsfoot", session)),
        }
    }

    fn call() -> ToolCall {
        ToolCall {
            id: "c-1".into(),
            name: "golf_get_reservations".into(),
            args: json!({ "course_name": "Birdsfoot" }),
        }
    }

    #[tokio::test]
    async fn empty_list_is_friendly() {
        let out = tool(vec![]).execute(&call()).await;
        assert!(!out.is_error);
        assert!(out.content.contains("No upcoming reservations"));
    }

    #[tokio::test]
    async fn reservations_render_one_per_line() {
        let out = tool(vec![ReservationView {
            reservation_id: "rsv-42".into(),
            course_name: "Birdsfoot".into(),
            start_time: "Fri Jun 12 9:00 AM".into(),
            num_players: 2,
        }])
        .execute(&call())
        .await;
        assert!(out.content.contains("rsv-42"));
        assert!(out.content.contains("2 players"));
    }
}
