// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use rez_booking::{BookingError, BookingMachine};
use rez_store::BookingSessionStore;

use crate::builtin::CourseDirectory;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Default round length when the model does not say otherwise.
const DEFAULT_HOLES: u8 = 18;

/// Book one specific tee sheet slot.
///
/// The course is fixed at construction (the tee sheet id is only meaningful
/// within one course's sheet); identity comes from the course session's
/// verified claims.
pub struct GolfBookTool {
    pub directory: Arc<dyn CourseDirectory>,
    pub bookings: Arc<dyn BookingSessionStore>,
    pub course_name: String,
}

#[async_trait]
impl Tool for GolfBookTool {
    fn name(&self) -> &str {
        "golf_book_tee_time"
    }

    fn description(&self) -> &str {
        "Book a specific tee time by tee sheet id (from a prior search). \
         Runs the full lock, price, reserve sequence and returns the \
         confirmation key."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "tee_sheet_id": {
                    "type": "integer",
                    "description": "Tee sheet id from golf_search_tee_times results"
                },
                "num_players": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 4
                }
            },
            "required": ["tee_sheet_id", "num_players"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let tee_sheet_id = call.args["tee_sheet_id"].as_i64().unwrap_or_default();
        let num_players = call.args["num_players"].as_u64().unwrap_or(1) as u8;

        let session = match self.directory.session(&self.course_name).await {
            Ok(session) => session,
            Err(e) => return ToolOutput::err(&call.id, format!("course unavailable: {e}")),
        };

        let machine = BookingMachine::new(session.api.clone(), self.bookings.clone());
        match machine
            .book(&session.claims, tee_sheet_id, num_players, DEFAULT_HOLES)
            .await
        {
            Ok(confirmation) => ToolOutput::ok(
                &call.id,
                format!(
                    "Tee time booked at {}. Confirmation: {} (reservation {})",
                    self.course_name, confirmation.confirmation_key, confirmation.reservation_id
                ),
            ),
            Err(BookingError::SlotTaken(message)) => {
                ToolOutput::err(&call.id, format!("tee time unavailable: {message}"))
            }
            Err(other) => ToolOutput::err(&call.id, format!("booking failed: {other}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{CourseSession, InMemoryDirectory};
    use rez_booking::RecordingGolfApi;
    use rez_store::InMemoryBookingStore;
    use rez_web::VerifiedClaims;

    fn tool() -> (GolfBookTool, Arc<RecordingGolfApi>) {
        let api = Arc::new(RecordingGolfApi::new());
        let session = CourseSession {
            api: api.clone(),
            claims: VerifiedClaims {
                golfer_id: "9999".into(),
                acct: "A".into(),
                email: "u@x".into(),
                exp: 0,
            },
        };
        (
            GolfBookTool {
                directory: Arc::new(InMemoryDirectory::new().with("Birdsfoot", session)),
                bookings: Arc::new(InMemoryBookingStore::new()),
                course_name: "Birdsfoot".into(),
            },
            api,
        )
    }

    fn call(args: Value) -> ToolCall {
        ToolCall {
            id: "c-1".into(),
            name: "golf_book_tee_time".into(),
            args,
        }
    }

    #[tokio::test]
    async fn books_and_surfaces_confirmation_key() {
        let (tool, api) = tool();
        let out = tool
            .execute(&call(json!({ "tee_sheet_id": 12345, "num_players": 2 })))
            .await;
        assert!(!out.is_error);
        assert!(out.content.contains("CONF-789"), "{}", out.content);

        let locks = api.lock_requests.lock().unwrap();
        assert_eq!(locks[0].tee_sheet_ids, vec![12345]);
        assert_eq!(locks[0].email, "u@x");
        assert_eq!(locks[0].golfer_id, "9999");
    }

    #[tokio::test]
    async fn taken_slot_reports_unavailable() {
        let (tool, api) = tool();
        *api.fail_lock.lock().unwrap() = Some("already taken".into());
        let out = tool
            .execute(&call(json!({ "tee_sheet_id": 12345, "num_players": 2 })))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("unavailable"));
    }

    #[tokio::test]
    async fn unknown_course_never_locks() {
        let (mut tool, api) = tool();
        tool.course_name = "Nowhere".into();
        let out = tool
            .execute(&call(json!({ "tee_sheet_id": 1, "num_players": 1 })))
            .await;
        assert!(out.is_error);
        assert!(api.lock_requests.lock().unwrap().is_empty());
    }
}
