// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};
use tracing::info;

use rez_booking::{
    filter_window, pick_auto_book, BookingError, BookingMachine, SearchRequest, TeeTimeSlot,
    TieBreak,
};
use rez_store::BookingSessionStore;

use crate::builtin::{parse_booking_date, CourseDirectory};
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Search tee times, optionally auto-booking the earliest eligible slot.
///
/// On a booking failure during auto-book the failure is returned as-is —
/// never retried against a different slot, so two concurrent runs cannot
/// leapfrog each other into double bookings.
pub struct GolfSearchTool {
    pub directory: Arc<dyn CourseDirectory>,
    pub bookings: Arc<dyn BookingSessionStore>,
    pub tie_break: TieBreak,
}

#[async_trait]
impl Tool for GolfSearchTool {
    fn name(&self) -> &str {
        "golf_search_tee_times"
    }

    fn description(&self) -> &str {
        "Search available tee times at a course on a given date. \
         Optionally restrict to a time window, and with auto_book=true the \
         earliest slot with enough open spots is booked immediately."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "course_name": {
                    "type": "string",
                    "description": "Configured course name, e.g. \"Birdsfoot\""
                },
                "date": {
                    "type": "string",
                    "format": "date",
                    "description": "Date in the form \"Day Mon DD YYYY\", e.g. \"Fri Jun 12 2026\""
                },
                "num_players": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 4
                },
                "start_time": {
                    "type": "string",
                    "description": "Earliest acceptable tee time, 24h \"HH:MM\" (inclusive)"
                },
                "end_time": {
                    "type": "string",
                    "description": "Latest acceptable tee time, 24h \"HH:MM\" (exclusive)"
                },
                "auto_book": {
                    "type": "boolean",
                    "description": "Book the earliest eligible slot immediately"
                }
            },
            "required": ["course_name", "date", "num_players"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let course_name = call.args["course_name"].as_str().unwrap_or_default();
        let num_players = call.args["num_players"].as_u64().unwrap_or(1) as u8;

        let date = match parse_booking_date(call.args["date"].as_str().unwrap_or_default()) {
            Ok(date) => date,
            Err(message) => return ToolOutput::err(&call.id, message),
        };
        let window = match parse_time_window(&call.args, date) {
            Ok(window) => window,
            Err(message) => return ToolOutput::err(&call.id, message),
        };

        let session = match self.directory.session(course_name).await {
            Ok(session) => session,
            Err(e) => return ToolOutput::err(&call.id, format!("course unavailable: {e}")),
        };

        let slots = match session
            .api
            .search(&SearchRequest {
                course_name: course_name.to_string(),
                date,
                num_players,
            })
            .await
        {
            Ok(slots) => slots,
            Err(e) => return ToolOutput::err(&call.id, format!("search failed: {e}")),
        };

        let eligible = filter_window(&slots, window.0, window.1);
        if eligible.is_empty() {
            // Not an error: an empty sheet is a normal answer.
            return ToolOutput::ok(
                &call.id,
                format!("No tee times available at {course_name} on {date} in the requested window."),
            );
        }

        if call.args["auto_book"].as_bool().unwrap_or(false) {
            return self
                .auto_book(call, course_name, &eligible, num_players, session)
                .await;
        }

        ToolOutput::ok(&call.id, render_slots(course_name, &eligible))
    }
}

impl GolfSearchTool {
    async fn auto_book(
        &self,
        call: &ToolCall,
        course_name: &str,
        eligible: &[TeeTimeSlot],
        num_players: u8,
        session: crate::builtin::CourseSession,
    ) -> ToolOutput {
        let Some(slot) = pick_auto_book(eligible, num_players, self.tie_break) else {
            return ToolOutput::ok(
                &call.id,
                format!(
                    "Tee times exist at {course_name}, but none has {num_players} open spots."
                ),
            );
        };

        info!(
            tee_sheet_id = slot.tee_sheet_id,
            golfer_id = %session.claims.golfer_id,
            "auto-booking earliest eligible slot"
        );
        let machine = BookingMachine::new(session.api.clone(), self.bookings.clone());
        match machine
            .book(&session.claims, slot.tee_sheet_id, num_players, slot.holes)
            .await
        {
            Ok(confirmation) => ToolOutput::ok(
                &call.id,
                format!(
                    "Booked {} at {} for {} players. Confirmation: {}",
                    slot.start_time.format("%-I:%M %p"),
                    course_name,
                    num_players,
                    confirmation.confirmation_key
                ),
            ),
            // One shot only: a failed auto-book is reported, never moved to
            // another slot.
            Err(BookingError::SlotTaken(message)) => ToolOutput::err(
                &call.id,
                format!("The {} slot was taken before booking completed: {message}",
                    slot.start_time.format("%-I:%M %p")),
            ),
            Err(other) => ToolOutput::err(&call.id, format!("booking failed: {other}")),
        }
    }
}

fn parse_time_window(
    args: &Value,
    date: NaiveDate,
) -> Result<(Option<chrono::NaiveDateTime>, Option<chrono::NaiveDateTime>), String> {
    let parse = |key: &str| -> Result<Option<chrono::NaiveDateTime>, String> {
        match args[key].as_str() {
            None => Ok(None),
            Some(text) => NaiveTime::parse_from_str(text, "%H:%M")
                .map(|t| Some(date.and_time(t)))
                .map_err(|_| format!("unparseable {key} {text:?}, expected 24h HH:MM")),
        }
    };
    Ok((parse("start_time")?, parse("end_time")?))
}

fn render_slots(course_name: &str, slots: &[TeeTimeSlot]) -> String {
    let mut lines = vec![format!("Available tee times at {course_name}:")];
    for slot in slots {
        lines.push(format!(
            "- {} | {} holes | ${} | {} spots open (id {})",
            slot.start_time.format("%-I:%M %p"),
            slot.holes,
            slot.price,
            slot.num_available,
            slot.tee_sheet_id,
        ));
    }
    lines.join("\n")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
