// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};

/// Context gathered before the loop starts so the model can decide in its
/// first turn instead of spending rounds on discovery calls.
#[derive(Debug, Clone, Default)]
pub struct PrefetchedContext {
    /// Rendered list of the user's existing reservations, if available.
    pub reservations: Option<String>,
    /// Rendered forecast for the default course, if available.
    pub weather: Option<String>,
}

/// Build the system message.
///
/// Inserted exactly once per conversation — callers gate on "is the first
/// message already a system message" and never re-prepend.
pub fn system_prompt(now: DateTime<Utc>, context: &PrefetchedContext) -> String {
    let mut sections = vec![format!(
        "You are a golf assistant that manages tee-time reservations.\n\
         Current date: {}.",
        now.format("%a %b %-d %Y")
    )];

    if let Some(reservations) = &context.reservations {
        sections.push(format!("Existing reservations:\n{reservations}"));
    }
    if let Some(weather) = &context.weather {
        sections.push(format!("Weather forecast:\n{weather}"));
    }

    sections.push(
        "Rules:\n\
         - When the user asks to book, book without asking for confirmation.\n\
         - Skip booking if the forecast looks bad for golf (rain, storms, severe \
           weather) and tell the user why.\n\
         - After booking or when you have a final answer, send a push \
           notification summarizing the outcome.\n\
         - Use golf_search_tee_times before booking unless the user gives a \
           tee sheet id directly."
            .to_string(),
    );

    sections.join("\n\n")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
