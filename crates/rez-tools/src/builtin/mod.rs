// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The production tool set and the seams it runs against.
//!
//! Tools never hold raw URLs or credentials.  Golf tools resolve a course
//! through [`CourseDirectory`], which hands back an API client *and* the
//! verified claims — a course session cannot exist without a verified JWT.

mod golf_book;
mod golf_reservations;
mod golf_search;
mod push;
mod weather;

pub use golf_book::GolfBookTool;
pub use golf_reservations::GolfReservationsTool;
pub use golf_search::GolfSearchTool;
pub use push::{Notifier, Priority, RecordingNotifier, SendPushNotificationTool};
pub use weather::{GetWeatherTool, HttpWeatherSource, WeatherSource};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use rez_booking::GolfApi;
use rez_web::{VerifiedClaims, WebError};

/// A per-course API handle plus the identity it was verified for.
#[derive(Clone)]
pub struct CourseSession {
    pub api: Arc<dyn GolfApi>,
    pub claims: VerifiedClaims,
}

impl std::fmt::Debug for CourseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourseSession")
            .field("claims", &self.claims)
            .finish()
    }
}

/// Resolves a course name to a live, authenticated session.
///
/// The production implementation acquires the OAuth token for the course,
/// verifies it against the issuer JWKS, and wraps the guarded executor;
/// any failure there surfaces here, before a single booking phase runs.
#[async_trait]
pub trait CourseDirectory: Send + Sync {
    async fn session(&self, course_name: &str) -> Result<CourseSession, WebError>;
}

/// Fixed directory for tests.
#[derive(Default)]
pub struct InMemoryDirectory {
    sessions: HashMap<String, CourseSession>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, course_name: impl Into<String>, session: CourseSession) -> Self {
        self.sessions.insert(course_name.into().to_lowercase(), session);
        self
    }
}

#[async_trait]
impl CourseDirectory for InMemoryDirectory {
    async fn session(&self, course_name: &str) -> Result<CourseSession, WebError> {
        self.sessions
            .get(&course_name.to_lowercase())
            .cloned()
            .ok_or_else(|| WebError::Rejected {
                status: 404,
                body: format!("unknown course {course_name:?}"),
            })
    }
}

/// Parse the booking date convention `Day Mon DD YYYY` (e.g.
/// `Fri Jun 12 2026`), falling back to ISO `YYYY-MM-DD`.
pub(crate) fn parse_booking_date(text: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(text, "%a %b %d %Y")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .map_err(|_| format!("unparseable date {text:?}, expected e.g. \"Fri Jun 12 2026\""))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_date_convention_parses() {
        let date = parse_booking_date("Fri Jun 12 2026").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 6, 12).unwrap());
    }

    #[test]
    fn iso_date_parses() {
        assert!(parse_booking_date("2026-06-12").is_ok());
    }

    #[test]
    fn nonsense_date_errors() {
        assert!(parse_booking_date("next friday").is_err());
    }

    #[tokio::test]
    async fn directory_lookup_is_case_insensitive() {
        use rez_booking::RecordingGolfApi;
        let session = CourseSession {
            api: Arc::new(RecordingGolfApi::new()),
            claims: VerifiedClaims {
                golfer_id: "1".into(),
                acct: "A".into(),
                email: "u@x".into(),
                exp: 0,
            },
        };
        let dir = InMemoryDirectory::new().with("Birdsfoot", session);
        assert!(dir.session("BIRDSFOOT").await.is_ok());
        assert!(dir.session("Lenape").await.is_err());
    }
}
