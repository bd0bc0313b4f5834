// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Keyed document stores.
//!
//! Every store is a trait with an in-memory implementation; real
//! deployments bind the traits to the platform's document database.  TTLs
//! are enforced on the read path — an expired record is a miss — which
//! matches how the store's TTL facility behaves (lazily, eventually).

mod booking;
mod cost;
mod messages;
mod results;
mod session;

pub use booking::{BookingPhase, BookingSessionRecord, BookingSessionStore, InMemoryBookingStore};
pub use cost::{
    seconds_until_utc_midnight, BudgetDecision, CostLimiter, CostRecord, CostStore, InMemoryCostStore,
    StoreError,
};
pub use messages::{InMemoryMessageStore, MessageStore};
pub use results::{InMemoryResultStore, ResultStore, WebActionResult, RESULT_BODY_CAP};
pub use session::{InMemorySessionStore, SessionRecord, SessionStore, SESSION_TTL};
