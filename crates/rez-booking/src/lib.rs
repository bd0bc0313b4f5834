// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The three-phase booking protocol: lock → price → reserve.
//!
//! Identity is non-negotiable here: every request body carries `email`,
//! `golfer_id`, and `acct` taken from verified JWT claims and nowhere else.
//! The phase functions only accept a [`rez_web::VerifiedClaims`], so an
//! unverified identity cannot even be expressed.

mod api;
mod machine;
mod slots;

pub use api::{
    BookingLine, CourseEndpoints, FinalizeSaleModel, GolfApi, HttpGolfApi, LockRequest,
    LockResponse, PriceRequest, PriceResponse, RecordingGolfApi, ReservationView, ReserveRequest,
    ReserveResponse, SearchRequest,
};
pub use machine::{BookingConfirmation, BookingError, BookingMachine, LOCK_TTL};
pub use slots::{filter_window, pick_auto_book, TeeTimeSlot, TieBreak};
