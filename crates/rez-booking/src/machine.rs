// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use rez_store::{BookingPhase, BookingSessionRecord, BookingSessionStore, StoreError};
use rez_web::{VerifiedClaims, WebError};

use crate::api::{
    BookingLine, FinalizeSaleModel, GolfApi, LockRequest, PriceRequest, ReserveRequest,
};

/// Remote locks expire after five minutes; the local record mirrors that.
pub const LOCK_TTL: Duration = Duration::from_secs(5 * 60);

/// Outcome of a completed booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingConfirmation {
    pub confirmation_key: String,
    pub reservation_id: String,
    pub tee_sheet_id: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// Lock refused: the slot is gone or the request was invalid.  Terminal,
    /// no compensation required.
    #[error("tee time unavailable: {0}")]
    SlotTaken(String),
    /// Pricing refused.  The remote lock is left to self-expire.
    #[error("pricing failed: {0}")]
    PriceFailed(String),
    /// Reservation refused after pricing.
    #[error("reservation failed: {0}")]
    ReserveFailed(String),
    #[error(transparent)]
    Web(#[from] WebError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Drives lock → price → reserve against one course, persisting every phase
/// transition.
///
/// Identity flows only from the [`VerifiedClaims`] argument.  There is no
/// way to hand this machine an email or golfer id from request parameters.
pub struct BookingMachine<A: GolfApi, S: BookingSessionStore> {
    api: A,
    store: S,
}

impl<A: GolfApi, S: BookingSessionStore> BookingMachine<A, S> {
    pub fn new(api: A, store: S) -> Self {
        Self { api, store }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Book `tee_sheet_id` for `num_players` on behalf of the verified
    /// golfer.  Strictly sequential; a failure in any phase stops the run.
    pub async fn book(
        &self,
        claims: &VerifiedClaims,
        tee_sheet_id: i64,
        num_players: u8,
        holes: u8,
    ) -> Result<BookingConfirmation, BookingError> {
        // ── Phase 1: lock ────────────────────────────────────────────────────
        let client_session = format!("{}", Utc::now().timestamp_millis());
        let lock = LockRequest {
            tee_sheet_ids: vec![tee_sheet_id],
            email: claims.email.clone(),
            golfer_id: claims.golfer_id.clone(),
            session_id: client_session,
            num_players,
        };
        let locked = match self.api.lock(&lock).await {
            Ok(response) => response,
            Err(WebError::Rejected { body, .. }) => {
                // Concurrent run won the slot, or the id was stale.  Nothing
                // to compensate: no lock exists.
                return Err(BookingError::SlotTaken(body));
            }
            Err(other) => return Err(other.into()),
        };
        let session_id = locked.session_id;
        info!(golfer_id = %claims.golfer_id, tee_sheet_id, %session_id, "tee time locked");

        let mut record = BookingSessionRecord {
            session_id: session_id.clone(),
            tee_sheet_id,
            transaction_id: None,
            golfer_id: claims.golfer_id.clone(),
            acct: claims.acct.clone(),
            email: claims.email.clone(),
            phase: BookingPhase::Locked,
            expires_at: Utc::now() + LOCK_TTL,
        };
        self.store.put(&record).await?;

        // ── Phase 2: price ───────────────────────────────────────────────────
        let price = PriceRequest {
            session_id: session_id.clone(),
            booking_list: vec![BookingLine {
                tee_sheet_id,
                holes,
                golfer_id: claims.golfer_id.clone(),
                acct: claims.acct.clone(),
            }],
        };
        let priced = match self.api.price(&price).await {
            Ok(response) => response,
            Err(err) => {
                // The lock self-expires server-side; the record keeps its
                // TTL and will read as released once it lapses.
                warn!(%session_id, error = %err, "pricing failed, leaving lock to expire");
                return Err(BookingError::PriceFailed(err.to_string()));
            }
        };
        info!(%session_id, transaction_id = %priced.transaction_id, "tee time priced");

        record.transaction_id = Some(priced.transaction_id.clone());
        record.phase = BookingPhase::Priced;
        self.store.put(&record).await?;

        // ── Phase 3: reserve ─────────────────────────────────────────────────
        let reserve = ReserveRequest {
            session_id: session_id.clone(),
            transaction_id: priced.transaction_id.clone(),
            finalize_sale_model: FinalizeSaleModel {
                acct: claims.acct.clone(),
                email: claims.email.clone(),
            },
        };
        let reserved = match self.api.reserve(&reserve).await {
            Ok(response) if response.result_code == 0 => response,
            Ok(response) => {
                record.phase = BookingPhase::Failed;
                self.store.put(&record).await?;
                return Err(BookingError::ReserveFailed(format!(
                    "remote result code {}",
                    response.result_code
                )));
            }
            Err(err) => {
                record.phase = BookingPhase::Failed;
                self.store.put(&record).await?;
                return Err(BookingError::ReserveFailed(err.to_string()));
            }
        };

        let confirmation = BookingConfirmation {
            confirmation_key: reserved
                .confirmation_key
                .unwrap_or_else(|| "UNKNOWN".into()),
            reservation_id: reserved.reservation_id.unwrap_or_else(|| "UNKNOWN".into()),
            tee_sheet_id,
        };
        record.phase = BookingPhase::Reserved;
        self.store.put(&record).await?;
        info!(
            %session_id,
            reservation_id = %confirmation.reservation_id,
            tee_sheet_id,
            "tee time reserved"
        );
        Ok(confirmation)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
