// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The golf backend surface: search, reservations, and the three booking
//! phases.  [`HttpGolfApi`] speaks to a real course through the guarded
//! executor; [`RecordingGolfApi`] is the scripted double the machine and
//! tool tests run against.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Mutex;

use rez_store::ResultStore;
use rez_web::{WebActionExecutor, WebError, WebRequest};

use crate::slots::TeeTimeSlot;

// ─── Requests and responses ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub course_name: String,
    pub date: NaiveDate,
    pub num_players: u8,
}

/// An existing reservation as the remote reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationView {
    pub reservation_id: String,
    pub course_name: String,
    pub start_time: String,
    pub num_players: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LockRequest {
    pub tee_sheet_ids: Vec<i64>,
    pub email: String,
    pub golfer_id: String,
    /// Client-generated correlation id (timestamp-based).
    pub session_id: String,
    pub num_players: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockResponse {
    /// The remote's session handle; all later phases reference it.
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingLine {
    pub tee_sheet_id: i64,
    pub holes: u8,
    pub golfer_id: String,
    pub acct: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRequest {
    pub session_id: String,
    pub booking_list: Vec<BookingLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceResponse {
    pub transaction_id: String,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalizeSaleModel {
    pub acct: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReserveRequest {
    pub session_id: String,
    pub transaction_id: String,
    pub finalize_sale_model: FinalizeSaleModel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReserveResponse {
    /// Zero on success; any other value is a remote-side refusal.
    #[serde(default)]
    pub result_code: i32,
    pub confirmation_key: Option<String>,
    pub reservation_id: Option<String>,
}

// ─── The API trait ───────────────────────────────────────────────────────────

#[async_trait]
pub trait GolfApi: Send + Sync {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<TeeTimeSlot>, WebError>;
    async fn reservations(&self, course_name: &str) -> Result<Vec<ReservationView>, WebError>;
    async fn lock(&self, req: &LockRequest) -> Result<LockResponse, WebError>;
    async fn price(&self, req: &PriceRequest) -> Result<PriceResponse, WebError>;
    async fn reserve(&self, req: &ReserveRequest) -> Result<ReserveResponse, WebError>;
}

// ─── HTTP implementation ─────────────────────────────────────────────────────

/// Endpoint set for one course, resolved from the course catalog.
#[derive(Debug, Clone)]
pub struct CourseEndpoints {
    pub search_url: String,
    pub reservations_url: String,
    pub lock_url: String,
    pub price_url: String,
    pub reserve_url: String,
}

/// Real backend bound to one course and one bearer token.
pub struct HttpGolfApi<R: ResultStore> {
    executor: WebActionExecutor<R>,
    endpoints: CourseEndpoints,
    bearer: String,
}

impl<R: ResultStore> HttpGolfApi<R> {
    pub fn new(executor: WebActionExecutor<R>, endpoints: CourseEndpoints, bearer: String) -> Self {
        Self {
            executor,
            endpoints,
            bearer,
        }
    }

    async fn post_json(
        &self,
        action: &str,
        url: &str,
        body: Value,
        message_id: &str,
    ) -> Result<Value, WebError> {
        let outcome = self
            .executor
            .execute(&WebRequest {
                message_id: message_id.to_string(),
                action: action.to_string(),
                method: reqwest::Method::POST,
                url: url.to_string(),
                body: Some(body),
                bearer: Some(self.bearer.clone()),
            })
            .await?;
        serde_json::from_str(&outcome.body)
            .map_err(|e| WebError::Rejected {
                status: outcome.status,
                body: format!("undecodable response: {e}"),
            })
    }
}

#[async_trait]
impl<R: ResultStore> GolfApi for HttpGolfApi<R> {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<TeeTimeSlot>, WebError> {
        let body = json!({
            "searchDate": req.date.format("%Y-%m-%d").to_string(),
            "numberOfPlayers": req.num_players,
        });
        let value = self
            .post_json("search_tee_times", &self.endpoints.search_url, body, "search")
            .await?;
        serde_json::from_value(value["teeTimes"].clone()).map_err(|e| WebError::Rejected {
            status: 200,
            body: format!("undecodable tee times: {e}"),
        })
    }

    async fn reservations(&self, _course_name: &str) -> Result<Vec<ReservationView>, WebError> {
        let value = self
            .post_json(
                "get_reservations",
                &self.endpoints.reservations_url,
                json!({}),
                "reservations",
            )
            .await?;
        serde_json::from_value(value["reservations"].clone()).map_err(|e| WebError::Rejected {
            status: 200,
            body: format!("undecodable reservations: {e}"),
        })
    }

    async fn lock(&self, req: &LockRequest) -> Result<LockResponse, WebError> {
        let value = self
            .post_json(
                "lock_tee_times",
                &self.endpoints.lock_url,
                serde_json::to_value(req).expect("serializable"),
                &req.session_id,
            )
            .await?;
        serde_json::from_value(value).map_err(|e| WebError::Rejected {
            status: 200,
            body: format!("undecodable lock response: {e}"),
        })
    }

    async fn price(&self, req: &PriceRequest) -> Result<PriceResponse, WebError> {
        let value = self
            .post_json(
                "price_tee_times",
                &self.endpoints.price_url,
                serde_json::to_value(req).expect("serializable"),
                &req.session_id,
            )
            .await?;
        serde_json::from_value(value).map_err(|e| WebError::Rejected {
            status: 200,
            body: format!("undecodable price response: {e}"),
        })
    }

    async fn reserve(&self, req: &ReserveRequest) -> Result<ReserveResponse, WebError> {
        let value = self
            .post_json(
                "reserve_tee_times",
                &self.endpoints.reserve_url,
                serde_json::to_value(req).expect("serializable"),
                &req.session_id,
            )
            .await?;
        serde_json::from_value(value).map_err(|e| WebError::Rejected {
            status: 200,
            body: format!("undecodable reserve response: {e}"),
        })
    }
}

#[async_trait]
impl<T: GolfApi + ?Sized> GolfApi for std::sync::Arc<T> {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<TeeTimeSlot>, WebError> {
        (**self).search(req).await
    }
    async fn reservations(&self, course_name: &str) -> Result<Vec<ReservationView>, WebError> {
        (**self).reservations(course_name).await
    }
    async fn lock(&self, req: &LockRequest) -> Result<LockResponse, WebError> {
        (**self).lock(req).await
    }
    async fn price(&self, req: &PriceRequest) -> Result<PriceResponse, WebError> {
        (**self).price(req).await
    }
    async fn reserve(&self, req: &ReserveRequest) -> Result<ReserveResponse, WebError> {
        (**self).reserve(req).await
    }
}

// ─── Scripted double ─────────────────────────────────────────────────────────

/// Records every request and plays back configured responses.  The claims
/// provenance tests read the recorded requests to prove what was sent.
#[derive(Default)]
pub struct RecordingGolfApi {
    pub slots: Mutex<Vec<TeeTimeSlot>>,
    pub existing: Mutex<Vec<ReservationView>>,
    pub lock_requests: Mutex<Vec<LockRequest>>,
    pub price_requests: Mutex<Vec<PriceRequest>>,
    pub reserve_requests: Mutex<Vec<ReserveRequest>>,
    /// When set, lock fails with this error message (slot taken).
    pub fail_lock: Mutex<Option<String>>,
    /// When set, price fails.
    pub fail_price: Mutex<Option<String>>,
    /// When set, reserve answers with this non-zero result code.
    pub reserve_result_code: Mutex<i32>,
}

impl RecordingGolfApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slots(self, slots: Vec<TeeTimeSlot>) -> Self {
        *self.slots.lock().unwrap() = slots;
        self
    }
}

#[async_trait]
impl GolfApi for RecordingGolfApi {
    async fn search(&self, _req: &SearchRequest) -> Result<Vec<TeeTimeSlot>, WebError> {
        Ok(self.slots.lock().unwrap().clone())
    }

    async fn reservations(&self, _course_name: &str) -> Result<Vec<ReservationView>, WebError> {
        Ok(self.existing.lock().unwrap().clone())
    }

    async fn lock(&self, req: &LockRequest) -> Result<LockResponse, WebError> {
        self.lock_requests.lock().unwrap().push(req.clone());
        if let Some(message) = self.fail_lock.lock().unwrap().clone() {
            return Err(WebError::Rejected { status: 409, body: message });
        }
        Ok(LockResponse { session_id: "srv-session-1".into() })
    }

    async fn price(&self, req: &PriceRequest) -> Result<PriceResponse, WebError> {
        self.price_requests.lock().unwrap().push(req.clone());
        if let Some(message) = self.fail_price.lock().unwrap().clone() {
            return Err(WebError::Rejected { status: 422, body: message });
        }
        Ok(PriceResponse {
            transaction_id: "txn-1".into(),
            total: "108.00".parse().unwrap(),
        })
    }

    async fn reserve(&self, req: &ReserveRequest) -> Result<ReserveResponse, WebError> {
        self.reserve_requests.lock().unwrap().push(req.clone());
        let code = *self.reserve_result_code.lock().unwrap();
        if code != 0 {
            return Ok(ReserveResponse {
                result_code: code,
                confirmation_key: None,
                reservation_id: None,
            });
        }
        Ok(ReserveResponse {
            result_code: 0,
            confirmation_key: Some("CONF-789".into()),
            reservation_id: Some("rsv-42".into()),
        })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
