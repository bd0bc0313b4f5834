// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The daily cost limiter.
//!
//! One record per stage, keyed deterministically, holding today's running
//! total in fixed-point dollars.  The record is contended across concurrent
//! invocations, so updates go through a compare-and-swap on `last_updated`
//! with a small retry budget; when the budget runs out the update is dropped
//! and logged — cost tracking degrades, it never blocks a request that is
//! already in flight.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::warn;

use rez_config::Stage;

/// Store-level failures shared by every store trait in this crate.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Conditional write lost the race.  Retried by the caller.
    #[error("conditional write conflict")]
    Conflict,
    #[error("store failure: {0}")]
    Other(String),
}

/// Dollars per 1 000 input tokens.
const INPUT_RATE_PER_1K: Decimal = Decimal::from_parts(3, 0, 0, false, 3); // 0.003
/// Dollars per 1 000 output tokens.
const OUTPUT_RATE_PER_1K: Decimal = Decimal::from_parts(15, 0, 0, false, 3); // 0.015

/// CAS retry budget for the contended cost record.
const CAS_ATTEMPTS: u32 = 3;

/// One day's spend for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub date: NaiveDate,
    pub total_cost: Decimal,
    pub request_count: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub last_updated: DateTime<Utc>,
}

impl CostRecord {
    pub fn zero(date: NaiveDate) -> Self {
        Self {
            date,
            total_cost: Decimal::ZERO,
            request_count: 0,
            input_tokens: 0,
            output_tokens: 0,
            last_updated: Utc::now(),
        }
    }
}

/// Deterministic record key: one per (stage).  The date lives inside the
/// record; a date mismatch on read or write is the daily reset.
pub fn cost_record_key(stage: Stage) -> String {
    format!("COST#{stage}")
}

/// Persistence for the cost record, with a conditional write.
#[async_trait]
pub trait CostStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CostRecord>, StoreError>;

    /// Write `record` only if the stored `last_updated` equals `expected`
    /// (`None` = only if absent).  Otherwise fail with [`StoreError::Conflict`].
    async fn put_conditional(
        &self,
        key: &str,
        record: &CostRecord,
        expected: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct InMemoryCostStore {
    records: Mutex<HashMap<String, CostRecord>>,
}

impl InMemoryCostStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CostStore for InMemoryCostStore {
    async fn get(&self, key: &str) -> Result<Option<CostRecord>, StoreError> {
        Ok(self.records.lock().unwrap().get(key).cloned())
    }

    async fn put_conditional(
        &self,
        key: &str,
        record: &CostRecord,
        expected: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        let current = records.get(key).map(|r| r.last_updated);
        if current != expected {
            return Err(StoreError::Conflict);
        }
        records.insert(key.to_string(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl<T: CostStore + ?Sized> CostStore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<CostRecord>, StoreError> {
        (**self).get(key).await
    }
    async fn put_conditional(
        &self,
        key: &str,
        record: &CostRecord,
        expected: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        (**self).put_conditional(key, record, expected).await
    }
}

// ─── Budget decisions ────────────────────────────────────────────────────────

/// Outcome of a budget check.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetDecision {
    pub allowed: bool,
    pub current_cost: Decimal,
    pub remaining_budget: Decimal,
}

/// Seconds from `now` until the next UTC midnight — the budget reset point,
/// surfaced upstream as `Retry-After`.
pub fn seconds_until_utc_midnight(now: DateTime<Utc>) -> u64 {
    let tomorrow = (now.date_naive() + chrono::Duration::days(1))
        .and_hms_opt(0, 0, 0)
        .expect("midnight exists")
        .and_utc();
    (tomorrow - now).num_seconds().max(0) as u64
}

/// The limiter itself: wraps a [`CostStore`] with the cap policy.
pub struct CostLimiter<S: CostStore> {
    store: S,
    stage: Stage,
    daily_cap: Decimal,
}

impl<S: CostStore> CostLimiter<S> {
    pub fn new(store: S, stage: Stage, daily_cap: Decimal) -> Self {
        Self { store, stage, daily_cap }
    }

    /// Conservative dollar estimate for a request before it is made.
    pub fn estimate(input_tokens: u64, output_tokens: u64) -> Decimal {
        cost_of(input_tokens, output_tokens)
    }

    /// Whether a request estimated at `estimated_cost` may proceed today.
    /// The check reads the current record; it does not reserve anything.
    pub async fn check_budget(&self, estimated_cost: Decimal) -> Result<BudgetDecision, StoreError> {
        let current = self.today().await?;
        let projected = current.total_cost + estimated_cost;
        Ok(BudgetDecision {
            allowed: projected <= self.daily_cap,
            remaining_budget: (self.daily_cap - current.total_cost).max(Decimal::ZERO),
            current_cost: current.total_cost,
        })
    }

    /// Fold one completed request's actual usage into today's record.
    ///
    /// Optimistic concurrency: re-read and retry on conflict, up to
    /// [`CAS_ATTEMPTS`] times, then drop the update with a warning.
    pub async fn record_actual(&self, input_tokens: u64, output_tokens: u64) -> Result<(), StoreError> {
        let cost = cost_of(input_tokens, output_tokens);
        let key = cost_record_key(self.stage);

        for _ in 0..CAS_ATTEMPTS {
            let today = Utc::now().date_naive();
            let existing = self.store.get(&key).await?;
            // A record from a previous day is replaced outright: that IS the
            // daily reset.
            let (mut record, expected) = match existing {
                Some(r) if r.date == today => {
                    let expected = r.last_updated;
                    (r, Some(expected))
                }
                Some(stale) => (CostRecord::zero(today), Some(stale.last_updated)),
                None => (CostRecord::zero(today), None),
            };

            record.total_cost = round_money(record.total_cost + cost);
            record.request_count += 1;
            record.input_tokens += input_tokens;
            record.output_tokens += output_tokens;
            record.last_updated = Utc::now();

            match self.store.put_conditional(&key, &record, expected).await {
                Ok(()) => return Ok(()),
                Err(StoreError::Conflict) => continue,
                Err(other) => return Err(other),
            }
        }

        warn!(stage = %self.stage, "cost update dropped after CAS retries");
        Ok(())
    }

    /// Today's record, or a zero record if none exists yet.
    pub async fn get_usage(&self) -> Result<CostRecord, StoreError> {
        self.today().await
    }

    pub fn daily_cap(&self) -> Decimal {
        self.daily_cap
    }

    async fn today(&self) -> Result<CostRecord, StoreError> {
        let today = Utc::now().date_naive();
        let record = self.store.get(&cost_record_key(self.stage)).await?;
        Ok(match record {
            Some(r) if r.date == today => r,
            _ => CostRecord::zero(today),
        })
    }
}

/// Dollar cost of a request at the configured token rates.
fn cost_of(input_tokens: u64, output_tokens: u64) -> Decimal {
    let input = Decimal::from(input_tokens) * INPUT_RATE_PER_1K / Decimal::from(1000);
    let output = Decimal::from(output_tokens) * OUTPUT_RATE_PER_1K / Decimal::from(1000);
    round_money(input + output)
}

/// Six decimal places, half-up.
fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(6, RoundingStrategy::MidpointAwayFromZero)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn limiter() -> CostLimiter<InMemoryCostStore> {
        CostLimiter::new(InMemoryCostStore::new(), Stage::Dev, dec("5.00"))
    }

    // ── Cost math ─────────────────────────────────────────────────────────────

    #[test]
    fn cost_of_known_rates() {
        // 1000 in + 1000 out = 0.003 + 0.015 = 0.018
        assert_eq!(cost_of(1000, 1000), dec("0.018"));
    }

    #[test]
    fn cost_rounds_half_up_at_six_decimals() {
        // 0.5 input tokens cannot happen, but sub-microdollar sums can:
        // 1 input token = 0.000003 exactly; 167 output = 0.002505.
        assert_eq!(cost_of(1, 0), dec("0.000003"));
        assert_eq!(cost_of(0, 167), dec("0.002505"));
        // Half-up: 0.0000015 → 0.000002
        assert_eq!(round_money(dec("0.0000015")), dec("0.000002"));
    }

    #[test]
    fn estimate_matches_cost_of() {
        assert_eq!(
            CostLimiter::<InMemoryCostStore>::estimate(2000, 500),
            cost_of(2000, 500)
        );
    }

    // ── Budget checks ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn empty_day_allows_request() {
        let l = limiter();
        let d = l.check_budget(dec("0.08")).await.unwrap();
        assert!(d.allowed);
        assert_eq!(d.current_cost, Decimal::ZERO);
        assert_eq!(d.remaining_budget, dec("5.00"));
    }

    #[tokio::test]
    async fn near_cap_denies_overage() {
        let l = limiter();
        // Spend ~$4.95: 330k output tokens = 4.95
        l.record_actual(0, 330_000).await.unwrap();
        let d = l.check_budget(dec("0.08")).await.unwrap();
        assert!(!d.allowed);
        assert_eq!(d.current_cost, dec("4.95"));
        assert_eq!(d.remaining_budget, dec("0.05"));
    }

    #[tokio::test]
    async fn exactly_at_cap_is_allowed() {
        let l = limiter();
        l.record_actual(0, 330_000).await.unwrap(); // 4.95
        let d = l.check_budget(dec("0.05")).await.unwrap();
        assert!(d.allowed, "projected == cap is within budget");
    }

    // ── Recording ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn record_actual_accumulates() {
        let l = limiter();
        l.record_actual(1000, 1000).await.unwrap();
        l.record_actual(1000, 1000).await.unwrap();
        let usage = l.get_usage().await.unwrap();
        assert_eq!(usage.total_cost, dec("0.036"));
        assert_eq!(usage.request_count, 2);
        assert_eq!(usage.input_tokens, 2000);
        assert_eq!(usage.output_tokens, 2000);
    }

    #[tokio::test]
    async fn stale_date_record_resets_on_write() {
        let store = InMemoryCostStore::new();
        let key = cost_record_key(Stage::Dev);
        let yesterday = Utc::now().date_naive() - chrono::Duration::days(1);
        let mut stale = CostRecord::zero(yesterday);
        stale.total_cost = dec("4.99");
        stale.request_count = 70;
        store.put_conditional(&key, &stale, None).await.unwrap();

        let l = CostLimiter::new(store, Stage::Dev, dec("5.00"));
        l.record_actual(1000, 0).await.unwrap();
        let usage = l.get_usage().await.unwrap();
        assert_eq!(usage.total_cost, dec("0.003"), "yesterday's spend is gone");
        assert_eq!(usage.request_count, 1);
    }

    #[tokio::test]
    async fn stale_date_record_reads_as_zero() {
        let store = InMemoryCostStore::new();
        let key = cost_record_key(Stage::Dev);
        let mut stale = CostRecord::zero(Utc::now().date_naive() - chrono::Duration::days(2));
        stale.total_cost = dec("3.00");
        store.put_conditional(&key, &stale, None).await.unwrap();

        let l = CostLimiter::new(store, Stage::Dev, dec("5.00"));
        let usage = l.get_usage().await.unwrap();
        assert_eq!(usage.total_cost, Decimal::ZERO);
    }

    #[tokio::test]
    async fn conflicting_write_is_retried() {
        // Pre-seed, then race: the first put_conditional in record_actual
        // conflicts because we mutate last_updated behind its back is hard to
        // arrange deterministically here; instead verify the CAS contract
        // directly.
        let store = InMemoryCostStore::new();
        let key = "k";
        let r1 = CostRecord::zero(Utc::now().date_naive());
        store.put_conditional(key, &r1, None).await.unwrap();
        // Wrong expectation loses:
        let err = store.put_conditional(key, &r1, None).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
        // Correct expectation wins:
        store
            .put_conditional(key, &r1, Some(r1.last_updated))
            .await
            .unwrap();
    }

    // ── Reset clock ───────────────────────────────────────────────────────────

    #[test]
    fn seconds_until_midnight_at_2330_is_thirty_minutes() {
        let now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 3, 1, 23, 30, 0).unwrap();
        assert_eq!(seconds_until_utc_midnight(now), 30 * 60);
    }

    #[test]
    fn seconds_until_midnight_at_midnight_is_full_day() {
        let now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(seconds_until_utc_midnight(now), 24 * 60 * 60);
    }

    #[test]
    fn cost_record_key_is_stage_scoped() {
        assert_ne!(cost_record_key(Stage::Dev), cost_record_key(Stage::Prod));
    }
}
