// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Partial-batch consumption.
//!
//! The broker delivers up to [`MAX_BATCH_SIZE`] records per invocation.
//! Records are processed sequentially (batch parallelism is the platform's
//! job, via concurrent invocations) and each failure is reported
//! individually so the broker redelivers only the failed items.  A record
//! delivered [`MAX_RECEIVE_COUNT`] times without success is moved to the
//! class DLQ by the broker — the consumer never sees it again.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::message::Message;

/// Broker batch ceiling.
pub const MAX_BATCH_SIZE: usize = 10;

/// Deliveries before the broker gives up and DLQs a record.
pub const MAX_RECEIVE_COUNT: u32 = 3;

/// One delivery from the queue: the serialized envelope plus broker
/// bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRecord {
    /// Broker delivery id, unique per delivery (NOT per message).
    pub delivery_id: String,
    /// Serialized [`Message`] envelope.
    pub body: String,
    /// How many times the broker has delivered this record, 1-based.
    pub receive_count: u32,
}

/// Outcome of one batch: the delivery ids the broker should redeliver.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub failed_delivery_ids: Vec<String>,
}

impl BatchResult {
    pub fn all_succeeded(&self) -> bool {
        self.failed_delivery_ids.is_empty()
    }
}

/// Process one delivered batch with `handler`, reporting per-record failures.
///
/// A record whose body does not deserialize into an envelope counts as
/// failed — redelivery will fail again and the broker's receive-count policy
/// walks it into the DLQ, which is exactly where a poisoned body belongs.
pub async fn consume_batch<H, Fut>(records: Vec<QueueRecord>, mut handler: H) -> BatchResult
where
    H: FnMut(Message) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut result = BatchResult::default();

    for record in records {
        let message: Message = match serde_json::from_str(&record.body) {
            Ok(m) => m,
            Err(e) => {
                error!(
                    delivery_id = %record.delivery_id,
                    receive_count = record.receive_count,
                    error = %e,
                    "undecodable record"
                );
                result.failed_delivery_ids.push(record.delivery_id);
                continue;
            }
        };

        let message_id = message.id.clone();
        match handler(message).await {
            Ok(()) => {
                info!(%message_id, delivery_id = %record.delivery_id, "record processed");
            }
            Err(e) => {
                error!(
                    %message_id,
                    delivery_id = %record.delivery_id,
                    receive_count = record.receive_count,
                    error = %e,
                    "record failed"
                );
                result.failed_delivery_ids.push(record.delivery_id);
            }
        }
    }

    result
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessagePayload, MessageType, Producer};
    use rez_config::Stage;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn record(n: u32) -> QueueRecord {
        let m = Message::new(
            Producer::User,
            Stage::Dev,
            MessageType::Notify,
            MessagePayload::Json(json!({ "n": n })),
        );
        QueueRecord {
            delivery_id: format!("d-{n}"),
            body: serde_json::to_string(&m).unwrap(),
            receive_count: 1,
        }
    }

    #[tokio::test]
    async fn all_successes_report_empty_failure_list() {
        let records = vec![record(1), record(2), record(3)];
        let result = consume_batch(records, |_m| async { Ok(()) }).await;
        assert!(result.all_succeeded());
    }

    #[tokio::test]
    async fn only_failed_records_are_reported() {
        let records = vec![record(1), record(2), record(3)];
        let result = consume_batch(records, |m| async move {
            let n = match &m.payload {
                MessagePayload::Json(v) => v["n"].as_u64().unwrap(),
                _ => unreachable!(),
            };
            if n == 2 {
                anyhow::bail!("handler rejected record 2");
            }
            Ok(())
        })
        .await;
        assert_eq!(result.failed_delivery_ids, vec!["d-2"]);
    }

    #[tokio::test]
    async fn undecodable_body_is_reported_failed() {
        let records = vec![
            record(1),
            QueueRecord {
                delivery_id: "d-bad".into(),
                body: "not json".into(),
                receive_count: 2,
            },
        ];
        let calls = AtomicU32::new(0);
        let result = consume_batch(records, |_m| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;
        assert_eq!(result.failed_delivery_ids, vec!["d-bad"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "handler never saw the bad record");
    }

    #[tokio::test]
    async fn records_are_processed_in_delivery_order() {
        let records = vec![record(1), record(2), record(3)];
        let seen = std::sync::Mutex::new(Vec::new());
        consume_batch(records, |m| {
            let n = match &m.payload {
                MessagePayload::Json(v) => v["n"].as_u64().unwrap(),
                _ => unreachable!(),
            };
            seen.lock().unwrap().push(n);
            async { Ok(()) }
        })
        .await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn empty_batch_is_a_noop() {
        let result = consume_batch(vec![], |_m| async { Ok(()) }).await;
        assert!(result.all_succeeded());
    }
}
