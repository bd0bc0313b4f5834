// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::message::{Message, MessagePayload, MessageStatus};
use crate::topology::Topology;

/// Transport-level failure, split by whether a retry can help.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection resets, timeouts, 5xx from the broker.  Retried.
    #[error("transient transport failure: {0}")]
    Transient(String),
    /// Malformed destination, missing permissions.  Not retried.
    #[error("permanent transport failure: {0}")]
    Permanent(String),
}

/// Errors surfaced by the publisher.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The envelope failed validation before any I/O.  Caller error.
    #[error("invalid message: {0}")]
    Validation(String),
    /// The transport failed after the retry budget was exhausted (or
    /// immediately, for permanent failures).
    #[error("publish failed: {0}")]
    Transport(#[from] TransportError),
}

/// The broker surface (SNS analog).  Real deployments bind this to the
/// platform SDK; tests use [`InMemoryTransport`].
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Publish a serialized envelope to a topic, returning the broker's
    /// delivery id.
    async fn publish_raw(&self, topic_arn: &str, body: &str) -> Result<String, TransportError>;
}

/// Retry schedule for transient publish failures: bounded exponential
/// backoff with full jitter, three attempts total.
const PUBLISH_ATTEMPTS: u32 = 3;
const PUBLISH_BASE_DELAY: Duration = Duration::from_millis(200);

/// Typed publisher.  Selects the destination topic from the envelope's
/// `message_type` and delegates the bytes to the transport.
pub struct Publisher<T: BusTransport> {
    transport: T,
    topology: Topology,
}

impl<T: BusTransport> Publisher<T> {
    pub fn new(transport: T, topology: Topology) -> Self {
        Self { transport, topology }
    }

    /// Publish one envelope.  Returns the envelope id (NOT the broker
    /// delivery id — consumers idempote on the envelope id, which is stable
    /// across redeliveries).
    pub async fn publish(&self, message: &mut Message) -> Result<String, BusError> {
        validate(message)?;

        let topic = self.topology.topic_for(message.message_type).to_string();
        message.transition(MessageStatus::Queued)?;
        let body = serde_json::to_string(message)
            .map_err(|e| BusError::Validation(format!("envelope serialization: {e}")))?;

        let mut delay = PUBLISH_BASE_DELAY;
        let mut last: Option<TransportError> = None;
        for attempt in 1..=PUBLISH_ATTEMPTS {
            match self.transport.publish_raw(&topic, &body).await {
                Ok(delivery_id) => {
                    debug!(
                        message_id = %message.id,
                        %topic,
                        %delivery_id,
                        message_type = ?message.message_type,
                        "published"
                    );
                    return Ok(message.id.clone());
                }
                Err(TransportError::Permanent(e)) => {
                    return Err(TransportError::Permanent(e).into());
                }
                Err(TransportError::Transient(e)) => {
                    warn!(message_id = %message.id, attempt, error = %e, "transient publish failure");
                    last = Some(TransportError::Transient(e));
                    if attempt < PUBLISH_ATTEMPTS {
                        tokio::time::sleep(with_full_jitter(delay)).await;
                        delay *= 2;
                    }
                }
            }
        }
        Err(last.expect("loop ran at least once").into())
    }
}

/// Full jitter: a uniform draw over (0, delay].  Decorrelates concurrent
/// invocations retrying against the same broker.
fn with_full_jitter(delay: Duration) -> Duration {
    let millis = delay.as_millis().max(1) as u64;
    Duration::from_millis(rand::random::<u64>() % millis + 1)
}

fn validate(message: &Message) -> Result<(), BusError> {
    if message.id.is_empty() {
        return Err(BusError::Validation("empty message id".into()));
    }
    if message.status != MessageStatus::Created {
        return Err(BusError::Validation(format!(
            "message {} is {:?}, only created messages can be published",
            message.id, message.status
        )));
    }
    if let MessagePayload::WebAction(w) = &message.payload {
        if w.url.is_empty() {
            return Err(BusError::Validation("web action with empty url".into()));
        }
    }
    Ok(())
}

// ─── In-memory transport ─────────────────────────────────────────────────────

/// Test transport: records every publish, optionally failing the first N
/// attempts to exercise the retry path.
#[derive(Default)]
pub struct InMemoryTransport {
    published: Mutex<Vec<(String, String)>>,
    fail_transient: Mutex<u32>,
    fail_permanent: Mutex<bool>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` publishes with a transient error.
    pub fn fail_next_transient(&self, n: u32) {
        *self.fail_transient.lock().unwrap() = n;
    }

    /// Fail every publish with a permanent error.
    pub fn fail_permanent(&self) {
        *self.fail_permanent.lock().unwrap() = true;
    }

    /// `(topic_arn, body)` pairs in publish order.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl BusTransport for InMemoryTransport {
    async fn publish_raw(&self, topic_arn: &str, body: &str) -> Result<String, TransportError> {
        if *self.fail_permanent.lock().unwrap() {
            return Err(TransportError::Permanent("access denied".into()));
        }
        {
            let mut remaining = self.fail_transient.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransportError::Transient("connection reset".into()));
            }
        }
        let mut published = self.published.lock().unwrap();
        published.push((topic_arn.to_string(), body.to_string()));
        Ok(format!("delivery-{}", published.len()))
    }
}

#[async_trait]
impl<T: BusTransport + ?Sized> BusTransport for std::sync::Arc<T> {
    async fn publish_raw(&self, topic_arn: &str, body: &str) -> Result<String, TransportError> {
        (**self).publish_raw(topic_arn, body).await
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageType, Producer, WebActionKind, WebActionPayload};
    use rez_config::{Stage, TopicArns};
    use serde_json::json;

    fn publisher() -> Publisher<InMemoryTransport> {
        Publisher::new(InMemoryTransport::new(), Topology::new(TopicArns::default()))
    }

    fn notify_message() -> Message {
        Message::new(
            Producer::User,
            Stage::Dev,
            MessageType::Notify,
            MessagePayload::Json(json!({ "message": "tee time booked" })),
        )
    }

    #[tokio::test]
    async fn publish_routes_by_message_type() {
        let p = publisher();
        let mut m = notify_message();
        let id = p.publish(&mut m).await.unwrap();
        assert_eq!(id, m.id);
        let published = p.transport.published();
        assert_eq!(published.len(), 1);
        assert!(published[0].0.contains("notify"));
    }

    #[tokio::test]
    async fn publish_marks_message_queued() {
        let p = publisher();
        let mut m = notify_message();
        p.publish(&mut m).await.unwrap();
        assert_eq!(m.status, MessageStatus::Queued);
    }

    #[tokio::test]
    async fn publish_retries_transient_failures() {
        let p = publisher();
        p.transport.fail_next_transient(2);
        let mut m = notify_message();
        p.publish(&mut m).await.unwrap();
        assert_eq!(p.transport.published().len(), 1);
    }

    #[tokio::test]
    async fn publish_gives_up_after_budget() {
        let p = publisher();
        p.transport.fail_next_transient(PUBLISH_ATTEMPTS);
        let mut m = notify_message();
        let err = p.publish(&mut m).await.unwrap_err();
        assert!(matches!(err, BusError::Transport(TransportError::Transient(_))));
        assert!(p.transport.published().is_empty());
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let p = publisher();
        p.transport.fail_permanent();
        let mut m = notify_message();
        let err = p.publish(&mut m).await.unwrap_err();
        assert!(matches!(err, BusError::Transport(TransportError::Permanent(_))));
    }

    #[tokio::test]
    async fn already_queued_message_is_rejected() {
        let p = publisher();
        let mut m = notify_message();
        p.publish(&mut m).await.unwrap();
        let err = p.publish(&mut m).await.unwrap_err();
        assert!(matches!(err, BusError::Validation(_)));
        assert_eq!(p.transport.published().len(), 1, "no second publish");
    }

    #[tokio::test]
    async fn empty_web_action_url_is_rejected_before_io() {
        let p = publisher();
        let mut m = Message::new(
            Producer::AiAgent,
            Stage::Dev,
            MessageType::WebAction,
            MessagePayload::WebAction(WebActionPayload {
                action_type: WebActionKind::Weather,
                url: String::new(),
                operation: "forecast".into(),
                parameters: None,
            }),
        );
        assert!(matches!(
            p.publish(&mut m).await.unwrap_err(),
            BusError::Validation(_)
        ));
        assert!(p.transport.published().is_empty());
    }

    #[test]
    fn full_jitter_stays_within_bound() {
        for _ in 0..100 {
            let d = with_full_jitter(Duration::from_millis(200));
            assert!(d >= Duration::from_millis(1));
            assert!(d <= Duration::from_millis(200));
        }
    }

    #[tokio::test]
    async fn published_body_round_trips_to_envelope() {
        let p = publisher();
        let mut m = notify_message();
        p.publish(&mut m).await.unwrap();
        let (_, body) = &p.transport.published()[0];
        let back: Message = serde_json::from_str(body).unwrap();
        assert_eq!(back.id, m.id);
        assert_eq!(back.status, MessageStatus::Queued);
    }
}
