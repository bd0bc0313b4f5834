// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The message fabric: typed envelopes, per-class topic routing, a retrying
//! publisher, and the partial-batch consumer contract.
//!
//! Delivery is at-least-once and unordered.  Consumers must be idempotent on
//! message id; the envelope id is generated once at publish time and is
//! stable across redeliveries.  After three failed deliveries the broker
//! moves a message to the class-specific dead-letter queue, where it stays
//! until an operator looks at it — nothing in this crate re-drives a DLQ.

mod consume;
mod message;
mod publish;
mod topology;

pub use consume::{consume_batch, BatchResult, QueueRecord, MAX_BATCH_SIZE, MAX_RECEIVE_COUNT};
pub use message::{
    AuthConfigRef, Message, MessagePayload, MessageStatus, MessageType, Producer, WebActionKind,
    WebActionPayload,
};
pub use publish::{BusError, BusTransport, InMemoryTransport, Publisher, TransportError};
pub use topology::Topology;
