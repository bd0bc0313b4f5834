// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The scheduler control plane.
//!
//! Schedules are the only entity this crate owns: validated, persisted,
//! realized as entries in an external scheduler service, and — when that
//! service fires — turned into bus messages.  The external service never
//! gets more than a publish-into-the-bus role; the role ARN comes from
//! config to keep the role↔function reference acyclic.

mod control;
mod expression;
mod schedule;

pub use control::{ControlPlane, TriggerEvent};
pub use expression::{validate_expression, validate_timezone};
pub use schedule::{
    InMemoryScheduleStore, RecordingBackend, Schedule, ScheduleDefinition, ScheduleError,
    ScheduleStatus, ScheduleStore, SchedulerBackend, TargetType,
};
