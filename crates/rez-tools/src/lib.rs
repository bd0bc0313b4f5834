// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The tool layer: a typed registry plus the production tool set.
//!
//! Input validation happens in the registry, before any tool code runs —
//! a call that fails validation has no side effect, by construction.

pub mod builtin;
mod registry;
mod tool;
mod validate;

pub use builtin::{
    CourseDirectory, CourseSession, GetWeatherTool, GolfBookTool, GolfReservationsTool,
    GolfSearchTool, HttpWeatherSource, InMemoryDirectory, Notifier, Priority, RecordingNotifier,
    SendPushNotificationTool, WeatherSource,
};
pub use registry::{RegistryError, ToolRegistry};
pub use tool::{Tool, ToolCall, ToolOutput};
pub use validate::validate_input;
