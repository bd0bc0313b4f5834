// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The HTTP ingress.
//!
//! Thin by design: every route deserializes, delegates to a service seam,
//! and maps the outcome onto a status code and a structured body.  Error
//! classification (what retries, what is the caller's fault, what is ours)
//! happens in the component crates; this crate only translates it to HTTP.

mod error;
mod routes;
mod services;

pub use error::ApiError;
pub use routes::{router, AppState};
pub use services::{AgentService, MessageIngress, MessagePipeline, ScheduleService};
