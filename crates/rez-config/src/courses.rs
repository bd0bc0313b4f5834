// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Static golf course catalog.
//!
//! Each configured course carries its own API origin and OAuth client, and a
//! named set of action endpoints.  The course *name* is the routing key for
//! every golf tool invocation — tools never see raw URLs, they resolve
//! `(course, action)` pairs through this catalog.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One remote endpoint a course exposes, e.g. `search_tee_times`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseAction {
    pub name: String,
    pub url: String,
}

/// A golf venue with its own API origin and OAuth client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub course_id: u32,
    pub name: String,
    /// API origin, e.g. `https://birdsfoot.cps.golf`.
    pub origin: String,
    pub client_id: String,
    pub website_id: String,
    /// OAuth scope requested during password-grant token acquisition.
    pub scope: String,
    pub actions: Vec<CourseAction>,
}

impl Course {
    /// Resolve a named action to its URL.
    pub fn action_url(&self, action: &str) -> Option<&str> {
        self.actions
            .iter()
            .find(|a| a.name == action)
            .map(|a| a.url.as_str())
    }
}

/// The full catalog, loaded once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseCatalog {
    pub courses: Vec<Course>,
}

impl CourseCatalog {
    /// Load the catalog from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading course catalog {}", path.display()))?;
        let catalog: CourseCatalog = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing course catalog {}", path.display()))?;
        debug!(courses = catalog.courses.len(), "loaded course catalog");
        Ok(catalog)
    }

    /// Look up a course by display name, case-insensitively.
    ///
    /// Case-insensitive because the name arrives from LLM tool arguments,
    /// which may normalize capitalization differently than the catalog.
    pub fn by_name(&self, name: &str) -> Option<&Course> {
        self.courses
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// All allowlisted API hosts, derived from each course origin plus each
    /// action URL.  This feeds the web-action executor's URL guard.
    pub fn allowed_hosts(&self) -> Vec<String> {
        let mut hosts = Vec::new();
        for course in &self.courses {
            let mut push = |url: &str| {
                if let Some(host) = host_of(url) {
                    if !hosts.contains(&host) {
                        hosts.push(host);
                    }
                }
            };
            push(&course.origin);
            for action in &course.actions {
                push(&action.url);
            }
        }
        hosts
    }
}

/// Extract the host portion of an absolute URL without a full URL parser.
/// Good enough for config-sourced strings; the executor re-validates with
/// `reqwest::Url` before any I/O.
fn host_of(url: &str) -> Option<String> {
    let rest = url.split_once("://")?.1;
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.split('@').next_back()?;
    let host = host.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
