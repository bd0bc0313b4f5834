// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod courses;
mod schema;

pub use courses::{Course, CourseAction, CourseCatalog};
pub use schema::{Config, SecretNames, Stage, TableNames, TopicArns};
