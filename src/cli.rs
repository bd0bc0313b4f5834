// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rez",
    about = "Serverless agentic task orchestrator for tee-time booking",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP ingress (messages, schedules, MCP, agent).
    Serve {
        /// Listen address, e.g. 127.0.0.1:8080
        #[arg(long)]
        addr: Option<String>,
    },
    /// Print the effective configuration as YAML.
    ShowConfig,
    /// Parse a course catalog file and report what it contains.
    ValidateCourses {
        /// Path to the courses YAML file.
        file: String,
    },
}
