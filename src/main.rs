// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod cli;
mod wiring;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = rez_config::Config::from_env().context("loading configuration")?;
    init_logging(&config.log_level);

    match cli.command.unwrap_or(Commands::Serve { addr: None }) {
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| "0.0.0.0:8080".to_string());
            serve(config, &addr).await
        }
        Commands::ShowConfig => {
            println!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
        Commands::ValidateCourses { file } => {
            let catalog = rez_config::CourseCatalog::load(&file)?;
            println!(
                "{} courses, hosts: {}",
                catalog.courses.len(),
                catalog.allowed_hosts().join(", ")
            );
            Ok(())
        }
    }
}

/// Structured JSON logs, level from config (overridable via `RUST_LOG`).
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_lowercase()));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_current_span(false))
        .init();
}

async fn serve(config: rez_config::Config, addr: &str) -> anyhow::Result<()> {
    let state = wiring::build_state(&config).context("assembling application state")?;
    let router = rez_gateway::router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, stage = %config.stage, "rez ingress listening");
    axum::serve(listener, router).await.context("serving")
}
