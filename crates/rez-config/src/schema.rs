// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Deployment environment discriminator.
///
/// Every persisted record and every topic/table/secret name is qualified by
/// the stage, so two stages sharing one AWS account never see each other's
/// data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Dev,
    Stage,
    Prod,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Dev => "dev",
            Stage::Stage => "stage",
            Stage::Prod => "prod",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Stage::Dev),
            "stage" => Ok(Stage::Stage),
            "prod" => Ok(Stage::Prod),
            other => anyhow::bail!("unknown stage: {other:?} (expected dev|stage|prod)"),
        }
    }
}

/// Topic ARNs, one per message class.
///
/// The per-class topic IS the routing decision — there is no filter
/// expression anywhere in the fabric.  A message's `message_type` selects
/// exactly one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicArns {
    pub web_action: String,
    pub notify: String,
    pub agent_response: String,
    pub schedule_creation: String,
}

impl Default for TopicArns {
    fn default() -> Self {
        Self {
            web_action: "arn:aws:sns:us-east-1:000000000000:rez-web-actions-dev".into(),
            notify: "arn:aws:sns:us-east-1:000000000000:rez-notify-dev".into(),
            agent_response: "arn:aws:sns:us-east-1:000000000000:rez-agent-responses-dev".into(),
            schedule_creation: "arn:aws:sns:us-east-1:000000000000:rez-schedule-creation-dev"
                .into(),
        }
    }
}

/// Logical table names in the document store, one per entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableNames {
    pub messages: String,
    pub schedules: String,
    pub web_action_results: String,
    pub sessions: String,
    pub cost: String,
    pub booking_sessions: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            messages: "rez-messages".into(),
            schedules: "rez-schedules".into(),
            web_action_results: "rez-web-action-results".into(),
            sessions: "rez-sessions".into(),
            cost: "rez-cost".into(),
            booking_sessions: "rez-booking-sessions".into(),
        }
    }
}

/// Names under which credentials live in the external secret store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretNames {
    pub golf_credentials: String,
    pub push_credentials: String,
}

impl Default for SecretNames {
    fn default() -> Self {
        Self {
            golf_credentials: "rez/golf-credentials".into(),
            push_credentials: "rez/push-credentials".into(),
        }
    }
}

/// Runtime configuration, environment-variable shaped.
///
/// Every field has a production-sensible default so a cold invocation with a
/// bare environment still starts; `from_env()` overlays whatever the platform
/// provides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub stage: Stage,
    /// Log filter level: DEBUG | INFO | WARN | ERROR.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Daily LLM spend cap in dollars, per stage.
    #[serde(default = "default_cost_cap")]
    pub daily_cost_cap: Decimal,
    /// Ingress token-bucket rate for the agent path, requests per minute.
    #[serde(default = "default_rate_limit_rpm")]
    pub llm_rate_limit_rpm: u32,
    /// Application-level retry budget for throttled model calls.
    #[serde(default = "default_llm_max_retries")]
    pub llm_max_retries: u32,
    /// Model id forwarded to the inference endpoint.
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// AWS region for the inference endpoint.
    #[serde(default = "default_region")]
    pub aws_region: String,
    /// Pre-shared key required on the MCP ingress route.
    #[serde(default)]
    pub mcp_api_key: Option<String>,
    /// Execution role the external scheduler assumes to publish into the bus.
    ///
    /// Read from config rather than derived, breaking the role↔function
    /// ownership cycle (the role's resource scope uses the wildcard pattern
    /// `arn:…:function:rez-agent-*-{stage}`).
    #[serde(default = "default_scheduler_role")]
    pub scheduler_role_arn: String,
    #[serde(default)]
    pub topics: TopicArns,
    #[serde(default)]
    pub tables: TableNames,
    #[serde(default)]
    pub secrets: SecretNames,
    /// Safety margin subtracted from the platform deadline before the agent
    /// loop gives up and persists its partial state, in seconds.
    #[serde(default = "default_deadline_margin")]
    pub deadline_margin_secs: u64,
    /// Path to the golf course catalog file.
    #[serde(default = "default_courses_path")]
    pub courses_file: String,
    /// Forecast endpoint for the default course's location, pre-fetched
    /// into the system prompt when set.
    #[serde(default)]
    pub forecast_url: Option<String>,
}

fn default_log_level() -> String {
    "INFO".into()
}

fn default_cost_cap() -> Decimal {
    Decimal::new(500, 2) // $5.00
}

fn default_rate_limit_rpm() -> u32 {
    30
}

fn default_llm_max_retries() -> u32 {
    5
}

fn default_model_id() -> String {
    "us.anthropic.claude-3-5-sonnet-20241022-v2:0".into()
}

fn default_region() -> String {
    "us-east-1".into()
}

fn default_scheduler_role() -> String {
    "arn:aws:iam::000000000000:role/rez-scheduler-publish-dev".into()
}

fn default_deadline_margin() -> u64 {
    15
}

fn default_courses_path() -> String {
    "config/courses.yaml".into()
}

impl Default for Config {
    fn default() -> Self {
        // Round-trip through serde so the field defaults above are the single
        // source of truth.
        serde_yaml::from_str("{}").expect("empty mapping deserializes")
    }
}

impl Config {
    /// Build a config from process environment variables, falling back to
    /// the field defaults for anything unset.
    ///
    /// Malformed numeric/enum values are hard errors: a mistyped
    /// `DAILY_COST_CAP` silently falling back to $5.00 would be worse than a
    /// failed cold start.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut cfg = Config::default();

        if let Ok(v) = std::env::var("STAGE") {
            cfg.stage = v.parse()?;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            cfg.log_level = v;
        }
        if let Ok(v) = std::env::var("DAILY_COST_CAP") {
            cfg.daily_cost_cap = v
                .parse::<Decimal>()
                .map_err(|e| anyhow::anyhow!("DAILY_COST_CAP {v:?}: {e}"))?;
        }
        if let Ok(v) = std::env::var("LLM_RATE_LIMIT_RPM") {
            cfg.llm_rate_limit_rpm = v
                .parse()
                .map_err(|e| anyhow::anyhow!("LLM_RATE_LIMIT_RPM {v:?}: {e}"))?;
        }
        if let Ok(v) = std::env::var("LLM_MAX_RETRIES") {
            cfg.llm_max_retries = v
                .parse()
                .map_err(|e| anyhow::anyhow!("LLM_MAX_RETRIES {v:?}: {e}"))?;
        }
        if let Ok(v) = std::env::var("MODEL_ID") {
            cfg.model_id = v;
        }
        if let Ok(v) = std::env::var("AWS_REGION") {
            cfg.aws_region = v;
        }
        if let Ok(v) = std::env::var("MCP_API_KEY") {
            cfg.mcp_api_key = Some(v);
        }
        if let Ok(v) = std::env::var("SCHEDULER_ROLE_ARN") {
            cfg.scheduler_role_arn = v;
        }
        if let Ok(v) = std::env::var("WEB_ACTION_TOPIC_ARN") {
            cfg.topics.web_action = v;
        }
        if let Ok(v) = std::env::var("NOTIFY_TOPIC_ARN") {
            cfg.topics.notify = v;
        }
        if let Ok(v) = std::env::var("AGENT_RESPONSE_TOPIC_ARN") {
            cfg.topics.agent_response = v;
        }
        if let Ok(v) = std::env::var("SCHEDULE_CREATION_TOPIC_ARN") {
            cfg.topics.schedule_creation = v;
        }
        if let Ok(v) = std::env::var("COURSES_FILE") {
            cfg.courses_file = v;
        }
        if let Ok(v) = std::env::var("FORECAST_URL") {
            cfg.forecast_url = Some(v);
        }

        Ok(cfg)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
