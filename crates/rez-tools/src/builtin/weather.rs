// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use rez_store::ResultStore;
use rez_web::{WebActionExecutor, WebError, WebRequest};

use crate::tool::{Tool, ToolCall, ToolOutput};

/// Forecast retrieval seam.  The HTTP implementation runs through the
/// guarded executor; tests script it.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// A human-readable forecast for up to `days` days.
    async fn forecast(&self, location_url: &str, days: u8) -> Result<String, WebError>;
}

/// Fetches the NWS-style forecast document behind `location_url` and
/// renders the day/night periods as plain text.
pub struct HttpWeatherSource<R: ResultStore> {
    executor: WebActionExecutor<R>,
}

impl<R: ResultStore> HttpWeatherSource<R> {
    pub fn new(executor: WebActionExecutor<R>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl<R: ResultStore> WeatherSource for HttpWeatherSource<R> {
    async fn forecast(&self, location_url: &str, days: u8) -> Result<String, WebError> {
        let outcome = self
            .executor
            .execute(&WebRequest {
                message_id: "weather".into(),
                action: "get_weather".into(),
                method: reqwest::Method::GET,
                url: location_url.to_string(),
                body: None,
                bearer: None,
            })
            .await?;
        let body: Value = serde_json::from_str(&outcome.body).map_err(|e| WebError::Rejected {
            status: outcome.status,
            body: format!("undecodable forecast: {e}"),
        })?;
        Ok(render_forecast(&body, days))
    }
}

/// Flatten forecast periods into lines.  The NWS document carries two
/// periods per day (day + night).
pub(crate) fn render_forecast(body: &Value, days: u8) -> String {
    let Some(periods) = body["properties"]["periods"].as_array() else {
        return "forecast unavailable".into();
    };
    let lines: Vec<String> = periods
        .iter()
        .take(days as usize * 2)
        .filter_map(|p| {
            let name = p["name"].as_str()?;
            let temp = p["temperature"].as_i64()?;
            let unit = p["temperatureUnit"].as_str().unwrap_or("F");
            let short = p["shortForecast"].as_str().unwrap_or("");
            Some(format!("{name}: {temp}°{unit}, {short}"))
        })
        .collect();
    if lines.is_empty() {
        "forecast unavailable".into()
    } else {
        lines.join("\n")
    }
}

pub struct GetWeatherTool {
    pub source: Arc<dyn WeatherSource>,
}

#[async_trait]
impl Tool for GetWeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the weather forecast for a course location. \
         Returns one line per day/night period with temperature and a short \
         description. Use this before booking to judge playing conditions."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location_url": {
                    "type": "string",
                    "format": "url",
                    "description": "Forecast endpoint for the course location"
                },
                "days": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 7,
                    "description": "How many days ahead to include"
                }
            },
            "required": ["location_url", "days"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let url = call.args["location_url"].as_str().unwrap_or_default();
        let days = call.args["days"].as_u64().unwrap_or(1) as u8;
        match self.source.forecast(url, days).await {
            Ok(text) => ToolOutput::ok(&call.id, text),
            Err(e) => ToolOutput::err(&call.id, format!("weather lookup failed: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
