// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Component assembly: the same wiring a deployed function performs at cold
//! start.  Platform-backed surfaces (broker, document store, external
//! scheduler, secret store) bind to their in-process implementations here;
//! a deployment swaps those constructors for SDK-backed ones and nothing
//! else changes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use rez_booking::{CourseEndpoints, HttpGolfApi, TieBreak};
use rez_bus::{
    BusTransport, InMemoryTransport, Message, MessagePayload, MessageType, Producer, Publisher,
    Topology,
};
use rez_config::{Config, Course, CourseCatalog};
use rez_core::{AgentEngine, EngineConfig, IngressLimiter};
use rez_gateway::{AppState, MessagePipeline};
use rez_mcp::McpServer;
use rez_model::ConverseProvider;
use rez_scheduler::{ControlPlane, InMemoryScheduleStore, RecordingBackend};
use rez_store::{
    CostLimiter, InMemoryBookingStore, InMemoryCostStore, InMemoryMessageStore,
    InMemoryResultStore, InMemorySessionStore,
};
use rez_tools::{
    CourseDirectory, CourseSession, GetWeatherTool, GolfBookTool, GolfReservationsTool,
    GolfSearchTool, HttpWeatherSource, Notifier, Priority, SendPushNotificationTool, ToolRegistry,
};
use rez_web::{
    verify_jwt, JwksCache, OAuthCredentials, SecretCache, StaticSecrets, TokenCache, UrlGuard,
    WebActionExecutor, WebError,
};

/// Forecast host allowed alongside the course origins.
const WEATHER_HOST: &str = "api.weather.gov";

/// Assemble the full application state from configuration.
pub fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let catalog = match CourseCatalog::load(&config.courses_file) {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!(error = %e, "course catalog unavailable, golf tools will refuse calls");
            CourseCatalog::default()
        }
    };

    let transport = Arc::new(InMemoryTransport::new());
    let topology = Topology::new(config.topics.clone());

    let results = Arc::new(InMemoryResultStore::new());
    let bookings = Arc::new(InMemoryBookingStore::new());

    let mut allowed_hosts = catalog.allowed_hosts();
    allowed_hosts.push(WEATHER_HOST.to_string());

    let directory = Arc::new(GolfCourseDirectory::new(
        catalog.clone(),
        config.secrets.golf_credentials.clone(),
        golf_secrets(config),
        results.clone(),
    ));

    let notifier = Arc::new(BusNotifier {
        publisher: Publisher::new(transport.clone(), topology.clone()),
        config: config.clone(),
    });

    let default_course = catalog
        .courses
        .first()
        .map(|c: &Course| c.name.clone())
        .unwrap_or_else(|| "Birdsfoot".to_string());
    let prefetch_directory: Arc<dyn CourseDirectory> = directory.clone();
    let prefetch_course = default_course.clone();

    let mut registry = ToolRegistry::new();
    registry
        .register(SendPushNotificationTool { notifier })
        .context("registering send_push_notification")?;
    registry
        .register(GetWeatherTool {
            source: Arc::new(HttpWeatherSource::new(WebActionExecutor::new(
                UrlGuard::new(allowed_hosts.clone()),
                results.clone(),
            ))),
        })
        .context("registering get_weather")?;
    registry
        .register(GolfSearchTool {
            directory: directory.clone(),
            bookings: bookings.clone(),
            tie_break: TieBreak::TeeSheetId,
        })
        .context("registering golf_search_tee_times")?;
    registry
        .register(GolfBookTool {
            directory: directory.clone(),
            bookings,
            course_name: default_course,
        })
        .context("registering golf_book_tee_time")?;
    registry
        .register(GolfReservationsTool { directory })
        .context("registering golf_get_reservations")?;
    let registry = Arc::new(registry);

    let engine = AgentEngine::new(
        ConverseProvider::new(config.model_id.clone(), config.aws_region.clone()),
        registry.clone(),
        InMemorySessionStore::new(),
        CostLimiter::new(InMemoryCostStore::new(), config.stage, config.daily_cost_cap),
        IngressLimiter::per_minute(config.llm_rate_limit_rpm),
        EngineConfig {
            max_iterations: 10,
            llm_max_retries: config.llm_max_retries,
        },
    );
    let agent = PrefetchingAgent {
        engine,
        directory: prefetch_directory,
        weather: Arc::new(HttpWeatherSource::new(WebActionExecutor::new(
            UrlGuard::new(allowed_hosts),
            results,
        ))),
        default_course: prefetch_course,
        forecast_url: config.forecast_url.clone(),
        deadline_margin: Duration::from_secs(config.deadline_margin_secs),
    };

    let control = ControlPlane::new(
        RecordingBackend::new(),
        InMemoryScheduleStore::new(),
        Publisher::new(transport.clone(), topology.clone()),
        topology.clone(),
        config.stage,
        config.scheduler_role_arn.clone(),
    );

    let pipeline = MessagePipeline::new(
        Publisher::new(transport, topology),
        InMemoryMessageStore::new(),
    );

    Ok(AppState {
        agent: Arc::new(agent),
        schedules: Arc::new(control),
        messages: Arc::new(pipeline),
        mcp: Arc::new(McpServer::new(registry, config.mcp_api_key.clone())),
    })
}

/// Local secret source: golf credentials arrive as a JSON object in
/// `GOLF_CREDENTIALS_JSON`.  Deployments bind a real secret store instead.
fn golf_secrets(config: &Config) -> StaticSecrets {
    let mut secrets = StaticSecrets::new();
    if let Ok(raw) = std::env::var("GOLF_CREDENTIALS_JSON") {
        match serde_json::from_str(&raw) {
            Ok(value) => {
                secrets = secrets.with(config.secrets.golf_credentials.clone(), value);
            }
            Err(e) => warn!(error = %e, "GOLF_CREDENTIALS_JSON is not valid JSON"),
        }
    }
    secrets
}

// ─── Prefetching agent front ─────────────────────────────────────────────────

/// Platform budget for one agent request.
const AGENT_BUDGET: Duration = Duration::from_secs(5 * 60);

/// Gathers existing reservations and the forecast BEFORE the model loop so
/// the first turn can already decide.  Prefetch failures degrade to an
/// empty section; they never block the conversation.
struct PrefetchingAgent<P, S, C>
where
    P: rez_model::ModelProvider,
    S: rez_store::SessionStore,
    C: rez_store::CostStore,
{
    engine: AgentEngine<P, S, C>,
    directory: Arc<dyn CourseDirectory>,
    weather: Arc<dyn rez_tools::WeatherSource>,
    default_course: String,
    forecast_url: Option<String>,
    deadline_margin: Duration,
}

impl<P, S, C> PrefetchingAgent<P, S, C>
where
    P: rez_model::ModelProvider,
    S: rez_store::SessionStore,
    C: rez_store::CostStore,
{
    async fn prefetch(&self) -> rez_core::PrefetchedContext {
        let reservations = match self.directory.session(&self.default_course).await {
            Ok(session) => match session.api.reservations(&self.default_course).await {
                Ok(list) if list.is_empty() => Some("none".to_string()),
                Ok(list) => Some(
                    list.iter()
                        .map(|r| format!("- {} for {} players", r.start_time, r.num_players))
                        .collect::<Vec<_>>()
                        .join("\n"),
                ),
                Err(e) => {
                    warn!(error = %e, "reservation prefetch failed");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "course session prefetch failed");
                None
            }
        };

        let weather = match &self.forecast_url {
            Some(url) => match self.weather.forecast(url, 3).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!(error = %e, "weather prefetch failed");
                    None
                }
            },
            None => None,
        };

        rez_core::PrefetchedContext {
            reservations,
            weather,
        }
    }
}

#[async_trait]
impl<P, S, C> rez_gateway::AgentService for PrefetchingAgent<P, S, C>
where
    P: rez_model::ModelProvider,
    S: rez_store::SessionStore,
    C: rez_store::CostStore,
{
    async fn handle(
        &self,
        session_id: Option<String>,
        message: &str,
    ) -> Result<rez_core::AgentReply, rez_core::AgentError> {
        let context = self.prefetch().await;
        let deadline =
            std::time::Instant::now() + AGENT_BUDGET.saturating_sub(self.deadline_margin);
        self.engine
            .handle_message(session_id, message, &context, Some(deadline))
            .await
    }
}

// ─── Notifications via the bus ───────────────────────────────────────────────

/// Publishes notify messages; a downstream consumer owns delivery to the
/// push provider.
struct BusNotifier<T: BusTransport> {
    publisher: Publisher<T>,
    config: Config,
}

#[async_trait]
impl<T: BusTransport> Notifier for BusNotifier<T> {
    async fn notify(
        &self,
        title: Option<&str>,
        message: &str,
        priority: Priority,
    ) -> anyhow::Result<()> {
        let mut envelope = Message::new(
            Producer::AiAgent,
            self.config.stage,
            MessageType::Notify,
            MessagePayload::Json(json!({
                "title": title,
                "message": message,
                "priority": priority.as_str(),
            })),
        );
        self.publisher.publish(&mut envelope).await?;
        Ok(())
    }
}

// ─── Course directory ────────────────────────────────────────────────────────

/// Resolves a course into an authenticated API session.
///
/// Token acquisition and JWKS verification happen here, once per session
/// request — a golf tool cannot see an API client unless the JWT behind it
/// verified and carried the booking claims.
pub struct GolfCourseDirectory<S: rez_web::SecretSource> {
    catalog: CourseCatalog,
    secret_name: String,
    secrets: SecretCache<S>,
    jwks: JwksCache,
    tokens: tokio::sync::Mutex<HashMap<String, Arc<TokenCache>>>,
    results: Arc<InMemoryResultStore>,
    http: reqwest::Client,
}

impl<S: rez_web::SecretSource> GolfCourseDirectory<S> {
    pub fn new(
        catalog: CourseCatalog,
        secret_name: String,
        secrets: S,
        results: Arc<InMemoryResultStore>,
    ) -> Self {
        let http = reqwest::Client::new();
        Self {
            catalog,
            secret_name,
            secrets: SecretCache::new(secrets),
            jwks: JwksCache::new(http.clone()),
            tokens: tokio::sync::Mutex::new(HashMap::new()),
            results,
            http,
        }
    }

    async fn token_cache(&self, course_name: &str) -> Arc<TokenCache> {
        let mut tokens = self.tokens.lock().await;
        tokens
            .entry(course_name.to_lowercase())
            .or_insert_with(|| Arc::new(TokenCache::new(self.http.clone())))
            .clone()
    }
}

#[async_trait]
impl<S: rez_web::SecretSource> CourseDirectory for GolfCourseDirectory<S> {
    async fn session(&self, course_name: &str) -> Result<CourseSession, WebError> {
        let course = self.catalog.by_name(course_name).ok_or_else(|| {
            WebError::Rejected {
                status: 404,
                body: format!("course {course_name:?} is not configured"),
            }
        })?;

        let secret = self.secrets.get(&self.secret_name).await?;
        let read = |key: &str| -> Result<String, WebError> {
            secret[key]
                .as_str()
                .map(String::from)
                .ok_or_else(|| WebError::Auth(format!("golf credential missing {key:?}")))
        };
        let origin = course.origin.trim_end_matches('/');
        let creds = OAuthCredentials {
            token_url: format!("{origin}/connect/token"),
            username: read("username")?,
            password: read("password")?,
            client_id: course.client_id.clone(),
            client_secret: secret["client_secret"].as_str().unwrap_or_default().to_string(),
            scope: course.scope.clone(),
        };

        let bearer = self.token_cache(course_name).await.bearer(&creds).await?;

        // The access token is itself the JWT the booking claims come from.
        let jwks = self
            .jwks
            .get(&format!("{origin}/.well-known/openid-configuration/jwks"))
            .await?;
        let claims = verify_jwt(&bearer, &jwks)?;

        let endpoints = endpoints_for(course)?;
        let executor = WebActionExecutor::new(
            UrlGuard::new(self.catalog.allowed_hosts()),
            self.results.clone(),
        );
        Ok(CourseSession {
            api: Arc::new(HttpGolfApi::new(executor, endpoints, bearer)),
            claims,
        })
    }
}

fn endpoints_for(course: &Course) -> Result<CourseEndpoints, WebError> {
    let url = |action: &str| -> Result<String, WebError> {
        course
            .action_url(action)
            .map(String::from)
            .ok_or_else(|| WebError::Rejected {
                status: 500,
                body: format!("course {:?} has no {action:?} action", course.name),
            })
    };
    Ok(CourseEndpoints {
        search_url: url("search_tee_times")?,
        reservations_url: url("get_reservations")?,
        lock_url: url("lock_tee_times")?,
        price_url: url("price_tee_times")?,
        reserve_url: url("reserve_tee_times")?,
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
