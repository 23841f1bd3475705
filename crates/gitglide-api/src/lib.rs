//! # GitGlide HTTP Service
//!
//! HTTP surface of the deployment-failure auto-remediation pipeline.
//!
//! This service provides:
//! - The inbound Vercel webhook endpoint with HMAC-SHA1 signature validation
//! - The auto-fix toggle command and the project/deployment listings it feeds
//! - Credential management for the Jules and Vercel tokens
//! - Health, readiness and Prometheus metrics endpoints
//!
//! Remediation itself runs out of band in the [`RemediationWorker`].

pub mod auth;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod remediation_worker;
pub mod responses;

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

pub use auth::AuthenticatedUser;
pub use config::ServiceConfig;
pub use errors::{ConfigError, HandlerError, ServiceError};
pub use metrics::ServiceMetrics;
pub use remediation_worker::{RemediationWorker, WorkerOutcome};

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use bytes::Bytes;
use gitglide_core::{
    AgentSessionService, AuditLogReader, CapabilityKey, CredentialVault, DeploymentPlatform,
    EventQueue, IntegrationConfigStore, ProjectId, Provider, ReceiveError, ReceiveOutcome,
    RemediationWorkflow, SecretToken, ToggleResult, UserId, WebhookLogStore, WebhookReceiver,
    WebhookRegistrar,
};
use responses::{
    ApiSuccess, DeploymentListResponse, HealthResponse, KeyStatus, KeysResponse,
    ProjectListResponse, ProjectView, ReadinessResponse, ReceivedResponse, SetKeyRequest,
    ToggleRequest,
};
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{error, info, instrument, warn};

/// Number of deployments fetched for the annotated listing
pub const DEPLOYMENT_LIST_LIMIT: usize = 20;

// ============================================================================
// Application State
// ============================================================================

/// Storage, queue and upstream implementations the service is wired with
#[derive(Clone)]
pub struct Backends {
    pub vault: Arc<dyn CredentialVault>,
    pub configs: Arc<dyn IntegrationConfigStore>,
    pub logs: Arc<dyn WebhookLogStore>,
    pub queue: Arc<dyn EventQueue>,
    pub platform: Arc<dyn DeploymentPlatform>,
    pub agent: Arc<dyn AgentSessionService>,
}

impl Backends {
    /// Build the remediation workflow the worker runs
    pub fn workflow(&self, config: &ServiceConfig) -> RemediationWorkflow {
        RemediationWorkflow::new(
            self.vault.clone(),
            self.logs.clone(),
            self.platform.clone(),
            self.agent.clone(),
            config.workflow_settings(),
        )
    }

    /// Build the queue consumer for this configuration
    pub fn worker(&self, config: &ServiceConfig, metrics: Arc<ServiceMetrics>) -> RemediationWorker {
        RemediationWorker::new(
            self.queue.clone(),
            Arc::new(self.workflow(config)),
            metrics,
            config.workflow.worker_concurrency,
            Duration::from_secs(config.workflow.poll_timeout_seconds),
        )
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Registers and removes per-project webhooks
    pub registrar: Arc<WebhookRegistrar>,

    /// Authenticates and dispatches inbound deliveries
    pub receiver: Arc<WebhookReceiver>,

    /// Annotates deployment listings with fix status
    pub audit_reader: Arc<AuditLogReader>,

    pub platform: Arc<dyn DeploymentPlatform>,
    pub vault: Arc<dyn CredentialVault>,
    pub configs: Arc<dyn IntegrationConfigStore>,
    pub logs: Arc<dyn WebhookLogStore>,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServiceConfig, backends: &Backends, metrics: Arc<ServiceMetrics>) -> Self {
        let registrar = WebhookRegistrar::new(
            backends.vault.clone(),
            backends.configs.clone(),
            backends.platform.clone(),
            config.registrar_settings(),
        );
        let receiver = WebhookReceiver::new(
            backends.configs.clone(),
            backends.queue.clone(),
            config.receiver_settings(),
        );
        let audit_reader = AuditLogReader::new(backends.logs.clone());

        Self {
            config,
            registrar: Arc::new(registrar),
            receiver: Arc::new(receiver),
            audit_reader: Arc::new(audit_reader),
            platform: backends.platform.clone(),
            vault: backends.vault.clone(),
            configs: backends.configs.clone(),
            logs: backends.logs.clone(),
            metrics,
        }
    }

    async fn vercel_token(&self, user_id: &UserId) -> Result<SecretToken, HandlerError> {
        self.vault
            .get_token(user_id, Provider::Vercel)
            .await?
            .ok_or(HandlerError::NotConnected {
                provider: Provider::Vercel,
            })
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new().route(
        &state.config.autofix.receiver_path,
        post(handle_webhook),
    );

    let integration_routes = Router::new()
        .route(
            "/api/integrations/vercel/projects",
            get(list_projects),
        )
        .route(
            "/api/integrations/vercel/projects/toggle",
            post(toggle_project_autofix),
        )
        .route(
            "/api/integrations/vercel/deployments",
            get(list_deployments),
        );

    let credential_routes = Router::new()
        .route("/api/user/keys", get(get_keys).post(set_key))
        .route("/api/user/keys/{provider}", delete(clear_key));

    let health_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/ready", get(handle_readiness_check))
        .route("/metrics", get(metrics_endpoint));

    let server = &state.config.server;
    let mut router = Router::new()
        .merge(webhook_routes)
        .merge(integration_routes)
        .merge(credential_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(middleware::from_fn_with_state(
                    state.metrics.clone(),
                    metrics_middleware,
                ))
                .layer(TimeoutLayer::new(Duration::from_secs(server.timeout_seconds)))
                .map_response(IntoResponse::into_response)
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(server.max_body_size))
                .into_inner(),
        );

    if server.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

/// Start HTTP server and serve until `shutdown` resolves
pub async fn start_server<F>(state: AppState, shutdown: F) -> Result<(), ServiceError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let host = state.config.server.host.clone();
    let port = state.config.server.port;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: format!("{}:{}", host, port),
            message: e.to_string(),
        })?;

    info!(host = %host, port = port, "Starting HTTP server");

    // In-flight requests complete before the server returns
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

// ============================================================================
// Webhook Handler
// ============================================================================

/// Handle an inbound Vercel deployment event
///
/// Every accepted or ignored delivery is acknowledged with
/// `{received: true}`; remediation happens after the response.
#[instrument(skip(state, headers, body), fields(body_len = body.len()))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiSuccess<ReceivedResponse>, HandlerError> {
    let signature = headers
        .get(state.config.autofix.signature_header.as_str())
        .and_then(|v| v.to_str().ok());

    match state.receiver.receive(&body, signature).await {
        Ok(outcome) => {
            let label = match &outcome {
                ReceiveOutcome::Dispatched { .. } => "dispatched",
                ReceiveOutcome::Ignored(reason) => {
                    info!(reason = %reason, "Delivery acknowledged without dispatch");
                    "ignored"
                }
            };
            state
                .metrics
                .webhook_deliveries_total
                .with_label_values(&[label])
                .inc();
            Ok(ApiSuccess::new(ReceivedResponse { received: true }))
        }
        Err(e) => {
            let label = match &e {
                ReceiveError::MissingSignature | ReceiveError::InvalidSignature => {
                    state.metrics.signature_validation_failures.inc();
                    "rejected"
                }
                ReceiveError::MalformedPayload { .. } => "rejected",
                ReceiveError::Storage(_) | ReceiveError::Dispatch(_) => "error",
            };
            state
                .metrics
                .webhook_deliveries_total
                .with_label_values(&[label])
                .inc();
            state
                .metrics
                .record_error(e.error_category(), e.is_transient());
            Err(e.into())
        }
    }
}

// ============================================================================
// Integration Handlers
// ============================================================================

/// Enable or disable auto-fix for one of the caller's projects
#[instrument(skip(state, body), fields(user_id = %user_id))]
async fn toggle_project_autofix(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    body: Result<Json<ToggleRequest>, JsonRejection>,
) -> Result<ApiSuccess<ToggleResult>, HandlerError> {
    let Json(request) = body.map_err(|e| {
        warn!(error = %e, "Rejected toggle body");
        HandlerError::bad_request("Invalid request body")
    })?;
    let project_id = ProjectId::new(request.project_id)
        .map_err(|_| HandlerError::bad_request("Invalid request body"))?;

    let result = state
        .registrar
        .set_project_autofix(&user_id, &project_id, request.enabled)
        .await;

    let label = match &result {
        Ok(ToggleResult::Enabled { .. }) => "enabled",
        Ok(ToggleResult::Disabled) => "disabled",
        Err(e) => {
            state
                .metrics
                .record_error(e.error_category(), e.is_transient());
            "error"
        }
    };
    state
        .metrics
        .autofix_toggles_total
        .with_label_values(&[label])
        .inc();

    Ok(ApiSuccess::new(result?))
}

/// List the caller's Vercel projects with their auto-fix state
#[instrument(skip(state), fields(user_id = %user_id))]
async fn list_projects(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<ApiSuccess<ProjectListResponse>, HandlerError> {
    let token = state.vercel_token(&user_id).await?;
    let projects = state
        .platform
        .list_projects(&token)
        .await
        .map_err(|e| HandlerError::upstream("Failed to fetch Vercel projects", e))?;

    let enabled: HashSet<String> = state
        .configs
        .list_for_user(&user_id, CapabilityKey::VERCEL_PROJECT_PREFIX)
        .await?
        .into_iter()
        .filter(|c| c.enabled)
        .filter_map(|c| c.key.vercel_project_id().map(str::to_string))
        .collect();

    let projects = projects
        .into_iter()
        .map(|p| {
            let is_enabled = enabled.contains(&p.id);
            ProjectView::from_summary(p, is_enabled)
        })
        .collect();

    Ok(ApiSuccess::new(ProjectListResponse { projects }))
}

/// List the caller's recent deployments annotated with fix status
#[instrument(skip(state), fields(user_id = %user_id))]
async fn list_deployments(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<ApiSuccess<DeploymentListResponse>, HandlerError> {
    let token = state.vercel_token(&user_id).await?;
    let deployments = state
        .platform
        .list_deployments(&token, DEPLOYMENT_LIST_LIMIT)
        .await
        .map_err(|e| HandlerError::upstream("Failed to fetch deployments", e))?;

    let deployments = state.audit_reader.annotate(&user_id, deployments).await?;
    Ok(ApiSuccess::new(DeploymentListResponse { deployments }))
}

// ============================================================================
// Credential Handlers
// ============================================================================

async fn get_keys(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<ApiSuccess<KeysResponse>, HandlerError> {
    let mut providers = BTreeMap::new();
    for provider in Provider::ALL {
        let token = state.vault.get_token(&user_id, provider).await?;
        providers.insert(
            provider.as_str(),
            KeyStatus {
                is_set: token.is_some(),
                masked: token.map(|t| t.masked()),
            },
        );
    }
    Ok(ApiSuccess::new(KeysResponse { providers }))
}

#[instrument(skip(state, body), fields(user_id = %user_id))]
async fn set_key(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    body: Result<Json<SetKeyRequest>, JsonRejection>,
) -> Result<ApiSuccess<KeyStatus>, HandlerError> {
    let Json(request) = body.map_err(|_| HandlerError::bad_request("Invalid JSON"))?;
    let provider = Provider::from_str(&request.provider)?;

    let key = request.key.trim();
    if key.is_empty() {
        return Err(HandlerError::bad_request("Key is required"));
    }

    let token = SecretToken::new(key);
    let masked = token.masked();
    state.vault.set_token(&user_id, provider, token).await?;
    info!(provider = %provider, "Stored credential");

    Ok(ApiSuccess::new(KeyStatus {
        is_set: true,
        masked: Some(masked),
    }))
}

#[instrument(skip(state), fields(user_id = %user_id))]
async fn clear_key(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(provider): Path<String>,
) -> Result<ApiSuccess<KeyStatus>, HandlerError> {
    let provider = Provider::from_str(&provider)?;
    state.vault.clear_token(&user_id, provider).await?;
    info!(provider = %provider, "Cleared credential");

    Ok(ApiSuccess::new(KeyStatus {
        is_set: false,
        masked: None,
    }))
}

// ============================================================================
// Health Check Handlers
// ============================================================================

/// Liveness check
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check: the audit store must be reachable
#[instrument(skip(state))]
async fn handle_readiness_check(State(state): State<AppState>) -> Response {
    let mut checks = BTreeMap::new();
    let ready = match state.logs.health_check().await {
        Ok(()) => {
            checks.insert("storage".to_string(), "ok".to_string());
            true
        }
        Err(e) => {
            warn!(error = %e, "Storage readiness check failed");
            checks.insert("storage".to_string(), e.to_string());
            false
        }
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = ReadinessResponse {
        ready,
        timestamp: chrono::Utc::now().to_rfc3339(),
        checks,
    };
    (status, Json(body)).into_response()
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.render().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// Extracts or generates an `x-correlation-id`, records it on the request
/// span and in request extensions, and echoes it on the response.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri().path(),
    correlation_id
))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());
    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    let status = response.status();
    if status.is_server_error() {
        error!(status = %status, duration_ms = %duration.as_millis(), "Request completed with server error");
    } else if status.is_client_error() {
        warn!(status = %status, duration_ms = %duration.as_millis(), "Request completed with client error");
    } else {
        info!(status = %status, duration_ms = %duration.as_millis(), "Request completed successfully");
    }

    response
}

/// Metrics collection middleware
async fn metrics_middleware(
    State(metrics): State<Arc<ServiceMetrics>>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().to_string();
    let timer = metrics.http_request_duration.start_timer();

    let response = next.run(request).await;

    timer.observe_duration();
    metrics
        .http_requests_total
        .with_label_values(&[method.as_str(), response.status().as_str()])
        .inc();

    response
}
