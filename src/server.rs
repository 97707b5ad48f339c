use std::sync::Arc;
use std::time::Duration;
use axum::{
    error_handling::HandleErrorLayer,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::{HeaderValue, Method},
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::{timeout::{error::Elapsed, TimeoutLayer}, BoxError, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::{Config, SecurityConfig},
    errors::{AppError, AppResult},
    middleware::request_id_middleware,
    payments,
    providers::{GenerationRequest, ProviderRegistry, http, validate_job_id},
};

/// 应用程序状态 - 在所有请求处理器之间共享
///
/// 包含请求处理器所需的所有共享资源，
/// 包括配置、HTTP客户端和提供商注册表
#[derive(Clone)]
pub struct AppState {
    /// 应用程序配置（只读共享）
    pub config: Arc<Config>,
    /// HTTP客户端，启动时创建并注入，所有出站请求共用
    pub http_client: Client,
    /// 提供商注册表，只读，无需加锁
    pub registry: Arc<ProviderRegistry>,
}

impl AppState {
    /// Create new application state from configuration
    pub fn new(config: Config) -> AppResult<Self> {
        // Per-provider timeouts are set on each request
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(config, http_client))
    }

    /// Build state around an existing client
    pub fn with_client(config: Config, http_client: Client) -> Self {
        let registry = Arc::new(ProviderRegistry::new(&config, http_client.clone()));
        Self {
            config: Arc::new(config),
            http_client,
            registry,
        }
    }

    /// Replace the provider registry, used to register fake providers
    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }
}

/// Disabled CORS yields a layer that allows no origins
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.cors_enabled {
        return CorsLayer::new();
    }

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let origins: Vec<HeaderValue> = security
        .allowed_origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

/// Create the main application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.server.max_request_size_bytes;
    let timeout_secs = state.config.server.request_timeout_seconds;
    let cors = cors_layer(&state.config.security);

    Router::new()
        // Generation endpoints
        .route("/api/images/{provider}", post(generate_images_handler))
        .route("/api/jobs/{provider}", post(create_job_handler))
        .route("/api/jobs/{provider}/{job_id}", get(job_status_handler))
        .route("/api/providers", get(list_providers_handler))
        // Payments
        .route("/api/payments/checkout", post(payments::checkout_handler))
        .route("/api/payments/webhook", post(payments::webhook_handler))
        // Health check
        .route("/health", get(health_handler))
        // Add shared state
        .with_state(state)
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_id_middleware))
                .layer(cors)
                .layer(HandleErrorLayer::new(move |err: BoxError| async move {
                    middleware_error(err, timeout_secs)
                }))
                .layer(TimeoutLayer::new(Duration::from_secs(timeout_secs)))
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}

/// Errors raised by the middleware stack rather than a handler
fn middleware_error(err: BoxError, timeout_secs: u64) -> AppError {
    if err.is::<Elapsed>() {
        tracing::warn!(timeout_secs, "Request exceeded the server timeout");
        AppError::provider_error(504, format!("Request timed out after {}s", timeout_secs))
    } else {
        AppError::internal(format!("Unhandled middleware error: {}", err))
    }
}

/// Start the HTTP server
///
/// Tracing must already be initialized by the caller.
pub async fn start_server(config: Config) -> AppResult<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create application state
    let app_state = AppState::new(config)?;

    // Create router
    let app = create_app(app_state);

    // Create listener
    let listener = TcpListener::bind(&addr).await
        .map_err(|e| AppError::ConfigError(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("Creative proxy server starting on {}", addr);
    tracing::info!("Available endpoints:");
    tracing::info!("  POST /api/images/{{provider}} - Synchronous image generation");
    tracing::info!("  POST /api/jobs/{{provider}} - Create a generation job");
    tracing::info!("  GET  /api/jobs/{{provider}}/{{job_id}} - Check a generation job");
    tracing::info!("  GET  /api/providers - List configured providers");
    tracing::info!("  POST /api/payments/checkout - Create a checkout session");
    tracing::info!("  POST /api/payments/webhook - Stripe webhook");
    tracing::info!("  GET  /health - System health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::InternalServerError(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn parse_body(payload: Result<Json<GenerationRequest>, JsonRejection>) -> AppResult<GenerationRequest> {
    payload
        .map(|Json(request)| request)
        .map_err(|e| AppError::bad_request(e.body_text()))
}

// Request Handlers

/// Handle synchronous image generation
async fn generate_images_handler(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let provider = state.registry.image_provider(&provider_id)?;
    let request = parse_body(payload)?;

    let batch = provider.generate(&request).await?;

    tracing::info!(provider = %provider_id, images = batch.images.len(), "Image generation completed");
    Ok(Json(json!({
        "success": true,
        "images": batch.images,
        "model": batch.model,
    })))
}

/// Handle job creation
async fn create_job_handler(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let provider = state.registry.job_provider(&provider_id)?;
    let request = parse_body(payload)?;

    let ticket = provider.submit(&request).await?;
    if ticket.job_id.trim().is_empty() {
        return Err(http::unrecognized(provider.id(), json!({ "id": ticket.job_id })));
    }

    tracing::info!(provider = %provider_id, job_id = %ticket.job_id, "Job submitted");
    let mut body = json!({
        "success": true,
        "jobId": ticket.job_id,
        "status": "queued",
        "model": ticket.model,
    });
    if let Some(polling_url) = ticket.polling_url {
        body["pollingUrl"] = Value::String(polling_url);
    }
    Ok(Json(body))
}

/// Handle a single job status check
async fn job_status_handler(
    State(state): State<AppState>,
    Path((provider_id, job_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let provider = state.registry.job_provider(&provider_id)?;
    let job_id = validate_job_id(&job_id)?;

    let job = provider.status(job_id).await?;

    tracing::debug!(provider = %provider_id, job_id = %job.id, status = job.status.as_str(), "Job status checked");
    let mut body = json!({
        "success": true,
        "jobId": job.id,
        "status": job.status,
    });
    if let Some(url) = job.result_url() {
        body["resultUrl"] = Value::String(url.to_string());
    }
    if let Some(error) = job.error {
        body["error"] = Value::String(error);
    }
    Ok(Json(body))
}

/// Handle provider listing
async fn list_providers_handler(
    State(state): State<AppState>,
) -> Json<Value> {
    let providers = state.registry.describe();
    Json(json!({
        "success": true,
        "providers": providers,
    }))
}

/// Handle system health check
async fn health_handler(
    State(state): State<AppState>,
) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "creative-proxy",
        "version": env!("CARGO_PKG_VERSION"),
        "providers_configured": state.registry.len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
