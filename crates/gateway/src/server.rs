//! Axum-based HTTP server for the gateway.

use axum::{
    extract::{Json, Query, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use vantage_audit::{AuditSender, USER_ID_HEADER};
use vantage_core::{config::ServerConfig, traits::InteractionStore, Error, Result};
use vantage_governance::GovernanceFilter;

use crate::pipeline::intercept;
use crate::proxy::{proxy_handler, Upstream};

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Origins allowed by CORS.
    pub allowed_origins: Vec<String>,
    /// Largest request body the pipeline will buffer.
    pub body_limit_bytes: usize,
    /// Enable request tracing.
    pub enable_tracing: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for GatewayConfig {
    fn from(server: &ServerConfig) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            allowed_origins: server.allowed_origins.clone(),
            body_limit_bytes: server.body_limit_bytes,
            enable_tracing: true,
        }
    }
}

/// Shared application state.
pub struct AppState {
    /// Interaction log, read by the listing endpoint.
    pub store: Arc<dyn InteractionStore>,
    /// Synchronous governance filter.
    pub filter: Arc<GovernanceFilter>,
    /// Producer side of the audit queue.
    pub audit: AuditSender,
    /// Where admitted requests go.
    pub upstream: Arc<dyn Upstream>,
    /// Request body limit in bytes.
    pub body_limit: usize,
}

/// Gateway server.
pub struct GatewayServer {
    config: GatewayConfig,
    state: Arc<AppState>,
    metrics_handle: Option<PrometheusHandle>,
}

impl GatewayServer {
    /// Create a new gateway server.
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn InteractionStore>,
        filter: Arc<GovernanceFilter>,
        audit: AuditSender,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        let body_limit = config.body_limit_bytes;
        Self {
            config,
            state: Arc::new(AppState {
                store,
                filter,
                audit,
                upstream,
                body_limit,
            }),
            metrics_handle: None,
        }
    }

    /// Set metrics handle.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Build the Axum router.
    pub fn build_router(&self) -> Router {
        let governed = Router::new()
            .route("/v1/*path", any(proxy_handler))
            .route_layer(middleware::from_fn_with_state(self.state.clone(), intercept));

        let mut router = Router::new()
            .route("/", get(status_handler))
            .route("/health", get(health_handler))
            .route("/api/logs", get(list_logs_handler))
            .merge(governed)
            .with_state(self.state.clone());

        if let Some(handle) = &self.metrics_handle {
            let handle = handle.clone();
            router = router.route("/metrics", get(move || async move { handle.render() }));
        }

        router = router.layer(self.cors_layer());

        if self.config.enable_tracing {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .config
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                header::ACCEPT,
                header::CONTENT_TYPE,
                HeaderName::from_static(USER_ID_HEADER),
            ])
            .allow_credentials(true)
    }

    /// Run the server until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::gateway(format!("Failed to bind: {}", e)))?;

        tracing::info!(addr = %addr, "Gateway server starting");

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::gateway(format!("Server error: {}", e)))?;

        tracing::info!("Gateway server stopped");
        Ok(())
    }
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Service status.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub node: &'static str,
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status.
    pub status: String,
    /// Version.
    pub version: String,
}

/// Query of the log listing endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    /// Kept as text so that a malformed value falls back to the default.
    pub limit: Option<String>,
}

impl LogsQuery {
    /// Requested limit; zero when absent or not a number.
    pub fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0)
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn status_handler() -> impl IntoResponse {
    Json(StatusResponse {
        status: format!("Vantage v{} is operational", env!("CARGO_PKG_VERSION")),
        node: "Vantage-Core-01",
    })
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Most recent interactions, newest first.
async fn list_logs_handler(State(state): State<Arc<AppState>>, Query(query): Query<LogsQuery>) -> Response {
    match state.store.list(query.limit()).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list interactions");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
