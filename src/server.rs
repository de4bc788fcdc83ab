//! HTTP front end: `POST /execute` and `GET /health`.
//!
//! This layer only checks the request body and the script's size and shape;
//! everything else is the sandbox's job.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::{Result, SandboxError};
use crate::sandbox::executor::PythonSandbox;
use crate::sandbox::isolation::IsolationMode;
use crate::sandbox::limits::ScriptLimits;
use crate::sandbox::resolver::ExecutionResponse;

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Script checks applied before execution
    pub limits: ScriptLimits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_body_size: 1024 * 1024, // 1MB
            limits: ScriptLimits::default(),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    pub fn with_max_script_chars(mut self, chars: usize) -> Self {
        self.limits = ScriptLimits::new(chars);
        self
    }
}

/// Shared state for the handlers.
#[derive(Clone)]
pub struct AppState {
    pub sandbox: Arc<PythonSandbox>,
    pub limits: ScriptLimits,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub isolation: IsolationMode,
    pub version: &'static str,
}

/// Build the router with all routes and middleware.
pub fn build_router(sandbox: Arc<PythonSandbox>, config: &ServerConfig) -> Router {
    let state = AppState {
        sandbox,
        limits: config.limits,
    };

    Router::new()
        .route("/execute", post(execute_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn execute_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<ExecutionResponse>) {
    let script = match extract_script(&body).and_then(|script| {
        state.limits.validate(&script)?;
        Ok(script)
    }) {
        Ok(script) => script,
        Err(err) => {
            info!(error = %err, "rejected execute request");
            return (StatusCode::BAD_REQUEST, Json(ExecutionResponse::from_error(&err)));
        }
    };

    let response = state.sandbox.run(&script).await;
    let status = if response.is_success() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(response))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        isolation: state.sandbox.mode(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Pull the `script` string out of a `{"script": "..."}` body.
pub fn extract_script(body: &[u8]) -> Result<String> {
    let invalid = |msg: &str| SandboxError::InvalidInput(msg.to_string());

    let data: Value =
        serde_json::from_slice(body).map_err(|_| invalid("No JSON data provided"))?;

    let fields = match data {
        Value::Null => return Err(invalid("No JSON data provided")),
        Value::Object(fields) if fields.is_empty() => {
            return Err(invalid("No JSON data provided"))
        }
        Value::Object(fields) => fields,
        _ => return Err(invalid("Missing 'script' field")),
    };

    match fields.get("script") {
        None => Err(invalid("Missing 'script' field")),
        Some(Value::String(script)) => Ok(script.clone()),
        Some(_) => Err(invalid("Script must be a string")),
    }
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve_with_shutdown<F>(
    sandbox: Arc<PythonSandbox>,
    config: ServerConfig,
    shutdown: F,
) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let router = build_router(Arc::clone(&sandbox), &config);
    let listener = TcpListener::bind(config.bind_addr).await.map_err(|e| {
        SandboxError::Config(format!("failed to bind to {}: {}", config.bind_addr, e))
    })?;

    info!(
        addr = %config.bind_addr,
        isolation = %sandbox.mode(),
        "sandbox server listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("sandbox server shut down gracefully");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
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
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
