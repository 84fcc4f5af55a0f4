//! Telepipe Ingestion Node
//!
//! This crate provides the HTTP server in front of the Telepipe pipeline
//! engine. It accepts agent payloads for logs, metrics and traces, runs them
//! through the configured pipeline and delivers the results to the sinks.
//!
//! # Architecture
//!
//! The server is built on Axum and Tokio, providing:
//! - Agent-compatible intake endpoints, one per datatype
//! - A health endpoint reporting the live pipeline version
//! - An admin endpoint (and `SIGHUP` on unix) to reload the pipeline
//!
//! # Example
//!
//! ```no_run
//! use api::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
mod routes;
mod state;

pub use config::Config;
pub use state::AppState;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body, before decompression.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Runs the Telepipe ingestion node.
///
/// This function initializes the server with configuration from environment variables
/// and starts listening for incoming connections. It handles graceful shutdown on
/// SIGTERM/SIGINT signals.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The pipeline configuration fails to build
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server() -> Result<()> {
    let config = Config::from_env()?;
    run_server_with_config(config).await
}

/// Runs the Telepipe ingestion node with the provided configuration.
///
/// This is useful for testing or when you want to provide configuration programmatically.
///
/// # Errors
///
/// Returns an error if:
/// - The pipeline configuration fails to build
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server_with_config(config: Config) -> Result<()> {
    let addr = config.socket_addr()?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        pipeline = ?config.pipeline_config,
        acknowledgements = config.acknowledgements,
        "Telepipe ingestion node starting"
    );

    let state = AppState::from_config(config).context("Failed to build pipeline")?;
    tracing::info!(
        transforms = state.engine().snapshot().chain().len(),
        sinks = state.engine().snapshot().sinks().len(),
        "Pipeline built"
    );

    #[cfg(unix)]
    tokio::spawn(reload_on_hangup(state.clone()));

    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes(state.clone()))
        .merge(routes::ingest_routes(state.clone()))
        .merge(routes::admin_routes(state))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}

/// Reloads the pipeline every time the process receives `SIGHUP`.
#[cfg(unix)]
async fn reload_on_hangup(state: AppState) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGHUP handler, reload via /admin/reload only");
            return;
        }
    };

    while hangup.recv().await.is_some() {
        tracing::info!("Received SIGHUP, reloading pipeline");
        if let Err(e) = state.reload() {
            tracing::error!(error = %e, "Pipeline reload failed, keeping current pipeline");
        }
    }
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app(config: Config) -> Router {
        create_router(AppState::from_config(config).unwrap())
    }

    async fn post_status(app: Router, uri: &str) -> StatusCode {
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::from("[]"))
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn test_health_endpoint_returns_json() {
        let response = app(Config::default())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok());

        assert_eq!(response.status(), StatusCode::OK);
        assert!(content_type.is_some_and(|ct| ct.contains("application/json")));
    }

    #[tokio::test]
    async fn test_disabled_intake_is_not_mounted() {
        let config = Config {
            disable_logs: true,
            ..Config::default()
        };

        assert_eq!(
            post_status(app(config.clone()), "/api/v2/logs").await,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            post_status(app(config), "/api/v1/series").await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let response = app(Config::default())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v2/logs")
                    .header("content-length", MAX_BODY_BYTES + 1)
                    .body(Body::from(vec![b' '; MAX_BODY_BYTES + 1]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_config_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8282);
    }
}
