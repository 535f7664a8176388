//! Server initialization and routing
//!
//! Builds the axum router over [`ServerState`], wires the middleware stack
//! and runs the listener with graceful shutdown.

use crate::config::ServerConfig;
use crate::middleware::{request_id, RequestSpan};
use crate::routes::{embed, health, not_found, transcribe};
use crate::state::ServerState;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use embedding_worker::Settings;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;

/// Build the router with all routes and middleware.
///
/// Layers run outermost-last: request id, tracing (one span per request with
/// route, backend and id), timeout, body limit, then the handler.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(RequestSpan::new(&state.settings.embedding_backend))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/v1/embed/video", post(embed::embed_video))
        .route("/v1/embed/text", post(embed::embed_text))
        .route("/v1/transcribe/video", post(transcribe::transcribe_video))
        .route("/v1/transcribe/audio", post(transcribe::transcribe_audio))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.config.max_body_size()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.timeout(),
        ))
        .layer(trace)
        .layer(from_fn(request_id))
        .with_state(state)
}

/// Start the embedding worker HTTP server
///
/// Blocks until SIGTERM or Ctrl+C, then drains in-flight requests.
pub async fn start_server(config: ServerConfig, settings: Settings) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json()
        .init();

    let addr: SocketAddr = config.socket_addr()?;

    tracing::info!(
        %addr,
        backend = %settings.embedding_backend,
        dims = settings.embedding_dims,
        uploads_dir = %settings.uploads_dir.display(),
        "starting embedding worker"
    );
    tracing::info!(
        timeout_secs = config.request_timeout_secs,
        max_body_mb = config.max_body_size_mb,
        transcribe_enabled = settings.transcribe_enabled,
        "limits"
    );

    let state = Arc::new(ServerState::new(config, settings));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
