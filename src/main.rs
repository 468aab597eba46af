//! Vera - airport and travel concierge chat service
//!
//! Slot-filling dialog (destination, then origin) with canned answers and a
//! remote completion fallback. Clients drive conversations over HTTP and
//! follow them over Server-Sent Events.

mod api;
mod catalog;
mod completion;
mod config;
mod playback;
mod resolver;
mod runtime;
mod sequencer;
mod state_machine;
mod timeline;

use api::{create_router, AppState};
use completion::{CompletionService, GeminiCompletion, LoggingCompletion};
use config::Config;
use runtime::RuntimeManager;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vera=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env();

    if config.completion.api_key.is_none() || config.completion.cookie.is_none() {
        tracing::warn!(
            "VERA_API_KEY or VERA_COOKIE not set; free-form questions will likely fail"
        );
    }

    let gemini = GeminiCompletion::new(&config.completion)?;
    let completion: Arc<dyn CompletionService> =
        Arc::new(LoggingCompletion::new(Arc::new(gemini)));
    tracing::info!(
        endpoint = %completion.endpoint(),
        timeout_secs = config.completion.timeout.as_secs(),
        policy = ?config.overlap_policy,
        "Completion service initialized"
    );

    let port = config.port;
    let runtime = Arc::new(RuntimeManager::new(config, completion));
    let state = AppState::new(runtime.clone());

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Vera server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    runtime.close_all().await;
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
