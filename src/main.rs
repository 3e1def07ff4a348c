//! # SenseVoice API - Main Application Entry Point
//!
//! HTTP backend for a Bengali/English voice playground. It sets up an Actix-web
//! server with the following features:
//!
//! - **Text-to-speech** through an OpenAI-compatible speech API
//! - **Speech-to-text** for uploaded files and for browser recordings, which are
//!   encoded to 16-bit PCM WAV here before upload
//! - **Text enhancement** (clean-up, summaries, language detection) through Gemini
//! - **History** of syntheses and transcriptions, kept in memory
//! - **Health, metrics and runtime configuration** endpoints
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: The entire application is asynchronous
//! - **modules**: Code is organized into separate modules (mod statements)
//! - **Result<T, E>**: Error handling using Rust's Result type
//! - **Arc & trait objects**: Provider clients are shared as `Arc<dyn Trait>`
//!
//! ## Application Architecture:
//! - **audio**: PCM conversion, WAV encoding and inspection, upload checks
//! - **providers**: HTTP clients for the speech and text-generation APIs
//! - **enhance**: Prompts and text statistics
//! - **history**: Bounded in-memory history store
//! - **config / state / error**: Configuration, shared state, HTTP errors
//! - **middleware / handlers / health**: The HTTP surface

// Module declarations
mod audio;       // Audio encoding (audio/ directory)
mod config;      // Configuration management (config.rs)
mod enhance;     // Text enhancement prompts (enhance.rs)
mod error;       // Error handling types (error.rs)
mod handlers;    // HTTP request handlers (handlers/ directory)
mod health;      // Health check endpoints (health.rs)
mod history;     // History store (history.rs)
mod middleware;  // Custom middleware (middleware/ directory)
mod providers;   // External API clients (providers/ directory)
mod state;       // Application state management (state.rs)

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use config::AppConfig;
use providers::{GeminiTextClient, OpenAiSpeechClient};
use state::AppState;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from `.env`, `config.toml` and environment variables
/// 2. **Sets up logging** for debugging and monitoring
/// 3. **Builds the provider clients** and the shared application state
/// 4. **Configures the HTTP server** with middleware and routes
/// 5. **Handles graceful shutdown** on SIGINT / SIGTERM
#[actix_web::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load().context("Failed to load configuration")?;
    config.validate()?;

    info!("Starting SenseVoice API v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let speech = OpenAiSpeechClient::from_config(&config)?;
    let text = GeminiTextClient::from_config(&config)?;
    log_provider_status(&config);

    let app_state = AppState::new(config.clone(), Arc::new(speech), Arc::new(text));
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let json_limit = config.json_limit_bytes();
    let allowed_origins = config.server.allowed_origins.clone();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(handlers::json_config(json_limit))
            .app_data(web::PayloadConfig::new(json_limit))
            // Middleware executes in reverse order for responses
            .wrap(build_cors(&allowed_origins))
            .wrap(Logger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .configure(handlers::configure_routes)
    })
    .disable_signals()
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Whichever finishes first: the server itself (usually an error) or a signal
    tokio::select! {
        result = server_task => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system for the application.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "sensevoice_api=trace")
/// - If not set, defaults to "sensevoice_api=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensevoice_api=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

fn log_provider_status(config: &AppConfig) {
    info!("TTS voices: female, male; languages: bangla, english, mix");
    info!(
        "ASR formats: {}",
        audio::ALLOWED_UPLOAD_EXTENSIONS.join(", ")
    );

    if config.speech_api_key().is_some() {
        info!("Speech provider key: configured");
    } else {
        warn!("Speech provider key: NOT CONFIGURED - set OPENAI_API_KEY in .env");
    }

    if config.text_api_key().is_some() {
        info!("Text generation key: configured");
    } else {
        warn!("Text generation key: NOT CONFIGURED - set GEMINI_API_KEY in .env");
    }
}

/// CORS for the configured origins; an empty list allows any origin.
fn build_cors(allowed_origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .expose_headers(vec!["content-disposition", middleware::logging::REQUEST_ID_HEADER])
        .max_age(3600);

    if allowed_origins.is_empty() {
        return cors.allow_any_origin();
    }

    allowed_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
        .supports_credentials()
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
///
/// If a handler cannot be installed the error is logged and that signal is
/// simply never observed; the other one still works.
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
