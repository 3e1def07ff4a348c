//! # Application State Management
//!
//! This module manages shared state that needs to be accessed by multiple HTTP request handlers
//! simultaneously: configuration, request metrics, the history store and the provider clients.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: Allows multiple parts of the program to safely share ownership of data
//! - **Why needed**: actix-web runs several workers, each holding a clone of `AppState`
//!
//! ### RwLock (Reader-Writer Lock)
//! - **Purpose**: Allows multiple readers OR one writer at a time (but not both)
//! - **Poisoning**: if a thread panics while holding the lock, the data is still usable;
//!   we recover it with `into_inner()` instead of panicking every later request
//!
//! ### Trait objects (`Arc<dyn SpeechProvider>`)
//! - **Purpose**: handlers only know the provider traits, so production code gets the
//!   HTTP clients and tests get in-memory fakes
//!
//! ### RAII guards
//! - [`TranscriptionSlot`] decrements the in-flight counter in `Drop`, so the slot is
//!   released on every exit path, including `?` returns and client disconnects

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::history::HistoryStore;
use crate::providers::{SpeechProvider, TextGenerator};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

/// The main application state that's shared across all HTTP request handlers.
///
/// ## Thread Safety Pattern:
/// Mutable data sits behind `Arc<RwLock<T>>`; the history store and provider
/// clients do their own locking (or need none) and are shared through `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Request counters, updated by the metrics middleware
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,

    /// Past syntheses and transcriptions
    pub history: Arc<HistoryStore>,

    /// Text-to-speech and transcription backend
    pub speech: Arc<dyn SpeechProvider>,

    /// Generative text backend used for enhancement
    pub text: Arc<dyn TextGenerator>,
}

/// Performance metrics collected across all HTTP requests.
///
/// ## Fields:
/// - **request_count**: Total requests processed (for load monitoring)
/// - **error_count**: Total 4xx/5xx responses (for reliability monitoring)
/// - **active_transcriptions**: Provider calls in flight right now
/// - **endpoint_metrics**: Per-route statistics, keyed by "METHOD /route/{pattern}"
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,
    pub active_transcriptions: usize,
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Detailed performance metrics for a specific API endpoint.
///
/// ## Performance calculations:
/// - **Average response time**: total_duration_ms / request_count
/// - **Error rate**: error_count / request_count
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

/// A claimed slot for one outbound provider call.
///
/// Holding it counts as one active transcription; dropping it gives the slot back.
#[derive(Debug)]
pub struct TranscriptionSlot {
    metrics: Arc<RwLock<AppMetrics>>,
}

impl Drop for TranscriptionSlot {
    fn drop(&mut self) {
        let mut metrics = self.metrics.write().unwrap_or_else(|e| e.into_inner());
        metrics.active_transcriptions = metrics.active_transcriptions.saturating_sub(1);
    }
}

impl AppState {
    /// Create a new AppState with the given configuration and provider clients.
    ///
    /// ## What this does:
    /// 1. Sizes the history store from `history.max_entries`
    /// 2. Wraps the config in Arc<RwLock<>> for thread-safe sharing
    /// 3. Creates empty metrics and records the start time
    pub fn new(config: AppConfig, speech: Arc<dyn SpeechProvider>, text: Arc<dyn TextGenerator>) -> Self {
        let history = Arc::new(HistoryStore::new(config.history.max_entries));
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
            history,
            speech,
            text,
        }
    }

    fn read_config(&self) -> RwLockReadGuard<'_, AppConfig> {
        self.config.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_metrics(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Get a copy of the current configuration.
    ///
    /// ## Why clone:
    /// Cloning releases the lock immediately, so other threads aren't blocked
    /// while a handler awaits a provider.
    pub fn get_config(&self) -> AppConfig {
        self.read_config().clone()
    }

    /// Replace the configuration after validating it.
    ///
    /// A new history cap takes effect immediately.
    pub fn update_config(&self, new_config: AppConfig) -> AppResult<()> {
        new_config
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        self.history.set_capacity(new_config.history.max_entries);
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = new_config;
        Ok(())
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        self.write_metrics().request_count += 1;
    }

    /// Increment the total error counter (called for every 4xx/5xx response).
    pub fn increment_error_count(&self) {
        self.write_metrics().error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    ///
    /// ## HashMap operations:
    /// The first time we see an endpoint, `.entry().or_default()` creates a zeroed
    /// metric; later requests update it in place.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.write_metrics();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Claim a transcription slot, or fail with 503 when all are taken.
    ///
    /// The check and the increment happen under one write lock, so two requests
    /// can never both take the last slot.
    pub fn try_acquire_transcription_slot(&self) -> AppResult<TranscriptionSlot> {
        let limit = self.read_config().performance.max_concurrent_transcriptions;

        let mut metrics = self.write_metrics();
        if metrics.active_transcriptions >= limit {
            return Err(AppError::ServiceUnavailable(format!(
                "Too many concurrent requests ({} in progress). Please try again shortly.",
                metrics.active_transcriptions
            )));
        }
        metrics.active_transcriptions += 1;

        Ok(TranscriptionSlot {
            metrics: Arc::clone(&self.metrics),
        })
    }

    /// Get a snapshot of current metrics (used for the health and metrics endpoints).
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl AppMetrics {
    /// Errors divided by requests, 0.0 before the first request.
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

impl EndpointMetric {
    /// Calculate the average response time for this endpoint.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Calculate the error rate for this endpoint (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
