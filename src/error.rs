//! # Error Handling
//!
//! This module defines the HTTP-facing error type and how lower-level errors
//! (audio encoding, provider calls, configuration) are converted into it.
//!
//! ## Key Rust Concepts for Error Handling:
//!
//! ### Enums for Error Types
//! - **Variants**: Each enum variant represents a different kind of failure
//! - **Data**: Each variant carries the message shown to the API client
//! - **Pattern matching**: `match` maps each variant to an HTTP status
//!
//! ### Traits for Error Conversion
//! - **From trait**: lets `?` turn a `WavError` or `ProviderError` into an `AppError`
//! - **ResponseError trait**: renders an `AppError` as a JSON HTTP response
//! - **Display trait**: defines how errors are formatted as strings

use crate::audio::WavError;
use crate::providers::ProviderError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
///
/// ## Error Categories:
/// - **Internal**: Server-side problems (500)
/// - **BadRequest**: Client sent malformed data (400)
/// - **NotFound**: Requested resource doesn't exist (404)
/// - **ConfigError**: Missing API key or bad configuration (500)
/// - **ValidationError**: Data validation failed (400)
/// - **Upstream**: The speech or text provider rejected the call (provider status or 502)
/// - **ServiceUnavailable**: Too many provider calls in flight (503)
///
/// ## Usage Example:
/// ```rust,ignore
/// return Err(AppError::BadRequest("Text is required and cannot be empty".to_string()));
/// ```
#[derive(Debug)]
pub enum AppError {
    /// Internal server errors
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Requested resource was not found
    NotFound(String),

    /// Configuration file or environment variable problems
    ConfigError(String),

    /// User input failed validation rules
    ValidationError(String),

    /// An external provider failed; `status` is the status to answer with
    Upstream { status: u16, message: String },

    /// Request refused because the server is at capacity
    ServiceUnavailable(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::Upstream { status, message } => write!(f, "Upstream error ({}): {}", status, message),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl AppError {
    /// Machine-readable error type used in the JSON body.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::ConfigError(_) => "config_error",
            AppError::ValidationError(_) => "validation_error",
            AppError::Upstream { .. } => "upstream_error",
            AppError::ServiceUnavailable(_) => "service_unavailable",
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::Internal(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::ConfigError(msg)
            | AppError::ValidationError(msg)
            | AppError::ServiceUnavailable(msg) => msg,
            AppError::Upstream { message, .. } => message,
        }
    }
}

/// Converts errors into HTTP responses.
///
/// ## JSON Response Format:
/// ```json
/// {
///   "error": {
///     "type": "validation_error",
///     "message": "Unsupported file format. Supported formats: flac, mp3, ...",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Internal(_) | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            // Only propagate real error statuses from the provider
            AppError::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "type": self.error_type(),
                "message": self.message(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

/// `anyhow` errors are unexpected by definition and become 500s.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// JSON parsing errors are almost always the client's fault.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Encoder input problems come from the client's recording.
impl From<WavError> for AppError {
    fn from(err: WavError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Provider failures.
///
/// ## Mapping:
/// - Missing key → `ConfigError` (500), the operator has to fix it
/// - Network failure / unreadable response → `Upstream` with 502
/// - Provider error status → `Upstream` with that status
impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(msg) => AppError::ConfigError(msg),
            ProviderError::Upstream { status, message } => AppError::Upstream {
                status,
                message: format!("Provider error: {}", message),
            },
            ProviderError::Network(_) | ProviderError::InvalidResponse(_) => AppError::Upstream {
                status: StatusCode::BAD_GATEWAY.as_u16(),
                message: err.to_string(),
            },
        }
    }
}

/// Type alias for Results that use our custom error type.
pub type AppResult<T> = Result<T, AppError>;
