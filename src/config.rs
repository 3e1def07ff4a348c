//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **impl blocks**: Add methods to structs
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Provider keys and deployment variables (OPENAI_API_KEY, GEMINI_API_KEY, HOST, PORT)
//! 2. Environment variables (APP_SERVER__PORT, APP_AUDIO__MAX_UPLOAD_MB, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)
//!
//! ## Secrets:
//! API keys live in this struct but are never returned by the HTTP API.
//! Use [`AppConfig::redacted`] whenever configuration leaves the process.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Placeholder values shipped in `.env` templates. They count as "not configured".
const PLACEHOLDER_KEYS: &[&str] = &["your_openai_api_key_here", "your_gemini_api_key_here"];

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Breaking configuration into logical groups (server, providers, audio limits)
/// keeps each concern readable and lets partial updates touch one group at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub speech: SpeechProviderConfig,
    pub text: TextProviderConfig,
    pub audio: AudioLimitsConfig,
    pub performance: PerformanceConfig,
    pub history: HistoryConfig,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `host`: IP address or hostname to bind the server to
/// - `port`: TCP port number to listen on (1-65535)
/// - `allowed_origins`: CORS origins; an empty list allows any origin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

/// External speech provider (text-to-speech and transcription).
///
/// The provider speaks the OpenAI audio API: `POST {base_url}/audio/speech`
/// and `POST {base_url}/audio/transcriptions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub tts_model: String,
    pub asr_model: String,
    pub timeout_secs: u64,
}

/// External text-generation API used for enhancement (Gemini `generateContent`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// Limits on incoming audio.
///
/// ## Fields:
/// - `max_upload_mb`: largest accepted file upload (the provider's own limit is 25 MB)
/// - `max_recording_seconds`: longest recording accepted by the record/encode endpoints
/// - `json_limit_mb`: body limit for JSON and raw sample uploads (float arrays are large)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioLimitsConfig {
    pub max_upload_mb: usize,
    pub max_recording_seconds: u32,
    pub json_limit_mb: usize,
}

/// Performance tuning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Outbound provider calls allowed in flight at once; further requests get 503
    pub max_concurrent_transcriptions: usize,
}

/// History store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Oldest entries are dropped once this many are stored
    pub max_entries: usize,
}

/// Provides default configuration values.
///
/// Default values ensure the application can start even if no configuration file exists.
/// Provider keys default to `None`; the speech endpoints report a configuration error
/// until a key is supplied.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
                allowed_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:8000".to_string(),
                ],
            },
            speech: SpeechProviderConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                tts_model: "gpt-4o-mini-tts".to_string(),
                asr_model: "gpt-4o-transcribe".to_string(),
                timeout_secs: 120,
            },
            text: TextProviderConfig {
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-2.5-flash".to_string(),
                timeout_secs: 60,
            },
            audio: AudioLimitsConfig {
                max_upload_mb: 25,
                max_recording_seconds: 600,
                json_limit_mb: 128,
            },
            performance: PerformanceConfig {
                max_concurrent_transcriptions: 8,
            },
            history: HistoryConfig { max_entries: 500 },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle provider keys and deployment variables that don't follow the prefix
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__HOST=0.0.0.0`: Override server host
    /// - `APP_AUDIO__MAX_UPLOAD_MB=50`: Override upload limit
    /// - `OPENAI_API_KEY=sk-...`: Speech provider key
    /// - `GEMINI_API_KEY=...`: Text enhancement key
    /// - `HOST` / `PORT`: Special cases for deployment platforms
    ///
    /// Nested keys use a double underscore because several keys contain single
    /// underscores themselves (`max_upload_mb`).
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(key) = env::var("OPENAI_API_KEY") {
            settings = settings.set_override("speech.api_key", key)?;
        }

        if let Some(key) = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("NEXT_PUBLIC_GEMINI_API_KEY"))
            .ok()
        {
            settings = settings.set_override("text.api_key", key)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - Provider base URLs are present and timeouts are non-zero
    /// - Every size / count limit is greater than 0
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.speech.base_url.trim().is_empty() {
            return Err(anyhow::anyhow!("Speech provider base URL cannot be empty"));
        }

        if self.text.base_url.trim().is_empty() {
            return Err(anyhow::anyhow!("Text provider base URL cannot be empty"));
        }

        if self.speech.timeout_secs == 0 || self.text.timeout_secs == 0 {
            return Err(anyhow::anyhow!("Provider timeouts must be greater than 0"));
        }

        if self.audio.max_upload_mb == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        if self.audio.max_recording_seconds == 0 {
            return Err(anyhow::anyhow!("Max recording length must be greater than 0"));
        }

        if self.audio.json_limit_mb == 0 {
            return Err(anyhow::anyhow!("JSON body limit must be greater than 0"));
        }

        if self.performance.max_concurrent_transcriptions == 0 {
            return Err(anyhow::anyhow!("Max concurrent transcriptions must be greater than 0"));
        }

        if self.history.max_entries == 0 {
            return Err(anyhow::anyhow!("History size must be greater than 0"));
        }

        Ok(())
    }

    /// Update configuration from a JSON string (used for runtime config updates).
    ///
    /// ## Partial updates:
    /// Only the fields present in the JSON are changed, e.g.
    /// `{"audio": {"max_upload_mb": 50}}`. API keys, base URLs and the text
    /// model are fixed at startup; they are silently ignored if sent.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = u16::try_from(port)
                    .map_err(|_| anyhow::anyhow!("Server port {} is out of range", port))?;
            }
            if let Some(origins) = server.get("allowed_origins").and_then(|v| v.as_array()) {
                self.server.allowed_origins = origins
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
            }
        }

        if let Some(speech) = partial_config.get("speech") {
            if let Some(model) = speech.get("tts_model").and_then(|v| v.as_str()) {
                self.speech.tts_model = model.to_string();
            }
            if let Some(model) = speech.get("asr_model").and_then(|v| v.as_str()) {
                self.speech.asr_model = model.to_string();
            }
        }

        if let Some(audio) = partial_config.get("audio") {
            if let Some(mb) = audio.get("max_upload_mb").and_then(|v| v.as_u64()) {
                self.audio.max_upload_mb = mb as usize;
            }
            if let Some(secs) = audio.get("max_recording_seconds").and_then(|v| v.as_u64()) {
                self.audio.max_recording_seconds = u32::try_from(secs).unwrap_or(u32::MAX);
            }
        }

        if let Some(performance) = partial_config.get("performance") {
            if let Some(limit) = performance.get("max_concurrent_transcriptions").and_then(|v| v.as_u64()) {
                self.performance.max_concurrent_transcriptions = limit as usize;
            }
        }

        if let Some(history) = partial_config.get("history") {
            if let Some(max) = history.get("max_entries").and_then(|v| v.as_u64()) {
                self.history.max_entries = max as usize;
            }
        }

        self.validate()?;
        Ok(())
    }

    /// The speech provider key, if one is set and is not a template placeholder.
    pub fn speech_api_key(&self) -> Option<&str> {
        usable_key(self.speech.api_key.as_deref())
    }

    /// The text-generation key, if one is set and is not a template placeholder.
    pub fn text_api_key(&self) -> Option<&str> {
        usable_key(self.text.api_key.as_deref())
    }

    /// Largest accepted file upload in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.audio.max_upload_mb * 1024 * 1024
    }

    /// JSON / raw sample body limit in bytes.
    pub fn json_limit_bytes(&self) -> usize {
        self.audio.json_limit_mb * 1024 * 1024
    }

    /// Configuration as JSON with every secret replaced by a configured flag.
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::json!({
            "server": {
                "host": self.server.host,
                "port": self.server.port,
                "allowed_origins": self.server.allowed_origins
            },
            "speech": {
                "api_key_configured": self.speech_api_key().is_some(),
                "base_url": self.speech.base_url,
                "tts_model": self.speech.tts_model,
                "asr_model": self.speech.asr_model,
                "timeout_secs": self.speech.timeout_secs
            },
            "text": {
                "api_key_configured": self.text_api_key().is_some(),
                "base_url": self.text.base_url,
                "model": self.text.model,
                "timeout_secs": self.text.timeout_secs
            },
            "audio": {
                "max_upload_mb": self.audio.max_upload_mb,
                "max_recording_seconds": self.audio.max_recording_seconds,
                "json_limit_mb": self.audio.json_limit_mb
            },
            "performance": {
                "max_concurrent_transcriptions": self.performance.max_concurrent_transcriptions
            },
            "history": {
                "max_entries": self.history.max_entries
            }
        })
    }
}

fn usable_key(key: Option<&str>) -> Option<&str> {
    key.map(str::trim)
        .filter(|k| !k.is_empty() && !PLACEHOLDER_KEYS.contains(k))
}
