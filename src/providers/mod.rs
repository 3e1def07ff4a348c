//! # External Providers
//!
//! The speech models and the text-generation model are not part of this service.
//! They are reached over HTTP through the two traits defined here, so handlers
//! never talk to `reqwest` directly and tests can swap in fakes.
//!
//! ## Key Components:
//! - **SpeechProvider**: text-to-speech and file transcription (`openai`)
//! - **TextGenerator**: prompt in, text out (`gemini`)
//! - **voices**: voice mapping and narration instructions for synthesis
//!
//! ## Error Handling:
//! Every provider call returns `ProviderError`; `error.rs` maps it to an HTTP status.

pub mod gemini;   // Gemini generateContent client
pub mod openai;   // OpenAI-compatible audio client
pub mod voices;   // Voice map and narration instructions

use async_trait::async_trait;

pub use gemini::GeminiTextClient;
pub use openai::OpenAiSpeechClient;

/// Failures talking to an external provider.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// No usable API key (missing or still the template placeholder)
    #[error("{0}")]
    NotConfigured(String),

    /// The request never produced a response (DNS, TLS, timeout, ...)
    #[error("Request to provider failed: {0}")]
    Network(String),

    /// The provider answered with an error status
    #[error("Provider returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// The provider answered 2xx but the body was not what we expected
    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),
}

/// One speech synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    /// Text to speak
    pub text: String,
    /// Provider-side voice name (already mapped, e.g. "nova")
    pub voice: String,
    /// Narration style instructions
    pub instructions: String,
    /// Provider model identifier
    pub model: String,
}

/// An audio file to transcribe.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionRequest {
    /// Raw file bytes exactly as uploaded (or as encoded from a recording)
    pub audio: Vec<u8>,
    pub filename: String,
    pub content_type: String,
    /// Language hint ("bn", "en"); `None` lets the provider auto-detect
    pub language: Option<String>,
    /// Provider model identifier
    pub model: String,
}

/// Text-to-speech and speech-to-text backend.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Human-readable provider name for response metadata
    fn name(&self) -> &'static str;

    /// Whether a usable API key is present
    fn is_configured(&self) -> bool;

    /// Synthesize speech, returning MP3 bytes.
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, ProviderError>;

    /// Transcribe an audio file, returning the recognized text (possibly empty).
    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String, ProviderError>;
}

/// Generative text model used for enhancement prompts.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_configured(&self) -> bool;

    /// Run one prompt and return the model's text.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Shared fakes for handler and enhancement tests.
#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Speech provider that records what it was asked and answers from canned values.
    #[derive(Default)]
    pub struct FakeSpeech {
        pub configured: bool,
        pub transcript: String,
        pub audio: Vec<u8>,
        pub fail_with: Option<ProviderError>,
        pub transcriptions: Mutex<Vec<TranscriptionRequest>>,
        pub syntheses: Mutex<Vec<SynthesisRequest>>,
    }

    impl FakeSpeech {
        pub fn new(transcript: &str) -> Self {
            Self {
                configured: true,
                transcript: transcript.to_string(),
                audio: b"ID3fake-mp3".to_vec(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl SpeechProvider for FakeSpeech {
        fn name(&self) -> &'static str {
            "Fake Speech"
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, ProviderError> {
            if !self.configured {
                return Err(ProviderError::NotConfigured("OPENAI_API_KEY is not configured".into()));
            }
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            self.syntheses.lock().unwrap().push(request.clone());
            Ok(self.audio.clone())
        }

        async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String, ProviderError> {
            if !self.configured {
                return Err(ProviderError::NotConfigured("OPENAI_API_KEY is not configured".into()));
            }
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            self.transcriptions.lock().unwrap().push(request.clone());
            Ok(self.transcript.clone())
        }
    }

    /// Text generator that echoes a fixed reply and keeps the prompts it saw.
    #[derive(Default)]
    pub struct FakeText {
        pub configured: bool,
        pub reply: String,
        pub prompts: Mutex<Vec<String>>,
    }

    impl FakeText {
        pub fn new(reply: &str) -> Self {
            Self {
                configured: true,
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for FakeText {
        fn name(&self) -> &'static str {
            "Fake Text"
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
            if !self.configured {
                return Err(ProviderError::NotConfigured("GEMINI_API_KEY is not configured".into()));
            }
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }
}
