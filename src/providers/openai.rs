//! # OpenAI-compatible Speech Client
//!
//! Implements [`SpeechProvider`] against the OpenAI audio API:
//! - `POST {base_url}/audio/speech` (JSON in, MP3 bytes out)
//! - `POST {base_url}/audio/transcriptions` (multipart upload in, JSON out)
//!
//! The client is created once at startup and shared by all workers; `reqwest`
//! pools connections internally.

use super::{ProviderError, SpeechProvider, SynthesisRequest, TranscriptionRequest};
use crate::config::AppConfig;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

/// Body of `POST /audio/speech`.
#[derive(Debug, Serialize)]
struct SpeechPayload<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    instructions: &'a str,
    response_format: &'static str,
    speed: f32,
}

/// Body of a successful `POST /audio/transcriptions` (json format).
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// Error body returned by the API on failure.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

/// HTTP client for the speech provider.
pub struct OpenAiSpeechClient {
    http_client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiSpeechClient {
    /// Build the client from configuration.
    ///
    /// A missing key is not an error here: the server still starts and every
    /// call answers with `ProviderError::NotConfigured`.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.speech.timeout_secs))
            .build()
            .context("Failed to build speech provider HTTP client")?;

        Ok(Self {
            http_client,
            api_key: config.speech_api_key().map(str::to_string),
            base_url: config.speech.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured(
                "OPENAI_API_KEY is not configured. Please add your API key to .env".to_string(),
            )
        })
    }

    /// Turn a non-2xx response into `ProviderError::Upstream`.
    async fn upstream_error(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        let message = match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(parsed) => match parsed.error.error_type {
                Some(kind) => format!("{} ({})", parsed.error.message, kind),
                None => parsed.error.message,
            },
            Err(_) => body,
        };

        error!(status, message = %message, "Speech provider returned an error");
        ProviderError::Upstream { status, message }
    }
}

#[async_trait]
impl SpeechProvider for OpenAiSpeechClient {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, ProviderError> {
        let api_key = self.api_key()?;
        let payload = SpeechPayload {
            model: &request.model,
            input: &request.text,
            voice: &request.voice,
            instructions: &request.instructions,
            response_format: "mp3",
            speed: 1.0,
        };

        info!(model = %request.model, voice = %request.voice, chars = request.text.chars().count(), "Calling speech synthesis");

        let response = self
            .http_client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Network(format!("Failed to read audio body: {}", e)))?;

        if audio.is_empty() {
            return Err(ProviderError::InvalidResponse("Provider returned no audio".to_string()));
        }

        debug!(bytes = audio.len(), "Speech synthesis response received");
        Ok(audio.to_vec())
    }

    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String, ProviderError> {
        let api_key = self.api_key()?;

        let file_part = Part::bytes(request.audio.clone())
            .file_name(request.filename.clone())
            .mime_str(&request.content_type)
            .map_err(|e| ProviderError::InvalidResponse(format!("Invalid MIME type '{}': {}", request.content_type, e)))?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", request.model.clone());

        if let Some(language) = &request.language {
            form = form.text("language", language.clone());
        }

        info!(
            model = %request.model,
            filename = %request.filename,
            bytes = request.audio.len(),
            language = request.language.as_deref().unwrap_or("auto"),
            "Calling speech transcription"
        );

        let response = self
            .http_client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse transcription: {}", e)))?;

        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAiSpeechClient {
        let mut config = AppConfig::default();
        config.speech.base_url = format!("{}/v1", server.uri());
        config.speech.api_key = Some("sk-test".to_string());
        OpenAiSpeechClient::from_config(&config).unwrap()
    }

    fn synthesis() -> SynthesisRequest {
        SynthesisRequest {
            text: "Hello there".to_string(),
            voice: "nova".to_string(),
            instructions: "Speak warmly".to_string(),
            model: "gpt-4o-mini-tts".to_string(),
        }
    }

    fn transcription(language: Option<&str>) -> TranscriptionRequest {
        TranscriptionRequest {
            audio: b"RIFF-fake-wav".to_vec(),
            filename: "clip.wav".to_string(),
            content_type: "audio/wav".to_string(),
            language: language.map(str::to_string),
            model: "whisper-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_synthesize_sends_bearer_and_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/speech"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini-tts",
                "input": "Hello there",
                "voice": "nova",
                "instructions": "Speak warmly",
                "response_format": "mp3"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3-mp3-bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let audio = client_for(&server).synthesize(&synthesis()).await.unwrap();
        assert_eq!(audio, b"ID3-mp3-bytes");
    }

    #[tokio::test]
    async fn test_synthesize_rejects_empty_audio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/speech"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let result = client_for(&server).synthesize(&synthesis()).await;
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_upstream_error_keeps_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/speech"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Invalid API key", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        match client_for(&server).synthesize(&synthesis()).await {
            Err(ProviderError::Upstream { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid API key (invalid_request_error)");
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transcribe_sends_multipart_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_string_contains("name=\"file\"; filename=\"clip.wav\""))
            .and(body_string_contains("RIFF-fake-wav"))
            .and(body_string_contains("name=\"model\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "আমি ভালো আছি"})))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let text = client.transcribe(&transcription(Some("bn"))).await.unwrap();
        assert_eq!(text, "আমি ভালো আছি");
        client.transcribe(&transcription(None)).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let with_hint = String::from_utf8_lossy(&requests[0].body).into_owned();
        assert!(with_hint.contains("name=\"language\""));
        assert!(with_hint.contains("whisper-1"));
        assert!(with_hint.contains("Content-Type: audio/wav") || with_hint.contains("content-type: audio/wav"));

        let auto_detect = String::from_utf8_lossy(&requests[1].body).into_owned();
        assert!(!auto_detect.contains("name=\"language\""));
    }

    #[tokio::test]
    async fn test_transcribe_unparseable_reply_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client_for(&server).transcribe(&transcription(None)).await;
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_missing_key_never_reaches_network() {
        let server = MockServer::start().await;
        let mut config = AppConfig::default();
        config.speech.base_url = server.uri();

        let client = OpenAiSpeechClient::from_config(&config).unwrap();
        let result = client.synthesize(&synthesis()).await;
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[test]
    fn test_missing_key_is_not_configured() {
        let client = OpenAiSpeechClient::from_config(&AppConfig::default()).unwrap();
        assert!(!client.is_configured());
        assert!(matches!(client.api_key(), Err(ProviderError::NotConfigured(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let mut config = AppConfig::default();
        config.speech.base_url = "http://localhost:9000/v1/".to_string();
        config.speech.api_key = Some("sk-test".to_string());

        let client = OpenAiSpeechClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:9000/v1");
        assert!(client.is_configured());
    }

    #[test]
    fn test_speech_payload_shape() {
        let payload = SpeechPayload {
            model: "gpt-4o-mini-tts",
            input: "হ্যালো",
            voice: "nova",
            instructions: "Speak warmly",
            response_format: "mp3",
            speed: 1.0,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["voice"], "nova");
        assert_eq!(json["response_format"], "mp3");
        assert_eq!(json["input"], "হ্যালো");
    }

    #[test]
    fn test_error_body_parsing() {
        let body = r#"{"error": {"message": "Invalid API key", "type": "invalid_request_error"}}"#;
        let parsed: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.message, "Invalid API key");
        assert_eq!(parsed.error.error_type.as_deref(), Some("invalid_request_error"));
    }
}
