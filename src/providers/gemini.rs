//! Gemini `generateContent` client used for text enhancement.
//!
//! `POST {base_url}/models/{model}:generateContent?key=...` with a single user
//! turn; the reply text is the concatenation of the first candidate's parts.

use super::{ProviderError, TextGenerator};
use crate::config::AppConfig;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// HTTP client for the text-generation API.
pub struct GeminiTextClient {
    http_client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiTextClient {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.text.timeout_secs))
            .build()
            .context("Failed to build text provider HTTP client")?;

        Ok(Self {
            http_client,
            api_key: config.text_api_key().map(str::to_string),
            base_url: config.text.base_url.trim_end_matches('/').to_string(),
            model: config.text.model.clone(),
        })
    }
}

/// Join the text parts of the first candidate.
fn extract_text(response: GenerateResponse) -> Result<String, ProviderError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ProviderError::InvalidResponse("Model returned no text".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl TextGenerator for GeminiTextClient {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured(
                "GEMINI_API_KEY is not configured. Please add your API key to .env".to_string(),
            )
        })?;

        let model = &self.model;
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        info!(model = %model, prompt_chars = prompt.chars().count(), "Calling text generation");

        let response = self
            .http_client
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), message = %message, "Text provider returned an error");
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse generation: {}", e)))?;

        extract_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GeminiTextClient {
        let mut config = AppConfig::default();
        config.text.base_url = format!("{}/v1beta/", server.uri());
        config.text.api_key = Some("gm-test".to_string());
        GeminiTextClient::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn test_generate_sends_key_and_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "gm-test"))
            .and(body_partial_json(json!({
                "contents": [{"role": "user", "parts": [{"text": "Summarize this"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "A short "}, {"text": "summary."}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server).generate("Summarize this").await.unwrap();
        assert_eq!(text, "A short summary.");
    }

    #[tokio::test]
    async fn test_generate_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        match client_for(&server).generate("hello").await {
            Err(ProviderError::Upstream { status, message }) => {
                assert_eq!(status, 429);
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_rejects_blocked_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"finishReason": "SAFETY"}]
            })))
            .mount(&server)
            .await;

        let result = client_for(&server).generate("hello").await;
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = r#"{"candidates": [{"content": {"parts": [{"text": "আমি "}, {"text": "ভালো আছি।"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(extract_text(parsed).unwrap(), "আমি ভালো আছি।");
    }

    #[test]
    fn test_extract_text_rejects_empty_reply() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(extract_text(parsed), Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_request_shape() {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: "hello" }],
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_placeholder_key_is_not_configured() {
        let mut config = AppConfig::default();
        config.text.api_key = Some("your_gemini_api_key_here".to_string());

        let client = GeminiTextClient::from_config(&config).unwrap();
        assert!(!client.is_configured());
        assert_eq!(client.model, "gemini-2.5-flash");
    }
}
