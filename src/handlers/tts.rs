//! # Text-to-Speech Handler
//!
//! `POST /api/tts/generate` turns text into MP3 speech through the speech provider
//! and returns it inline as a `data:` URL, ready for an `<audio>` element.
//!
//! ## Request Flow:
//! 1. Validate the text (not blank, at most 5000 characters)
//! 2. Map the voice id to a provider voice and build narration instructions
//! 3. Optionally rewrite the text with the text-generation model
//! 4. Claim a provider slot and synthesize
//! 5. Record a history entry and answer with the audio plus metadata

use crate::audio::upload::format_kilobytes;
use crate::enhance;
use crate::error::{AppError, AppResult};
use crate::history::{HistoryAudio, HistoryEntry, HistoryKind};
use crate::providers::voices::{narration_instructions, provider_voice, NarrationLanguage};
use crate::providers::SynthesisRequest;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

/// Longest text accepted for one synthesis call.
pub const MAX_TTS_CHARS: usize = 5000;

fn default_language() -> String {
    "english".to_string()
}

fn default_voice() -> String {
    "female".to_string()
}

/// Request body for `POST /api/tts/generate`.
#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    /// "bangla", "english" or "mix"
    #[serde(default = "default_language")]
    pub language: String,
    /// "female" or "male"
    #[serde(default = "default_voice")]
    pub voice: String,
    /// Rewrite the text for speech before synthesis
    #[serde(default)]
    pub enhance: bool,
}

impl TtsRequest {
    fn validate(&self) -> AppResult<()> {
        if self.text.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Text is required and cannot be empty".to_string(),
            ));
        }
        let chars = self.text.chars().count();
        if chars > MAX_TTS_CHARS {
            return Err(AppError::ValidationError(format!(
                "Text is too long ({} characters). Maximum is {} characters",
                chars, MAX_TTS_CHARS
            )));
        }
        Ok(())
    }
}

/// Generate speech audio from text.
///
/// ## Endpoint: `POST /api/tts/generate`
///
/// ## Response:
/// ```json
/// {
///   "success": true,
///   "audioUrl": "data:audio/mpeg;base64,SUQz...",
///   "metadata": {
///     "language": "bangla",
///     "voice": "female",
///     "providerVoice": "nova",
///     "provider": "OpenAI",
///     "model": "gpt-4o-mini-tts",
///     "audioSize": "42.17 KB",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
pub async fn generate_speech(
    state: web::Data<AppState>,
    body: web::Json<TtsRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner();
    info!(
        language = %request.language,
        voice = %request.voice,
        text_length = request.text.chars().count(),
        enhance = request.enhance,
        "TTS generation requested"
    );
    request.validate()?;

    let config = state.get_config();
    let voice = provider_voice(&request.voice);
    let language = NarrationLanguage::parse(&request.language);
    let instructions = narration_instructions(language, voice);

    let mut enhanced = false;
    let mut text = request.text.clone();
    if request.enhance {
        if state.text.is_configured() {
            match enhance::preprocess_for_tts(state.text.as_ref(), &request.text, language.prompt_name()).await {
                Ok(rewritten) if !rewritten.trim().is_empty() => {
                    text = rewritten.trim().to_string();
                    enhanced = true;
                }
                Ok(_) => warn!("Text enhancement returned nothing, using original text"),
                Err(e) => warn!(error = %e, "Text enhancement failed, using original text"),
            }
        } else {
            warn!("Enhancement requested but no text-generation key is configured");
        }
    }

    let _slot = state.try_acquire_transcription_slot()?;
    let audio = state
        .speech
        .synthesize(&SynthesisRequest {
            text: text.clone(),
            voice: voice.to_string(),
            instructions,
            model: config.speech.tts_model.clone(),
        })
        .await?;

    let audio_size = format_kilobytes(audio.len());
    info!(audio_size = %audio_size, voice = %voice, "Audio generated successfully");

    let audio_url = format!("data:audio/mpeg;base64,{}", STANDARD.encode(&audio));
    state.history.add(
        HistoryEntry::new(HistoryKind::TextToSpeech, &text, &request.language, None)
            .with_audio(HistoryAudio::new(audio, "audio/mpeg", "mp3")),
    );

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "audioUrl": audio_url,
        "metadata": {
            "language": request.language,
            "voice": request.voice,
            "providerVoice": voice,
            "provider": state.speech.name(),
            "model": config.speech.tts_model,
            "audioSize": audio_size,
            "enhanced": enhanced,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }
    })))
}
