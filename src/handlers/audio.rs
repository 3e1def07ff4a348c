//! # Recording Encoding Handlers
//!
//! The browser records compressed audio, decodes it into float samples, and
//! sends those samples here. These endpoints hand back a 16-bit PCM WAV file.
//!
//! ## Available Endpoints:
//! - `POST /api/audio/encode` - JSON `{sample_rate, channels: [[f32]]}` to WAV
//! - `POST /api/audio/encode/raw?sample_rate=&channels=` - interleaved f32le body to WAV
//!
//! The same validation is used by `POST /api/asr/record` before it forwards the
//! file to the speech provider.

use crate::audio::{encode_wav, DecodedAudioBuffer, WavContainer, WavError};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// A decoded recording sent as JSON.
#[derive(Debug, Deserialize)]
pub struct RecordingRequest {
    pub sample_rate: u32,
    /// Planar samples, one array per channel
    pub channels: Vec<Vec<f32>>,
    /// Language hint for transcription ("bn", "en"); ignored by the encode endpoint
    #[serde(default)]
    pub language: Option<String>,
}

/// Query string of the raw endpoint.
#[derive(Debug, Deserialize)]
pub struct RawEncodeQuery {
    pub sample_rate: u32,
    pub channels: usize,
}

/// An encoded recording and its length.
#[derive(Debug)]
pub struct EncodedRecording {
    pub wav: WavContainer,
    pub duration_seconds: f64,
}

/// Validate a recording against the configured limits and encode it.
///
/// ## Errors (all 400):
/// - malformed buffer (zero rate, no channels, unequal channel lengths)
/// - no samples at all
/// - longer than `audio.max_recording_seconds`
pub fn encode_recording(config: &AppConfig, buffer: &DecodedAudioBuffer) -> AppResult<EncodedRecording> {
    let frames = buffer.validate().map_err(recording_failed)?;
    if frames == 0 {
        return Err(AppError::ValidationError(
            "Recording is empty. Please record some audio and try again".to_string(),
        ));
    }

    let duration_seconds = buffer.duration_seconds();
    let max = config.audio.max_recording_seconds;
    if duration_seconds > f64::from(max) {
        return Err(AppError::ValidationError(format!(
            "Recording is {:.1} seconds long; the maximum is {} seconds",
            duration_seconds, max
        )));
    }

    let wav = encode_wav(buffer).map_err(recording_failed)?;
    debug!(
        sample_rate = buffer.sample_rate,
        channels = buffer.channel_count(),
        frames,
        bytes = wav.len(),
        "Recording encoded"
    );

    Ok(EncodedRecording { wav, duration_seconds })
}

fn recording_failed(err: WavError) -> AppError {
    warn!(error = %err, "Recording could not be encoded");
    AppError::BadRequest(format!("Recording failed, please try again. {}", err))
}

fn wav_response(wav: WavContainer) -> HttpResponse {
    let filename = format!("recording-{}.wav", chrono::Utc::now().timestamp_millis());
    HttpResponse::Ok()
        .content_type("audio/wav")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename)],
        })
        .body(wav.into_bytes())
}

/// Encode a JSON recording to WAV.
pub async fn encode_json(
    state: web::Data<AppState>,
    body: web::Json<RecordingRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner();
    let buffer = DecodedAudioBuffer::new(request.sample_rate, request.channels);
    let encoded = encode_recording(&state.get_config(), &buffer)?;

    info!(
        duration_seconds = encoded.duration_seconds,
        bytes = encoded.wav.len(),
        "Recording encoded to WAV"
    );
    Ok(wav_response(encoded.wav))
}

/// Encode interleaved little-endian f32 samples to WAV.
pub async fn encode_raw(
    state: web::Data<AppState>,
    query: web::Query<RawEncodeQuery>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let buffer = DecodedAudioBuffer::from_f32le_bytes(query.sample_rate, query.channels, &body)?;
    let encoded = encode_recording(&state.get_config(), &buffer)?;

    info!(
        duration_seconds = encoded.duration_seconds,
        bytes = encoded.wav.len(),
        "Raw samples encoded to WAV"
    );
    Ok(wav_response(encoded.wav))
}
