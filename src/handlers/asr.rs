//! # Speech-to-Text Handlers
//!
//! ## Available Endpoints:
//! - `POST /api/asr/transcribe` - multipart upload (`file`, optional `language`)
//! - `POST /api/asr/record` - decoded recording as JSON, encoded to WAV and transcribed
//! - `POST /api/asr/enhance` - clean up a raw transcript with the text model
//!
//! Uploads and recordings share one path to the provider: a claimed slot, the
//! provider call, the empty-transcript check, a history entry and the same
//! response shape.

use crate::audio::upload::{allowed_extension, content_type_for_extension, format_megabytes};
use crate::audio::{inspect_wav, DecodedAudioBuffer, ALLOWED_UPLOAD_EXTENSIONS};
use crate::enhance::{self, TextStats};
use crate::error::{AppError, AppResult};
use crate::handlers::audio::{encode_recording, RecordingRequest};
use crate::history::{HistoryAudio, HistoryEntry, HistoryKind};
use crate::providers::TranscriptionRequest;
use crate::state::AppState;
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures_util::stream::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

/// An audio file ready to send to the provider.
struct AudioInput {
    audio: Vec<u8>,
    filename: String,
    content_type: String,
    format: String,
    language: Option<String>,
    duration_seconds: Option<f64>,
}

/// Treat blank language hints as "auto-detect".
fn normalize_language(language: Option<String>) -> Option<String> {
    language
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
}

/// Send audio to the provider and build the transcription response.
async fn transcribe_audio(state: &AppState, input: AudioInput) -> AppResult<HttpResponse> {
    let config = state.get_config();
    let file_size = format_megabytes(input.audio.len());

    let request = TranscriptionRequest {
        audio: input.audio,
        filename: input.filename.clone(),
        content_type: input.content_type,
        language: input.language.clone(),
        model: config.speech.asr_model.clone(),
    };

    let text = {
        let _slot = state.try_acquire_transcription_slot()?;
        state.speech.transcribe(&request).await?
    };

    if text.trim().is_empty() {
        warn!(filename = %input.filename, "No text transcribed from audio");
        return Err(AppError::BadRequest(
            "No speech detected in the audio file".to_string(),
        ));
    }

    let language = input.language.as_deref().unwrap_or("auto-detect");
    info!(
        filename = %input.filename,
        characters = text.chars().count(),
        "Transcription successful"
    );

    state.history.add(
        HistoryEntry::new(HistoryKind::SpeechToText, &text, language, input.duration_seconds)
            .with_audio(HistoryAudio::new(request.audio, &request.content_type, &input.format)),
    );

    let mut metadata = json!({
        "filename": input.filename,
        "fileSize": file_size,
        "format": input.format,
        "language": language,
        "provider": state.speech.name(),
        "model": config.speech.asr_model,
        "characterCount": text.chars().count(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    });
    if let Some(duration) = input.duration_seconds {
        metadata["durationSeconds"] = json!(duration);
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "text": text,
        "metadata": metadata
    })))
}

/// Read one multipart field into memory, failing as soon as it exceeds `limit`.
async fn read_field_limited(field: &mut Field, limit: usize) -> AppResult<Vec<u8>> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Upload error: {}", e)))?;
        if bytes.len() + chunk.len() > limit {
            return Err(AppError::ValidationError(format!(
                "File size exceeds maximum limit of {} MB",
                limit / (1024 * 1024)
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// Transcribe an uploaded audio file.
///
/// ## Endpoint: `POST /api/asr/transcribe`
///
/// ## Form fields:
/// - `file`: the audio file (flac, mp3, mp4, mpeg, mpga, m4a, ogg, wav, webm)
/// - `language`: optional hint, e.g. `bn` or `en`
pub async fn transcribe_upload(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> AppResult<HttpResponse> {
    let max_bytes = state.get_config().max_upload_bytes();

    let mut file: Option<(String, String, Vec<u8>, Option<String>)> = None;
    let mut language: Option<String> = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let (name, filename) = match field.content_disposition() {
            Some(cd) => (
                cd.get_name().unwrap_or_default().to_string(),
                cd.get_filename().map(str::to_string),
            ),
            None => continue,
        };

        match name.as_str() {
            "file" => {
                let filename = filename.unwrap_or_default();
                let format = allowed_extension(&filename).ok_or_else(|| {
                    warn!(filename = %filename, "Unsupported file type");
                    AppError::ValidationError(format!(
                        "Unsupported file format. Supported formats: {}",
                        ALLOWED_UPLOAD_EXTENSIONS.join(", ")
                    ))
                })?;
                let content_type = field.content_type().map(|m| m.to_string());
                let bytes = read_field_limited(&mut field, max_bytes).await?;
                file = Some((filename, format, bytes, content_type));
            }
            "language" => {
                let bytes = read_field_limited(&mut field, 1024).await?;
                language = Some(String::from_utf8_lossy(&bytes).into_owned());
            }
            other => {
                debug!(field = %other, "Ignoring unknown multipart field");
                while let Some(chunk) = field.next().await {
                    chunk.map_err(|e| AppError::BadRequest(format!("Upload error: {}", e)))?;
                }
            }
        }
    }

    let (filename, format, audio, content_type) =
        file.ok_or_else(|| AppError::ValidationError("No audio file provided".to_string()))?;
    if audio.is_empty() {
        return Err(AppError::ValidationError("Uploaded file is empty".to_string()));
    }

    let duration_seconds = if format == "wav" {
        match inspect_wav(&audio) {
            Ok(info) => Some(info.duration_seconds),
            Err(e) => {
                warn!(error = %e, "Could not read WAV header, forwarding anyway");
                None
            }
        }
    } else {
        None
    };

    info!(
        filename = %filename,
        size = %format_megabytes(audio.len()),
        "ASR transcription requested"
    );

    let content_type = content_type
        .filter(|ct| ct != "application/octet-stream")
        .unwrap_or_else(|| content_type_for_extension(&format).to_string());

    transcribe_audio(
        &state,
        AudioInput {
            audio,
            filename,
            content_type,
            format,
            language: normalize_language(language),
            duration_seconds,
        },
    )
    .await
}

/// Encode a decoded recording and transcribe it.
///
/// ## Endpoint: `POST /api/asr/record`
///
/// The provider receives exactly the bytes of the encoded WAV. A recording that
/// fails validation is never forwarded.
pub async fn transcribe_recording(
    state: web::Data<AppState>,
    body: web::Json<RecordingRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner();
    let buffer = DecodedAudioBuffer::new(request.sample_rate, request.channels);
    let encoded = encode_recording(&state.get_config(), &buffer)?;

    info!(
        duration_seconds = encoded.duration_seconds,
        bytes = encoded.wav.len(),
        "Recording received for transcription"
    );

    transcribe_audio(
        &state,
        AudioInput {
            audio: encoded.wav.into_bytes(),
            filename: "recording.wav".to_string(),
            content_type: "audio/wav".to_string(),
            format: "wav".to_string(),
            language: normalize_language(request.language),
            duration_seconds: Some(encoded.duration_seconds),
        },
    )
    .await
}

fn default_enhance_language() -> String {
    "English".to_string()
}

/// Request body for `POST /api/asr/enhance`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceTranscriptRequest {
    #[serde(default, alias = "audioText")]
    pub text: Option<String>,
    #[serde(default = "default_enhance_language")]
    pub language: String,
    #[serde(default)]
    pub mode: Option<String>,
}

/// Clean up a raw transcript and report its statistics.
///
/// ## Endpoint: `POST /api/asr/enhance`
pub async fn enhance_transcript(
    state: web::Data<AppState>,
    body: web::Json<EnhanceTranscriptRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner();
    let raw = request
        .text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError("Text is required and cannot be empty".to_string()))?;

    let enhanced = enhance::enhance_transcription(state.text.as_ref(), &raw, &request.language).await?;
    let enhanced = enhanced.trim().to_string();
    let stats = TextStats::of(&enhanced);

    info!(words = stats.words, language = %request.language, "Transcript enhanced");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "transcription": enhanced,
        "rawTranscription": raw,
        "metadata": {
            "words": stats.words,
            "characters": stats.characters,
            "sentences": stats.sentences,
            "language": request.language,
            "mode": request.mode,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::decode_pcm16;
    use crate::config::AppConfig;
    use crate::providers::testing::{FakeSpeech, FakeText};
    use crate::providers::ProviderError;
    use actix_web::{test, App};
    use std::sync::Arc;

    const BOUNDARY: &str = "XBOUNDARYX";

    fn multipart_body(filename: &str, content: &[u8], language: Option<&str>) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
        if let Some(language) = language {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"language\"\r\n\r\n{language}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/asr/transcribe")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
    }

    fn state_with(speech: Arc<FakeSpeech>, config: AppConfig) -> AppState {
        AppState::new(config, speech, Arc::new(FakeText::new("Enhanced text. Second sentence!")))
    }

    macro_rules! asr_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .route("/api/asr/transcribe", web::post().to(transcribe_upload))
                    .route("/api/asr/record", web::post().to(transcribe_recording))
                    .route("/api/asr/enhance", web::post().to(enhance_transcript)),
            )
            .await
        };
    }

    fn small_wav() -> Vec<u8> {
        crate::audio::encode_wav(&DecodedAudioBuffer::silence(16000, 1, 8000))
            .unwrap()
            .into_bytes()
    }

    #[actix_web::test]
    async fn test_upload_wav_is_transcribed_with_duration() {
        let speech = Arc::new(FakeSpeech::new("আমি ভালো আছি"));
        let state = state_with(speech.clone(), AppConfig::default());
        let history = state.history.clone();
        let app = asr_app!(state);

        let wav = small_wav();
        let req = upload_request(multipart_body("clip.WAV", &wav, Some("bn"))).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 200);

        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["text"], "আমি ভালো আছি");
        assert_eq!(body["metadata"]["format"], "wav");
        assert_eq!(body["metadata"]["language"], "bn");
        assert_eq!(body["metadata"]["durationSeconds"], 0.5);
        assert_eq!(body["metadata"]["characterCount"], "আমি ভালো আছি".chars().count());

        let sent = speech.transcriptions.lock().unwrap();
        assert_eq!(sent[0].audio, wav);
        assert_eq!(sent[0].content_type, "audio/wav");
        assert_eq!(sent[0].language.as_deref(), Some("bn"));
        assert_eq!(history.len(), 1);
        let entry = &history.query(&Default::default())[0];
        assert_eq!(entry.audio.as_ref().unwrap().bytes.as_ref(), wav.as_slice());
        assert_eq!(entry.audio.as_ref().unwrap().extension, "wav");
    }

    #[actix_web::test]
    async fn test_upload_without_language_is_auto_detect() {
        let speech = Arc::new(FakeSpeech::new("hello"));
        let app = asr_app!(state_with(speech.clone(), AppConfig::default()));

        let req = upload_request(multipart_body("voice.mp3", b"ID3data", None)).to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["metadata"]["language"], "auto-detect");
        assert!(body["metadata"].get("durationSeconds").is_none());
        assert_eq!(speech.transcriptions.lock().unwrap()[0].content_type, "audio/mpeg");
    }

    #[actix_web::test]
    async fn test_upload_rejects_unsupported_extension() {
        let speech = Arc::new(FakeSpeech::new("hello"));
        let app = asr_app!(state_with(speech.clone(), AppConfig::default()));

        let req = upload_request(multipart_body("notes.txt", b"hello", None)).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 400);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert!(body["error"]["message"].as_str().unwrap().contains("Unsupported file format"));
        assert!(speech.transcriptions.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_upload_rejects_oversized_file() {
        let speech = Arc::new(FakeSpeech::new("hello"));
        let mut config = AppConfig::default();
        config.audio.max_upload_mb = 1;
        let app = asr_app!(state_with(speech.clone(), config));

        let big = vec![0u8; 1024 * 1024 + 1];
        let req = upload_request(multipart_body("big.ogg", &big, None)).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 400);
        assert!(speech.transcriptions.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_empty_transcript_is_bad_request() {
        let app = asr_app!(state_with(Arc::new(FakeSpeech::new("  ")), AppConfig::default()));

        let req = upload_request(multipart_body("quiet.webm", b"webm", None)).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 400);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["error"]["message"], "No speech detected in the audio file");
    }

    #[actix_web::test]
    async fn test_missing_file_field() {
        let app = asr_app!(state_with(Arc::new(FakeSpeech::new("x")), AppConfig::default()));

        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"language\"\r\n\r\nen\r\n--{BOUNDARY}--\r\n"
        );
        let res = test::call_service(&app, upload_request(body.into_bytes()).to_request()).await;
        assert_eq!(res.status().as_u16(), 400);
    }

    #[actix_web::test]
    async fn test_record_forwards_exact_wav_bytes() {
        let speech = Arc::new(FakeSpeech::new("recorded words"));
        let state = state_with(speech.clone(), AppConfig::default());
        let history = state.history.clone();
        let app = asr_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/asr/record")
            .set_json(json!({"sample_rate": 4, "channels": [[0.5, -0.5, 0.0, 1.0]], "language": "en"}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["text"], "recorded words");
        assert_eq!(body["metadata"]["durationSeconds"], 1.0);

        let sent = speech.transcriptions.lock().unwrap();
        assert_eq!(sent[0].filename, "recording.wav");
        let (info, samples) = decode_pcm16(&sent[0].audio).unwrap();
        assert_eq!(info.sample_rate, 4);
        assert_eq!(samples, vec![16384, -16384, 0, 32767]);

        let entries = history.query(&Default::default());
        assert_eq!(entries[0].duration_seconds, Some(1.0));
        let kept = entries[0].audio.as_ref().unwrap();
        assert_eq!(kept.bytes.as_ref(), sent[0].audio.as_slice());
        assert_eq!(kept.content_type, "audio/wav");
        assert_eq!(entries[0].download_filename(), "recorded_words.wav");
    }

    #[actix_web::test]
    async fn test_record_rejects_mismatched_channels_without_calling_provider() {
        let speech = Arc::new(FakeSpeech::new("x"));
        let app = asr_app!(state_with(speech.clone(), AppConfig::default()));

        let req = test::TestRequest::post()
            .uri("/api/asr/record")
            .set_json(json!({"sample_rate": 16000, "channels": [[0.1, 0.2], [0.1]]}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 400);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert!(body["error"]["message"].as_str().unwrap().starts_with("Recording failed"));
        assert!(speech.transcriptions.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_busy_server_returns_503() {
        let speech = Arc::new(FakeSpeech::new("x"));
        let state = state_with(speech, AppConfig::default());
        let mut config = state.get_config();
        config.performance.max_concurrent_transcriptions = 1;
        state.update_config(config).unwrap();
        let _held = state.try_acquire_transcription_slot().unwrap();
        let app = asr_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/asr/record")
            .set_json(json!({"sample_rate": 8000, "channels": [[0.1]]}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 503);
    }

    #[actix_web::test]
    async fn test_provider_network_error_is_bad_gateway() {
        let mut fake = FakeSpeech::new("x");
        fake.fail_with = Some(ProviderError::Network("connection refused".to_string()));
        let app = asr_app!(state_with(Arc::new(fake), AppConfig::default()));

        let req = upload_request(multipart_body("a.flac", b"fLaC", None)).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 502);
    }

    #[actix_web::test]
    async fn test_enhance_transcript() {
        let app = asr_app!(state_with(Arc::new(FakeSpeech::new("x")), AppConfig::default()));

        let req = test::TestRequest::post()
            .uri("/api/asr/enhance")
            .set_json(json!({"audioText": "enhanced text second sentence", "language": "English", "mode": "meeting"}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["transcription"], "Enhanced text. Second sentence!");
        assert_eq!(body["rawTranscription"], "enhanced text second sentence");
        assert_eq!(body["metadata"]["words"], 4);
        assert_eq!(body["metadata"]["sentences"], 2);
        assert_eq!(body["metadata"]["mode"], "meeting");
    }

    #[actix_web::test]
    async fn test_enhance_requires_text_and_key() {
        let app = asr_app!(state_with(Arc::new(FakeSpeech::new("x")), AppConfig::default()));
        let req = test::TestRequest::post()
            .uri("/api/asr/enhance")
            .set_json(json!({"language": "English"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status().as_u16(), 400);

        let state = AppState::new(
            AppConfig::default(),
            Arc::new(FakeSpeech::new("x")),
            Arc::new(FakeText::default()),
        );
        let app = asr_app!(state);
        let req = test::TestRequest::post()
            .uri("/api/asr/enhance")
            .set_json(json!({"text": "raw"}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 500);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["error"]["type"], "config_error");
    }
}
