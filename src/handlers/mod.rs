//! # HTTP Handlers
//!
//! One module per API area. [`configure_routes`] registers every route so the
//! server and the tests build the same application.

pub mod asr;      // Transcription of uploads and recordings, transcript clean-up
pub mod audio;    // Recording to WAV encoding
pub mod config;   // Runtime configuration
pub mod history;  // History listing, download and deletion
pub mod text;     // Text-model tasks
pub mod tts;      // Speech synthesis

use crate::error::AppError;
use crate::health;
use actix_web::{web, HttpResponse};

/// Register all routes.
///
/// `/api/v1` is registered before `/api` so its prefix wins.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(health::root))
        .route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/api/v1")
                .route("/health", web::get().to(health::health_check))
                .route("/metrics", web::get().to(health::detailed_metrics))
                .route("/config", web::get().to(config::get_config))
                .route("/config", web::put().to(config::update_config)),
        )
        .service(
            web::scope("/api")
                .route("/tts/generate", web::post().to(tts::generate_speech))
                .route("/asr/transcribe", web::post().to(asr::transcribe_upload))
                .route("/asr/record", web::post().to(asr::transcribe_recording))
                .route("/asr/enhance", web::post().to(asr::enhance_transcript))
                .route("/audio/encode", web::post().to(audio::encode_json))
                .route("/audio/encode/raw", web::post().to(audio::encode_raw))
                .route("/text/enhance", web::post().to(text::enhance_text))
                .route("/history", web::get().to(history::list_history))
                .route("/history", web::delete().to(history::clear_history))
                .route("/history/{id}", web::get().to(history::get_history_entry))
                .route("/history/{id}", web::delete().to(history::delete_history_entry))
                .route("/history/{id}/audio", web::get().to(history::get_history_audio))
                .route("/history/{id}/download", web::get().to(history::download_history_entry)),
        )
        .default_service(web::to(not_found));
}

/// JSON extractor settings: body limit and errors in the API's JSON shape.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| AppError::BadRequest(format!("Invalid JSON body: {}", err)).into())
}

async fn not_found() -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound("Route not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{MetricsMiddleware, RequestLogging};
    use crate::providers::testing::{FakeSpeech, FakeText};
    use crate::state::tests::test_state;
    use actix_web::{test, App};
    use serde_json::json;

    #[actix_web::test]
    async fn test_full_app_tts_then_history() {
        let state = web::Data::new(test_state(FakeSpeech::new("spoken"), FakeText::default()));
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .app_data(json_config(1024 * 1024))
                .wrap(MetricsMiddleware)
                .wrap(RequestLogging)
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/tts/generate")
            .set_json(json!({"text": "Hello there", "voice": "male"}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 200);
        assert!(res.headers().contains_key("x-request-id"));

        let req = test::TestRequest::get().uri("/api/history").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["name"], "Hello there");

        let req = test::TestRequest::get().uri("/api/v1/metrics").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let endpoints: Vec<String> = body["endpoints"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["endpoint"].as_str().unwrap().to_string())
            .collect();
        assert!(endpoints.contains(&"POST /api/tts/generate".to_string()));
    }

    #[actix_web::test]
    async fn test_malformed_json_uses_error_shape() {
        let state = web::Data::new(test_state(FakeSpeech::new(""), FakeText::default()));
        let app = test::init_service(
            App::new()
                .app_data(state)
                .app_data(json_config(1024))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/tts/generate")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 400);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["error"]["type"], "bad_request");

        let res = test::call_service(&app, test::TestRequest::get().uri("/nope").to_request()).await;
        assert_eq!(res.status().as_u16(), 404);
    }
}
