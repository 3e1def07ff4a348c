//! `POST /api/text/enhance`: run one text-model task (tts, transcription, summary,
//! detect-language) and return its result.

use crate::enhance::{self, EnhanceTask};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

fn default_language() -> String {
    "English".to_string()
}

#[derive(Debug, Deserialize)]
pub struct TextEnhanceRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub task: String,
}

pub async fn enhance_text(
    state: web::Data<AppState>,
    body: web::Json<TextEnhanceRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner();
    if request.text.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Text is required and cannot be empty".to_string(),
        ));
    }
    let task: EnhanceTask = request.task.parse().map_err(AppError::ValidationError)?;

    info!(task = task.as_str(), chars = request.text.chars().count(), "Text enhancement requested");
    let result = enhance::run_task(state.text.as_ref(), task, &request.text, &request.language).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "task": task.as_str(),
        "result": result.trim()
    })))
}
