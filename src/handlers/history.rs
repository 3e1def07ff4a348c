//! # History Handlers
//!
//! ## Available Endpoints:
//! - `GET /api/history?search=&type=&sort=` - list entries
//! - `GET /api/history/{id}` - one entry
//! - `GET /api/history/{id}/audio` - the entry's audio, for playback
//! - `GET /api/history/{id}/download` - attachment: the audio of a
//!   transcription, or the text of a synthesis as `.txt`
//! - `DELETE /api/history/{id}` - delete one entry
//! - `DELETE /api/history` - delete everything

use crate::error::{AppError, AppResult};
use crate::history::{download_filename, HistoryEntry, HistoryItem, HistoryQuery, HistorySort, KindFilter};
use crate::state::AppState;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

/// Raw query string; values are parsed so unknown ones can be reported as 400.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub sort: Option<String>,
}

impl HistoryParams {
    fn into_query(self) -> AppResult<HistoryQuery> {
        let kind = match self.kind.as_deref() {
            Some(kind) => kind.parse::<KindFilter>().map_err(AppError::ValidationError)?,
            None => KindFilter::All,
        };
        let sort = match self.sort.as_deref() {
            Some(sort) => sort.parse::<HistorySort>().map_err(AppError::ValidationError)?,
            None => HistorySort::Newest,
        };
        Ok(HistoryQuery {
            search: self.search,
            kind,
            sort,
        })
    }
}

fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(format!("History entry {} not found", raw)))
}

fn find_entry(state: &AppState, raw_id: &str) -> AppResult<HistoryEntry> {
    let id = parse_id(raw_id)?;
    state
        .history
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("History entry {} not found", id)))
}

pub async fn list_history(
    state: web::Data<AppState>,
    params: web::Query<HistoryParams>,
) -> AppResult<HttpResponse> {
    let query = params.into_inner().into_query()?;
    let now = chrono::Utc::now();

    let items: Vec<HistoryItem> = state
        .history
        .query(&query)
        .into_iter()
        .map(|entry| HistoryItem::from_entry(entry, now))
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "total": items.len(),
        "items": items
    })))
}

pub async fn get_history_entry(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let entry = find_entry(&state, &path)?;
    Ok(HttpResponse::Ok().json(HistoryItem::from_entry(entry, chrono::Utc::now())))
}

pub async fn get_history_audio(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let entry = find_entry(&state, &path)?;
    let audio = entry
        .audio
        .ok_or_else(|| AppError::NotFound(format!("History entry {} has no audio", entry.id)))?;

    Ok(HttpResponse::Ok()
        .content_type(audio.content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Inline,
            parameters: vec![DispositionParam::Filename(download_filename(
                &entry.name,
                &audio.extension,
            ))],
        })
        .body(audio.bytes))
}

pub async fn download_history_entry(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let entry = find_entry(&state, &path)?;
    let disposition = ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(entry.download_filename())],
    };

    let response = match entry.download_audio().cloned() {
        Some(audio) => HttpResponse::Ok()
            .content_type(audio.content_type)
            .insert_header(disposition)
            .body(audio.bytes),
        None => HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .insert_header(disposition)
            .body(entry.text_content),
    };
    Ok(response)
}

pub async fn delete_history_entry(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path)?;
    if !state.history.remove(id) {
        return Err(AppError::NotFound(format!("History entry {} not found", id)));
    }
    info!(id = %id, "History entry deleted");
    Ok(HttpResponse::NoContent().finish())
}

pub async fn clear_history(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let removed = state.history.clear();
    info!(removed, "History cleared");
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "removed": removed
    })))
}
