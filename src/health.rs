//! Service status endpoints: root banner, health report and detailed metrics.

use crate::audio::ALLOWED_UPLOAD_EXTENSIONS;
use crate::config::AppConfig;
use crate::providers::voices::{AVAILABLE_VOICES, SUPPORTED_LANGUAGES};
use crate::state::{AppMetrics, AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "SenseVoice API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();
    let uptime_seconds = state.get_uptime_seconds();

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": "sensevoice-api",
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "providers": {
            "speech": {
                "name": state.speech.name(),
                "configured": state.speech.is_configured(),
                "tts_model": config.speech.tts_model,
                "asr_model": config.speech.asr_model
            },
            "text": {
                "name": state.text.name(),
                "configured": state.text.is_configured(),
                "model": config.text.model
            }
        },
        "supported_languages": SUPPORTED_LANGUAGES,
        "available_voices": AVAILABLE_VOICES,
        "supported_formats": ALLOWED_UPLOAD_EXTENSIONS,
        "max_upload_mb": config.audio.max_upload_mb,
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": metrics.error_rate(),
            "active_transcriptions": metrics.active_transcriptions,
            "history_entries": state.history.len()
        },
        "memory": get_memory_info(),
        "system": get_system_status(&config, &metrics)
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats: Vec<_> = metrics
        .endpoint_metrics
        .iter()
        .map(|(endpoint, metric)| {
            json!({
                "endpoint": endpoint,
                "request_count": metric.request_count,
                "error_count": metric.error_count,
                "error_rate": metric.error_rate(),
                "average_duration_ms": metric.average_duration_ms(),
                "total_duration_ms": metric.total_duration_ms
            })
        })
        .collect();
    endpoint_stats.sort_by(|a, b| a["endpoint"].as_str().cmp(&b["endpoint"].as_str()));

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": metrics.error_rate(),
            "active_transcriptions": metrics.active_transcriptions,
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "endpoints": endpoint_stats,
        "memory": get_memory_info(),
        "performance": {
            "max_concurrent_transcriptions": state.get_config().performance.max_concurrent_transcriptions
        }
    }))
}

/// Resident and virtual memory of this process, read from `/proc` on Linux.
fn get_memory_info() -> serde_json::Value {
    #[cfg(target_os = "linux")]
    {
        let path = format!("/proc/{}/status", std::process::id());
        if let Ok(status) = std::fs::read_to_string(path) {
            let mut vm_rss = 0;
            let mut vm_size = 0;

            for line in status.lines() {
                let kb = || {
                    line.split_whitespace()
                        .nth(1)
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(0)
                        * 1024
                };
                if line.starts_with("VmRSS:") {
                    vm_rss = kb();
                } else if line.starts_with("VmSize:") {
                    vm_size = kb();
                }
            }

            return json!({
                "resident_memory_bytes": vm_rss,
                "virtual_memory_bytes": vm_size,
                "available": true
            });
        }
    }

    json!({
        "resident_memory_bytes": 0,
        "virtual_memory_bytes": 0,
        "available": false,
        "note": "Memory info not available on this platform"
    })
}

fn get_system_status(config: &AppConfig, metrics: &AppMetrics) -> serde_json::Value {
    let limit = config.performance.max_concurrent_transcriptions;
    let usage = if limit > 0 {
        metrics.active_transcriptions as f64 / limit as f64
    } else {
        0.0
    };

    let status = if usage > 0.9 {
        "high_load"
    } else if usage > 0.7 {
        "moderate_load"
    } else {
        "normal"
    };

    json!({
        "status": status,
        "transcription_usage_percent": (usage * 100.0).round(),
        "max_transcriptions": limit,
        "current_transcriptions": metrics.active_transcriptions,
        "load_warnings": if usage > 0.8 {
            vec!["High provider usage - consider increasing max_concurrent_transcriptions"]
        } else {
            vec![]
        }
    })
}
