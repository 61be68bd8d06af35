//! # REST API for Data Export
//!
//! The CSV can be fetched as JSON (content plus suggested filename) or as a
//! file download.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use log::info;
use serde::Deserialize;
use shared::{ExportRequest, RangePreset};

use super::error_response;
use crate::backend::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/csv", post(export_csv))
        .route("/download", get(download_csv))
}

/// Query form of an export request; a preset overrides `from` and `to`
#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub feeding: bool,
    #[serde(default)]
    pub toilet: bool,
    #[serde(default)]
    pub diary: bool,
    pub from: Option<String>,
    pub to: Option<String>,
    pub preset: Option<RangePreset>,
}

pub async fn export_csv(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> impl IntoResponse {
    info!("POST /api/export/csv - request: {:?}", request);

    match state.export_service.export(&request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => error_response("Export", e),
    }
}

pub async fn download_csv(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> impl IntoResponse {
    info!("GET /api/export/download - {:?}", query);

    let mut request = ExportRequest {
        feeding: query.feeding,
        toilet: query.toilet,
        diary: query.diary,
        from: query.from,
        to: query.to,
    };
    if let Some(preset) = query.preset {
        state.export_service.apply_preset(&mut request, preset);
    }

    match state.export_service.export(&request).await {
        Ok(response) => {
            let headers = [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", response.filename),
                ),
            ];
            (StatusCode::OK, headers, response.csv_content).into_response()
        }
        Err(e) => error_response("Export", e),
    }
}
