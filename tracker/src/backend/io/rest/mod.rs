//! # REST API Interface Layer
//!
//! JSON endpoints over the domain services. Handlers log the request, call
//! one service and translate the outcome:
//!
//! - validation and export errors become `400 Bad Request`
//! - failures of the remote store become `502 Bad Gateway`
//! - everything else is a `500 Internal Server Error`
//!
//! Error bodies are `{"error": "<operation> failed: <message>"}`. Every
//! mutation answers with the refreshed overview of the affected day.

pub mod diary_apis;
pub mod export_apis;
pub mod feeding_apis;
pub mod overview_apis;
pub mod toilet_apis;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use log::error;
use serde::Deserialize;
use shared::{CalendarDate, ErrorResponse};

use crate::backend::domain::{ExportError, ValidationError};
use crate::backend::storage::StorageError;
use crate::backend::AppState;

/// Reported when a mutation succeeded but the refreshed day could not be loaded
pub const RELOAD_OPERATION: &str = "Reloading the overview";

/// `?date=YYYY-MM-DD`, today when absent
#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

pub fn status_for(err: &anyhow::Error) -> StatusCode {
    if err.downcast_ref::<ValidationError>().is_some() || err.downcast_ref::<ExportError>().is_some() {
        return StatusCode::BAD_REQUEST;
    }
    match err.downcast_ref::<StorageError>() {
        Some(StorageError::Remote { .. }) | Some(StorageError::Http(_)) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(operation: &str, err: anyhow::Error) -> Response {
    let status = status_for(&err);
    error!("❌ {} failed ({}): {:#}", operation, status, err);
    let body = ErrorResponse {
        error: format!("{} failed: {:#}", operation, err),
    };
    (status, Json(body)).into_response()
}

/// Resolve the optional `date` parameter against today
pub fn resolve_date(state: &AppState, query: &DateQuery) -> Result<CalendarDate, Response> {
    match query.date.as_deref().map(str::trim) {
        None | Some("") => Ok(state.overview_service.today()),
        Some(raw) => raw.parse::<CalendarDate>().map_err(|e| {
            error_response("Reading the date", ValidationError::InvalidValue(e).into())
        }),
    }
}

/// Answer a completed mutation with the overview of `date`
pub async fn overview_response(state: &AppState, date: CalendarDate, status: StatusCode) -> Response {
    match state.overview_service.overview(date).await {
        Ok(overview) => (status, Json(overview)).into_response(),
        Err(e) => error_response(RELOAD_OPERATION, e),
    }
}
