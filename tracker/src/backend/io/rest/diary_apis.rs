//! # REST API for the Family Diary

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use log::info;
use shared::CreateDiaryRequest;

use super::{error_response, overview_response, resolve_date, DateQuery};
use crate::backend::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_diary_entry))
        .route("/timeline", get(get_timeline))
        .route("/:id", delete(delete_diary_entry))
}

/// Entries grouped by day, newest first
pub async fn get_timeline(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/diary/timeline");

    match state.diary_service.timeline().await {
        Ok(timeline) => (StatusCode::OK, Json(timeline)).into_response(),
        Err(e) => error_response("Loading the diary", e),
    }
}

pub async fn create_diary_entry(
    State(state): State<AppState>,
    Json(request): Json<CreateDiaryRequest>,
) -> impl IntoResponse {
    info!("POST /api/diary - entry_date: {:?}", request.entry_date);

    match state.diary_service.record(request).await {
        Ok(entry) => {
            overview_response(&state, entry.entry_date, StatusCode::CREATED).await
        }
        Err(e) => error_response("Saving the diary entry", e),
    }
}

pub async fn delete_diary_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DateQuery>,
) -> impl IntoResponse {
    info!("DELETE /api/diary/{}", id);
    let date = match resolve_date(&state, &query) {
        Ok(date) => date,
        Err(response) => return response,
    };

    match state.diary_service.delete(&id).await {
        Ok(()) => overview_response(&state, date, StatusCode::OK).await,
        Err(e) => error_response("Deleting the diary entry", e),
    }
}
