//! # REST API for the Day Overview
//!
//! Storage mode, the combined day view and the slot board.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use log::info;

use super::{error_response, resolve_date, DateQuery};
use crate::backend::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/storage", get(get_storage_info))
        .route("/overview", get(get_overview))
        .route("/slots", get(get_slots))
}

/// Which backend is active
pub async fn get_storage_info(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/storage");
    (StatusCode::OK, Json(state.storage_info.clone()))
}

pub async fn get_overview(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> impl IntoResponse {
    info!("GET /api/overview - {:?}", query);
    let date = match resolve_date(&state, &query) {
        Ok(date) => date,
        Err(response) => return response,
    };

    match state.overview_service.overview(date).await {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(e) => error_response("Loading the overview", e),
    }
}

pub async fn get_slots(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> impl IntoResponse {
    info!("GET /api/slots - {:?}", query);
    let date = match resolve_date(&state, &query) {
        Ok(date) => date,
        Err(response) => return response,
    };

    match state.feeding_service.board(date).await {
        Ok(board) => (StatusCode::OK, Json(board)).into_response(),
        Err(e) => error_response("Loading the slots", e),
    }
}
