//! # REST API for Toilet Events

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get},
    Router,
};
use log::info;
use shared::CreateToiletRequest;

use super::{error_response, overview_response, resolve_date, DateQuery};
use crate::backend::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_toilet_events).post(create_toilet_event))
        .route("/:id", delete(delete_toilet_event))
}

pub async fn list_toilet_events(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> impl IntoResponse {
    info!("GET /api/toilet - {:?}", query);
    let date = match resolve_date(&state, &query) {
        Ok(date) => date,
        Err(response) => return response,
    };

    match state.toilet_service.list_for_date(date).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(e) => error_response("Loading toilet events", e),
    }
}

pub async fn create_toilet_event(
    State(state): State<AppState>,
    Json(request): Json<CreateToiletRequest>,
) -> impl IntoResponse {
    info!("POST /api/toilet - request: {:?}", request);

    match state.toilet_service.record(request).await {
        Ok(entry) => {
            let date = state.overview_service.date_of(entry.event_at);
            overview_response(&state, date, StatusCode::CREATED).await
        }
        Err(e) => error_response("Saving the toilet event", e),
    }
}

pub async fn delete_toilet_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DateQuery>,
) -> impl IntoResponse {
    info!("DELETE /api/toilet/{}", id);
    let date = match resolve_date(&state, &query) {
        Ok(date) => date,
        Err(response) => return response,
    };

    match state.toilet_service.delete(&id).await {
        Ok(()) => overview_response(&state, date, StatusCode::OK).await,
        Err(e) => error_response("Deleting the toilet event", e),
    }
}
