//! # REST API for Feedings

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use log::info;
use shared::{CreateFeedingRequest, MarkSlotRequest};

use super::{error_response, overview_response, resolve_date, DateQuery};
use crate::backend::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_feedings).post(create_feeding))
        .route("/manual", post(mark_slot))
        .route("/:id", delete(delete_feeding))
}

/// Feedings of a day, newest first
pub async fn list_feedings(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> impl IntoResponse {
    info!("GET /api/feedings - {:?}", query);
    let date = match resolve_date(&state, &query) {
        Ok(date) => date,
        Err(response) => return response,
    };

    match state.feeding_service.list_for_date(date).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(e) => error_response("Loading feedings", e),
    }
}

pub async fn create_feeding(
    State(state): State<AppState>,
    Json(request): Json<CreateFeedingRequest>,
) -> impl IntoResponse {
    info!("POST /api/feedings - request: {:?}", request);

    match state.feeding_service.record(request).await {
        Ok(entry) => {
            let date = state.overview_service.date_of(entry.fed_at);
            overview_response(&state, date, StatusCode::CREATED).await
        }
        Err(e) => error_response("Saving the feeding", e),
    }
}

/// Confirm a past slot without a feeding
pub async fn mark_slot(
    State(state): State<AppState>,
    Json(request): Json<MarkSlotRequest>,
) -> impl IntoResponse {
    info!("POST /api/feedings/manual - request: {:?}", request);
    let date = request.date;

    match state.feeding_service.mark_slot(request).await {
        Ok(_) => overview_response(&state, date, StatusCode::CREATED).await,
        Err(e) => error_response("Marking the slot", e),
    }
}

pub async fn delete_feeding(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DateQuery>,
) -> impl IntoResponse {
    info!("DELETE /api/feedings/{}", id);
    let date = match resolve_date(&state, &query) {
        Ok(date) => date,
        Err(response) => return response,
    };

    match state.feeding_service.delete(&id).await {
        Ok(()) => overview_response(&state, date, StatusCode::OK).await,
        Err(e) => error_response("Deleting the feeding", e),
    }
}
