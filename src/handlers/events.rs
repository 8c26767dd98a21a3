use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::Event;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
}

pub async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<Response, AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("event title must not be empty".to_string()));
    }

    let event = sqlx::query_as::<_, Event>(
        "INSERT INTO events (title, location, starts_at) VALUES ($1, $2, $3) \
         RETURNING id, title, location, starts_at, created_at, updated_at",
    )
    .bind(&req.title)
    .bind(&req.location)
    .bind(req.starts_at)
    .fetch_one(&state.pool)
    .await?;

    Ok(created(event, "Event created").into_response())
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = sqlx::query_as::<_, Event>(
        "SELECT id, title, location, starts_at, created_at, updated_at \
         FROM events WHERE id = $1",
    )
    .bind(event_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("event {event_id}")))?;

    Ok(success(event, "Event retrieved").into_response())
}
