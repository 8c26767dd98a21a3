use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::TicketPlan;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Deserialize)]
pub struct CreatePlanRequest {
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Decimal,
    pub max_quantity: i32,
}

/// Defines a new ticket tier for an event. Availability starts at the full
/// capacity ceiling.
pub async fn create_plan(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<CreatePlanRequest>,
) -> Result<Response, AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("plan name must not be empty".to_string()));
    }
    TicketPlan::validate_new(req.unit_price, req.max_quantity).map_err(AppError::Validation)?;

    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM events WHERE id = $1)")
        .bind(event_id)
        .fetch_one(&state.pool)
        .await?;
    if !exists {
        return Err(AppError::NotFound(format!("event {event_id}")));
    }

    let plan = sqlx::query_as::<_, TicketPlan>(
        "INSERT INTO ticket_plans (event_id, name, description, unit_price, max_quantity, available_quantity) \
         VALUES ($1, $2, $3, $4, $5, $5) \
         RETURNING id, event_id, name, description, unit_price, max_quantity, \
             available_quantity, active, created_at, updated_at",
    )
    .bind(event_id)
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.unit_price)
    .bind(req.max_quantity)
    .fetch_one(&state.pool)
    .await?;

    Ok(created(plan, "Ticket plan created").into_response())
}

pub async fn list_event_plans(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let plans = sqlx::query_as::<_, TicketPlan>(
        "SELECT id, event_id, name, description, unit_price, max_quantity, \
             available_quantity, active, created_at, updated_at \
         FROM ticket_plans WHERE event_id = $1 ORDER BY created_at",
    )
    .bind(event_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(success(plans, "Ticket plans retrieved").into_response())
}

/// Non-locking read. The availability shown here is a display hint and may
/// be stale by the time an order is placed; the reservation engine makes
/// the authoritative call under its row lock.
pub async fn get_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let plan = sqlx::query_as::<_, TicketPlan>(
        "SELECT id, event_id, name, description, unit_price, max_quantity, \
             available_quantity, active, created_at, updated_at \
         FROM ticket_plans WHERE id = $1",
    )
    .bind(plan_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("ticket plan {plan_id}")))?;

    Ok(success(plan, "Ticket plan retrieved").into_response())
}
