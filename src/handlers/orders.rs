use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inventory;
use crate::models::{
    OrderStatus, OrderTotals, PaymentStatus, TicketOrder, TicketOrderItem, TicketPlan,
};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub purchaser_id: Uuid,
    pub promo_code: Option<String>,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub ticket_plan_id: Uuid,
    pub quantity: i32,
}

#[derive(Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: TicketOrder,
    pub items: Vec<TicketOrderItem>,
}

const ORDER_COLUMNS: &str = "id, event_id, purchaser_id, status, reservation_state, \
    subtotal, fees, discount, total, payment_status, promo_code, \
    completed_at, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, ticket_plan_id, quantity, unit_price, total_price, created_at";

/// Creates a pending order, snapshotting each plan's current unit price
/// into the line items. No inventory is touched here; that happens on the
/// explicit reserve call.
pub async fn create_order(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Response, AppError> {
    validate_items(&req.items).map_err(AppError::Validation)?;

    let mut tx = state.pool.begin().await?;

    let mut line_totals = Vec::with_capacity(req.items.len());
    let mut priced_items = Vec::with_capacity(req.items.len());
    for item in &req.items {
        let plan = sqlx::query_as::<_, TicketPlan>(
            "SELECT id, event_id, name, description, unit_price, max_quantity, \
                 available_quantity, active, created_at, updated_at \
             FROM ticket_plans WHERE id = $1",
        )
        .bind(item.ticket_plan_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ticket plan {}", item.ticket_plan_id)))?;

        if plan.event_id != event_id {
            return Err(AppError::Validation(format!(
                "ticket plan '{}' does not belong to event {event_id}",
                plan.name
            )));
        }
        if !plan.active {
            return Err(AppError::Validation(format!(
                "ticket plan '{}' is no longer on sale",
                plan.name
            )));
        }

        let total_price = plan.unit_price * Decimal::from(item.quantity);
        line_totals.push(total_price);
        priced_items.push((plan.id, item.quantity, plan.unit_price, total_price));
    }

    // Promo evaluation lives in the discount engine; here the code is only
    // snapshotted onto the order.
    let totals = OrderTotals::compute(&line_totals, Decimal::ZERO, Decimal::ZERO)
        .map_err(AppError::Validation)?;

    let order = sqlx::query_as::<_, TicketOrder>(&format!(
        "INSERT INTO ticket_orders (event_id, purchaser_id, subtotal, fees, discount, total, promo_code) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {ORDER_COLUMNS}",
    ))
    .bind(event_id)
    .bind(req.purchaser_id)
    .bind(totals.subtotal)
    .bind(totals.fees)
    .bind(totals.discount)
    .bind(totals.total)
    .bind(&req.promo_code)
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(priced_items.len());
    for (plan_id, quantity, unit_price, total_price) in priced_items {
        let item = sqlx::query_as::<_, TicketOrderItem>(&format!(
            "INSERT INTO ticket_order_items (order_id, ticket_plan_id, quantity, unit_price, total_price) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ITEM_COLUMNS}",
        ))
        .bind(order.id)
        .bind(plan_id)
        .bind(quantity)
        .bind(unit_price)
        .bind(total_price)
        .fetch_one(&mut *tx)
        .await?;
        items.push(item);
    }

    tx.commit().await?;

    tracing::info!(order_id = %order.id, %event_id, items = items.len(), "order created");
    Ok(created(OrderWithItems { order, items }, "Order created").into_response())
}

/// Runs the reservation engine for the order. The engine advances the
/// order's status in the same transaction as the decrement: free orders
/// complete on the spot, paid orders move to processing to await payment.
pub async fn reserve_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    inventory::reserve_inventory(&state.pool, order_id).await?;

    let order = fetch_order(&state.pool, order_id).await?;
    let message = match order.status {
        OrderStatus::Completed => "Order completed",
        _ => "Inventory reserved, awaiting payment",
    };
    Ok(success(order, message).into_response())
}

/// Payment-processor callback boundary: confirms payment for an order that
/// already holds its inventory.
pub async fn complete_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let order = fetch_order(&state.pool, order_id).await?;
    if order.status != OrderStatus::Processing {
        return Err(AppError::Conflict(format!(
            "order {order_id} is not awaiting payment"
        )));
    }

    let order = sqlx::query_as::<_, TicketOrder>(&format!(
        "UPDATE ticket_orders \
         SET status = $2, payment_status = $3, completed_at = $4, updated_at = now() \
         WHERE id = $1 AND status = 'processing' RETURNING {ORDER_COLUMNS}",
    ))
    .bind(order_id)
    .bind(OrderStatus::Completed)
    .bind(PaymentStatus::Paid)
    .bind(Utc::now())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::Conflict(format!("order {order_id} is not awaiting payment")))?;

    tracing::info!(%order_id, "order completed");
    Ok(success(order, "Order completed").into_response())
}

/// Cancels (or refunds, if already completed) an order and returns its
/// reserved inventory to the plans. The status write and the release share
/// one transaction, so a failed call leaves nothing half-done; repeating a
/// cancel on a terminal order keeps its state and re-runs the release as a
/// no-op.
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let mut tx = state.pool.begin().await?;

    let order = sqlx::query_as::<_, TicketOrder>(&format!(
        "SELECT {ORDER_COLUMNS} FROM ticket_orders WHERE id = $1 FOR UPDATE",
    ))
    .bind(order_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;

    let (next_status, next_payment) = cancellation_outcome(order.status, order.payment_status);

    let order = sqlx::query_as::<_, TicketOrder>(&format!(
        "UPDATE ticket_orders SET status = $2, payment_status = $3, updated_at = now() \
         WHERE id = $1 RETURNING {ORDER_COLUMNS}",
    ))
    .bind(order_id)
    .bind(next_status)
    .bind(next_payment)
    .fetch_one(&mut *tx)
    .await?;

    inventory::release_inventory_in_tx(&mut tx, order_id).await?;
    tx.commit().await?;

    tracing::info!(%order_id, status = ?order.status, "order cancelled");
    Ok(success(order, "Order cancelled").into_response())
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let order = fetch_order(&state.pool, order_id).await?;
    let items = sqlx::query_as::<_, TicketOrderItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM ticket_order_items WHERE order_id = $1 ORDER BY created_at",
    ))
    .bind(order_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(success(OrderWithItems { order, items }, "Order retrieved").into_response())
}

async fn fetch_order(pool: &sqlx::PgPool, order_id: Uuid) -> Result<TicketOrder, AppError> {
    sqlx::query_as::<_, TicketOrder>(&format!(
        "SELECT {ORDER_COLUMNS} FROM ticket_orders WHERE id = $1",
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))
}

fn validate_items(items: &[OrderItemRequest]) -> Result<(), String> {
    if items.is_empty() {
        return Err("order must contain at least one item".to_string());
    }
    for item in items {
        if item.quantity <= 0 {
            return Err(format!(
                "quantity for ticket plan {} must be a positive integer",
                item.ticket_plan_id
            ));
        }
    }
    Ok(())
}

fn cancellation_outcome(
    status: OrderStatus,
    payment: PaymentStatus,
) -> (OrderStatus, PaymentStatus) {
    match status {
        OrderStatus::Pending | OrderStatus::Processing => (OrderStatus::Cancelled, payment),
        OrderStatus::Completed => {
            let payment = if payment == PaymentStatus::Paid {
                PaymentStatus::Refunded
            } else {
                payment
            };
            (OrderStatus::Refunded, payment)
        }
        terminal => (terminal, payment),
    }
}
