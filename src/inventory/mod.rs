//! Ticket inventory reservation engine.
//!
//! The sole writer of `ticket_plans.available_quantity`. All mutation goes
//! through a single database transaction that takes `SELECT ... FOR UPDATE`
//! row locks on the order and on every referenced plan, so correctness holds
//! across any number of server processes sharing one Postgres instance. Plans
//! are always locked in ascending id order; two orders touching the same pair
//! of plans can therefore never deadlock each other.
//!
//! The engine returns plain results and never publishes events or sends
//! notifications itself. Callers react to the outcome after commit.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{OrderStatus, ReservationState, TicketOrder, TicketOrderItem, TicketPlan};

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("not enough tickets available for '{plan_name}': requested {requested}, available {available}")]
    Insufficient {
        plan_id: Uuid,
        plan_name: String,
        requested: i64,
        available: i32,
    },

    #[error("inventory for order {0} has already been reserved")]
    AlreadyReserved(Uuid),

    #[error("order {order_id} is not open for reservation (current status: {status:?})")]
    NotPending { order_id: Uuid, status: OrderStatus },

    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    /// Lock timeouts, connection loss, constraint violations. Propagated
    /// unchanged; the engine never retries on its own.
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

/// Reserves capacity on every plan referenced by the order, all or nothing.
///
/// The order must be `pending` and in reservation state `unreserved`: a
/// cancelled or completed order is rejected with
/// [`InventoryError::NotPending`], and a second call for the same order with
/// [`InventoryError::AlreadyReserved`] rather than treated as a no-op, so
/// callers cannot silently double-book.
///
/// On success the order's status advances in the same commit: free orders
/// complete on the spot, paid orders move to `processing` to await payment.
/// Reservation state and order status therefore always agree; there is no
/// window where the order holds inventory but still reads as `pending`. On
/// any failure the transaction rolls back and no plan is changed.
pub async fn reserve_inventory(pool: &PgPool, order_id: Uuid) -> Result<(), InventoryError> {
    let mut tx = pool.begin().await?;

    let order = lock_order(&mut tx, order_id)
        .await?
        .ok_or(InventoryError::OrderNotFound(order_id))?;
    if order.reservation_state != ReservationState::Unreserved {
        return Err(InventoryError::AlreadyReserved(order_id));
    }
    if order.status != OrderStatus::Pending {
        return Err(InventoryError::NotPending {
            order_id,
            status: order.status,
        });
    }

    let items = fetch_items(&mut tx, order_id).await?;
    let wanted = requested_per_plan(&items);

    // Take every plan lock before evaluating any quantity. BTreeMap keys
    // iterate in ascending id order, which fixes the lock order globally.
    let mut plans = Vec::with_capacity(wanted.len());
    for plan_id in wanted.keys() {
        plans.push(lock_plan(&mut tx, *plan_id).await?);
    }

    let mut remaining = Vec::with_capacity(plans.len());
    for plan in &plans {
        let requested = wanted[&plan.id];
        match remaining_after(plan.available_quantity, requested) {
            Some(left) => remaining.push((plan.id, left)),
            None => {
                // Dropping the transaction rolls everything back.
                return Err(InventoryError::Insufficient {
                    plan_id: plan.id,
                    plan_name: plan.name.clone(),
                    requested,
                    available: plan.available_quantity,
                });
            }
        }
    }

    for (plan_id, left) in remaining {
        write_availability(&mut tx, plan_id, left).await?;
    }

    let next_status = status_after_reserve(order.total);
    let completed_at = if next_status == OrderStatus::Completed {
        Some(Utc::now())
    } else {
        None
    };
    sqlx::query(
        "UPDATE ticket_orders \
         SET reservation_state = $2, status = $3, completed_at = $4, updated_at = now() \
         WHERE id = $1",
    )
    .bind(order_id)
    .bind(ReservationState::Reserved)
    .bind(next_status)
    .bind(completed_at)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(%order_id, plans = wanted.len(), status = ?next_status, "inventory reserved");
    Ok(())
}

/// Returns previously reserved capacity to the referenced plans.
///
/// Idempotent: an order whose inventory was never reserved, or was already
/// released, is a no-op success. Restocked quantities are clamped at each
/// plan's `max_quantity` so a plan can never end up above its ceiling.
pub async fn release_inventory(pool: &PgPool, order_id: Uuid) -> Result<(), InventoryError> {
    let mut tx = pool.begin().await?;
    release_inventory_in_tx(&mut tx, order_id).await?;
    tx.commit().await?;
    Ok(())
}

/// Same as [`release_inventory`] but joins the caller's transaction, so the
/// release commits together with the caller's own order updates (e.g. the
/// cancellation status write) instead of in a second transaction.
pub async fn release_inventory_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<(), InventoryError> {
    let order = lock_order(tx, order_id)
        .await?
        .ok_or(InventoryError::OrderNotFound(order_id))?;
    if order.reservation_state != ReservationState::Reserved {
        tracing::debug!(
            %order_id,
            state = ?order.reservation_state,
            "release skipped: no reservation to undo"
        );
        return Ok(());
    }

    let items = fetch_items(tx, order_id).await?;
    let held = requested_per_plan(&items);

    for (plan_id, quantity) in &held {
        let plan = lock_plan(tx, *plan_id).await?;
        let restocked = clamped_restock(plan.available_quantity, plan.max_quantity, *quantity);
        write_availability(tx, plan.id, restocked).await?;
    }
    set_reservation_state(tx, order_id, ReservationState::Released).await?;

    tracing::info!(%order_id, plans = held.len(), "inventory released");
    Ok(())
}

/// Sums requested quantity per distinct plan across the order's items. The
/// `BTreeMap` keeps plan ids sorted, which the callers rely on for their
/// lock ordering.
fn requested_per_plan(items: &[TicketOrderItem]) -> BTreeMap<Uuid, i64> {
    let mut wanted = BTreeMap::new();
    for item in items {
        *wanted.entry(item.ticket_plan_id).or_insert(0) += i64::from(item.quantity);
    }
    wanted
}

/// Availability left after granting `requested` units, or `None` if the
/// plan cannot cover the request.
fn remaining_after(available: i32, requested: i64) -> Option<i32> {
    let left = i64::from(available) - requested;
    if left < 0 {
        None
    } else {
        // left <= available <= i32::MAX
        Some(left as i32)
    }
}

/// New availability after returning `released` units, clamped to the plan's
/// ceiling so a double-release can never push it past `max`.
fn clamped_restock(available: i32, max: i32, released: i64) -> i32 {
    let restocked = i64::from(available) + released;
    if restocked > i64::from(max) {
        max
    } else {
        restocked as i32
    }
}

/// Where a freshly reserved order goes next: zero-total orders have nothing
/// to collect and complete immediately, everything else awaits payment.
fn status_after_reserve(total: Decimal) -> OrderStatus {
    if total.is_zero() {
        OrderStatus::Completed
    } else {
        OrderStatus::Processing
    }
}

async fn lock_order(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<Option<TicketOrder>, sqlx::Error> {
    sqlx::query_as::<_, TicketOrder>(
        "SELECT id, event_id, purchaser_id, status, reservation_state, \
             subtotal, fees, discount, total, payment_status, promo_code, \
             completed_at, created_at, updated_at \
         FROM ticket_orders WHERE id = $1 FOR UPDATE",
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await
}

async fn lock_plan(
    tx: &mut Transaction<'_, Postgres>,
    plan_id: Uuid,
) -> Result<TicketPlan, sqlx::Error> {
    sqlx::query_as::<_, TicketPlan>(
        "SELECT id, event_id, name, description, unit_price, max_quantity, \
             available_quantity, active, created_at, updated_at \
         FROM ticket_plans WHERE id = $1 FOR UPDATE",
    )
    .bind(plan_id)
    .fetch_one(&mut **tx)
    .await
}

async fn fetch_items(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<Vec<TicketOrderItem>, sqlx::Error> {
    sqlx::query_as::<_, TicketOrderItem>(
        "SELECT id, order_id, ticket_plan_id, quantity, unit_price, total_price, created_at \
         FROM ticket_order_items WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_all(&mut **tx)
    .await
}

async fn write_availability(
    tx: &mut Transaction<'_, Postgres>,
    plan_id: Uuid,
    available: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE ticket_plans SET available_quantity = $2, updated_at = now() WHERE id = $1")
        .bind(plan_id)
        .bind(available)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn set_reservation_state(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    state: ReservationState,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE ticket_orders SET reservation_state = $2, updated_at = now() WHERE id = $1")
        .bind(order_id)
        .bind(state)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(plan_id: Uuid, quantity: i32) -> TicketOrderItem {
        TicketOrderItem {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            ticket_plan_id: plan_id,
            quantity,
            unit_price: Decimal::ZERO,
            total_price: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn aggregates_quantities_per_plan() {
        let plan_a = Uuid::new_v4();
        let plan_b = Uuid::new_v4();
        let wanted = requested_per_plan(&[item(plan_a, 2), item(plan_b, 1), item(plan_a, 3)]);
        assert_eq!(wanted[&plan_a], 5);
        assert_eq!(wanted[&plan_b], 1);
        assert_eq!(wanted.len(), 2);
    }

    #[test]
    fn plan_ids_come_out_sorted() {
        let mut ids: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();
        let items: Vec<TicketOrderItem> = ids.iter().map(|id| item(*id, 1)).collect();
        let wanted = requested_per_plan(&items);
        ids.sort();
        let locked: Vec<Uuid> = wanted.keys().copied().collect();
        assert_eq!(locked, ids);
    }

    #[test]
    fn remaining_after_covers_exact_fit() {
        assert_eq!(remaining_after(2, 2), Some(0));
        assert_eq!(remaining_after(10, 3), Some(7));
    }

    #[test]
    fn remaining_after_detects_shortfall() {
        assert_eq!(remaining_after(0, 1), None);
        assert_eq!(remaining_after(2, 3), None);
    }

    #[test]
    fn restock_restores_previous_availability() {
        assert_eq!(clamped_restock(8, 10, 2), 10);
        assert_eq!(clamped_restock(0, 2, 2), 2);
    }

    #[test]
    fn restock_never_exceeds_ceiling() {
        assert_eq!(clamped_restock(9, 10, 5), 10);
        assert_eq!(clamped_restock(10, 10, 1), 10);
    }

    #[test]
    fn free_order_completes_immediately_after_reserve() {
        assert_eq!(status_after_reserve(Decimal::ZERO), OrderStatus::Completed);
    }

    #[test]
    fn paid_order_awaits_payment_after_reserve() {
        assert_eq!(status_after_reserve(dec!(10.00)), OrderStatus::Processing);
    }
}
