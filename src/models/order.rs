use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
}

/// Where an order sits in the inventory lifecycle.
///
/// Transitions are strictly `Unreserved -> Reserved -> Released`; there is
/// no path from `Unreserved` straight to `Released` and no re-reservation
/// once an order has left `Unreserved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reservation_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReservationState {
    Unreserved,
    Reserved,
    Released,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketOrder {
    pub id: Uuid,
    pub event_id: Uuid,
    pub purchaser_id: Uuid,
    pub status: OrderStatus,
    pub reservation_state: ReservationState,
    pub subtotal: Decimal,
    pub fees: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub payment_status: PaymentStatus,
    pub promo_code: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketOrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub ticket_plan_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Monetary breakdown of an order, computed once at creation time from the
/// snapshotted line-item prices. Invariant: `total = subtotal + fees -
/// discount` and `total >= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub fees: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    pub fn compute(
        line_totals: &[Decimal],
        fees: Decimal,
        discount: Decimal,
    ) -> Result<Self, String> {
        let subtotal: Decimal = line_totals.iter().sum();
        let total = subtotal + fees - discount;
        if total < Decimal::ZERO {
            return Err(format!(
                "order total would be negative ({total}): discount exceeds subtotal plus fees"
            ));
        }
        Ok(Self {
            subtotal,
            fees,
            discount,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn total_is_subtotal_plus_fees_minus_discount() {
        let totals =
            OrderTotals::compute(&[dec!(30.00), dec!(20.00)], dec!(2.50), dec!(5.00)).unwrap();
        assert_eq!(totals.subtotal, dec!(50.00));
        assert_eq!(totals.total, dec!(47.50));
    }

    #[test]
    fn free_order_has_zero_total() {
        let totals = OrderTotals::compute(&[Decimal::ZERO], Decimal::ZERO, Decimal::ZERO).unwrap();
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn rejects_discount_exceeding_order_value() {
        let err = OrderTotals::compute(&[dec!(10.00)], Decimal::ZERO, dec!(15.00));
        assert!(err.is_err());
    }

    #[test]
    fn empty_order_sums_to_zero() {
        let totals = OrderTotals::compute(&[], Decimal::ZERO, Decimal::ZERO).unwrap();
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }
}
