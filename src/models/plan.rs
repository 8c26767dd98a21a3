use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One purchasable tier of one event, with a fixed capacity ceiling.
///
/// `available_quantity` is the authoritative inventory counter. It is only
/// ever written by the reservation engine, inside a row-locked transaction;
/// everything else reads it without locking and may observe stale values.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketPlan {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Decimal,
    pub max_quantity: i32,
    pub available_quantity: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketPlan {
    /// Validates organizer-supplied fields at tier-creation time.
    pub fn validate_new(unit_price: Decimal, max_quantity: i32) -> Result<(), String> {
        if unit_price < Decimal::ZERO {
            return Err("unit price must not be negative".to_string());
        }
        if max_quantity <= 0 {
            return Err("max quantity must be a positive integer".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn accepts_free_tier() {
        assert!(TicketPlan::validate_new(Decimal::ZERO, 50).is_ok());
    }

    #[test]
    fn rejects_negative_price() {
        assert!(TicketPlan::validate_new(dec!(-0.01), 10).is_err());
    }

    #[test]
    fn rejects_non_positive_capacity() {
        assert!(TicketPlan::validate_new(dec!(25.00), 0).is_err());
        assert!(TicketPlan::validate_new(dec!(25.00), -3).is_err());
    }
}
