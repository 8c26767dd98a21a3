use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::inventory::InventoryError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("not enough tickets available for '{plan_name}': requested {requested}, available {available}")]
    InsufficientInventory {
        plan_name: String,
        requested: i64,
        available: i32,
    },

    #[error("inventory for order {0} has already been reserved")]
    AlreadyReserved(Uuid),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientInventory { .. } => StatusCode::CONFLICT,
            AppError::AlreadyReserved(_) => StatusCode::CONFLICT,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InsufficientInventory { .. } => "INSUFFICIENT_INVENTORY",
            AppError::AlreadyReserved(_) => "ALREADY_RESERVED",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Database(_) => "DATABASE_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::Database(e) => {
                error!(error = ?e, "Database error");
            }
            other => {
                warn!(code = other.code(), message = %other, "Request rejected");
            }
        }
    }
}

/// Inventory outcomes surfaced over HTTP. Insufficient inventory and a
/// duplicate reservation are client-visible business errors; anything
/// infrastructural stays a generic 500.
impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::Insufficient {
                plan_name,
                requested,
                available,
                ..
            } => AppError::InsufficientInventory {
                plan_name,
                requested,
                available,
            },
            InventoryError::AlreadyReserved(id) => AppError::AlreadyReserved(id),
            InventoryError::NotPending { .. } => AppError::Conflict(err.to_string()),
            InventoryError::OrderNotFound(id) => AppError::NotFound(format!("order {id}")),
            InventoryError::Database(e) => AppError::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        // Internal details never reach the client.
        let public_message = match &self {
            AppError::Database(_) => "A database error occurred, please try again".to_string(),
            other => other.to_string(),
        };

        error_response(code, public_message, None, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_inventory_maps_to_conflict() {
        let err: AppError = InventoryError::Insufficient {
            plan_id: Uuid::new_v4(),
            plan_name: "General Admission".to_string(),
            requested: 2,
            available: 0,
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "INSUFFICIENT_INVENTORY");
        assert!(err.to_string().contains("General Admission"));
    }

    #[test]
    fn missing_order_maps_to_not_found() {
        let err: AppError = InventoryError::OrderNotFound(Uuid::new_v4()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn non_pending_order_maps_to_conflict() {
        let err: AppError = InventoryError::NotPending {
            order_id: Uuid::new_v4(),
            status: crate::models::OrderStatus::Cancelled,
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.to_string().contains("not open for reservation"));
    }

    #[test]
    fn duplicate_reservation_maps_to_conflict() {
        let err: AppError = InventoryError::AlreadyReserved(Uuid::new_v4()).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "ALREADY_RESERVED");
    }
}
