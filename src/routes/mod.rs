use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{events, health_check, orders, plans};
use crate::state::AppState;

pub fn create_routes(pool: PgPool) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", post(events::create_event))
        .route("/events/:event_id", get(events::get_event))
        .route(
            "/events/:event_id/plans",
            post(plans::create_plan).get(plans::list_event_plans),
        )
        .route("/plans/:plan_id", get(plans::get_plan))
        .route("/events/:event_id/orders", post(orders::create_order))
        .route("/orders/:order_id", get(orders::get_order))
        .route("/orders/:order_id/reserve", post(orders::reserve_order))
        .route("/orders/:order_id/complete", post(orders::complete_order))
        .route("/orders/:order_id/cancel", post(orders::cancel_order))
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(AppState { pool })
}
