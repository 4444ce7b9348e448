pub mod bookings;
pub mod health;
pub mod routing;
pub mod workers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/services", get(bookings::list_services))
        .route(
            "/api/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/api/bookings/:id", get(bookings::get_booking))
        .route(
            "/api/bookings/:id/estimate",
            get(bookings::get_calculated_estimate).post(bookings::submit_estimate),
        )
        .route(
            "/api/bookings/:id/estimate/accept",
            post(bookings::accept_estimate),
        )
        .route(
            "/api/bookings/:id/estimate/reject",
            post(bookings::reject_estimate),
        )
        .route(
            "/api/bookings/:id/eligible-workers",
            get(bookings::get_eligible_workers),
        )
        .route("/api/bookings/:id/assign", post(bookings::assign_worker))
        .route("/api/bookings/:id/accept", post(bookings::accept_job))
        .route("/api/bookings/:id/refuse", post(bookings::refuse_job))
        .route("/api/bookings/:id/complete", post(bookings::complete_job))
        .route("/api/bookings/:id/cancel", post(bookings::cancel_booking))
        .route(
            "/api/workers",
            get(workers::list_workers).post(workers::create_worker),
        )
        .route("/api/workers/:id/status", post(workers::update_status))
        .route("/api/workers/:id/schedule", get(workers::schedule))
        .route("/api/router/suggest", post(routing::suggest))
        .with_state(state)
}
