// libs/appointment-cell/src/router.rs
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: AppState) -> Router {
    // All booking operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::create_booking).get(handlers::list_bookings))
        .route("/{booking_id}", get(handlers::get_booking))
        .route("/{booking_id}/cancel", post(handlers::cancel_booking))
        .route("/{booking_id}/complete", post(handlers::complete_booking))
        .route("/{booking_id}/outcome", get(handlers::get_outcome))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
