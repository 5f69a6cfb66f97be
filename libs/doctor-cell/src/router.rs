use axum::{
    Router,
    routing::get,
};

use shared_database::AppState;

use crate::handlers;

pub fn doctor_routes(state: AppState) -> Router {
    // Lookups used by the booking form; no authentication required
    Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/slots", get(handlers::get_free_slots))
        .with_state(state)
}
