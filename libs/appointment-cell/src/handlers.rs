// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::AppState;
use shared_models::auth::Actor;
use shared_models::error::AppError;

use crate::models::{CompleteBookingRequest, CreateBookingRequest};
use crate::services::booking::BookingService;
use crate::services::completion::CompletionService;

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let booking = BookingService::new(&state)
        .create_booking(&actor, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "booking": booking,
            "message": "Booking created"
        })),
    ))
}

#[axum::debug_handler]
pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    let bookings = BookingService::new(&state).list_bookings(&actor).await?;

    Ok(Json(json!({
        "bookings": bookings,
        "total": bookings.len()
    })))
}

#[axum::debug_handler]
pub async fn get_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking = BookingService::new(&state)
        .get_booking(&actor, booking_id)
        .await?;

    Ok(Json(json!({ "booking": booking })))
}

#[axum::debug_handler]
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking = BookingService::new(&state).cancel(&actor, booking_id).await?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": "Booking canceled"
    })))
}

// ==============================================================================
// COMPLETION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn complete_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<CompleteBookingRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("Completion requested for booking {}", booking_id);
    let summary = CompletionService::new(&state)
        .complete_as(&actor, booking_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "booking": summary.booking,
        "appointment": summary.appointment,
        "performed_services": summary.performed_services,
        "prescriptions": summary.prescriptions
    })))
}

#[axum::debug_handler]
pub async fn get_outcome(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let outcome = CompletionService::new(&state)
        .outcome(&actor, booking_id)
        .await?;

    Ok(Json(json!(outcome)))
}
