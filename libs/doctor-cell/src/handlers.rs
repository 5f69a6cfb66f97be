use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::AppState;
use shared_models::clinic::DoctorSummary;
use shared_models::error::AppError;

use crate::models::{DoctorListQuery, SlotError, SlotQuery};
use crate::services::availability::{format_slots, AvailabilityService};
use crate::services::doctor::DoctorService;

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<AppState>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Vec<DoctorSummary>>, AppError> {
    let specialization_id = match query.spec_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            Uuid::parse_str(raw)
                .map_err(|_| AppError::BadRequest(format!("Invalid specialization id: {}", raw)))?,
        ),
    };

    let doctors = DoctorService::new(&state)
        .doctors_by_specialization(specialization_id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(doctors))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&state)
        .get_doctor(doctor_id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Doctor {} not found", doctor_id)))?;

    Ok(Json(json!({ "doctor": doctor })))
}

/// Free slots as `"HH:MM"` strings. Feeds the booking form, so malformed
/// input yields an empty list instead of an error.
#[axum::debug_handler]
pub async fn get_free_slots(
    State(state): State<AppState>,
    Path(doctor_id): Path<String>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    let (Ok(doctor_id), Some(raw_date)) = (Uuid::parse_str(&doctor_id), query.date) else {
        debug!("Slot lookup without a usable doctor id or date");
        return Ok(Json(Vec::new()));
    };

    match AvailabilityService::new(&state).free_slots_on(doctor_id, &raw_date).await {
        Ok(slots) => Ok(Json(format_slots(&slots))),
        Err(SlotError::InvalidArgument(reason)) => {
            warn!("Slot lookup degraded to empty list: {}", reason);
            Ok(Json(Vec::new()))
        }
        Err(e) => Err(e.into()),
    }
}
