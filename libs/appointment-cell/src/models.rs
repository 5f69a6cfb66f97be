// libs/appointment-cell/src/models.rs
use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doctor_cell::models::SlotError;
use doctor_cell::services::availability::format_slots;
use shared_database::StoreError;
use shared_models::clinic::{
    Appointment, AppointmentOutcome, Booking, BookingStatus, PerformedService, Prescription,
};
use shared_models::error::AppError;

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub doctor_id: Uuid,
    /// `YYYY-MM-DD HH:MM`, local clinic time.
    pub date_time: String,
    /// Only staff book on behalf of a patient; patients always book for themselves.
    pub patient_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLine {
    pub service_id: Uuid,
    pub count: Option<u32>,
}

impl ServiceLine {
    pub const DEFAULT_COUNT: u32 = 1;

    pub fn count(&self) -> u32 {
        self.count.unwrap_or(Self::DEFAULT_COUNT)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteBookingRequest {
    pub diagnosis_id: Option<Uuid>,
    #[serde(default)]
    pub complaints: String,
    #[serde(default)]
    pub services: Vec<ServiceLine>,
    #[serde(default)]
    pub prescriptions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionSummary {
    pub booking: Booking,
    pub appointment: Appointment,
    pub performed_services: Vec<PerformedService>,
    pub prescriptions: Vec<Prescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutcomeView {
    pub booking: Booking,
    #[serde(flatten)]
    pub outcome: AppointmentOutcome,
    pub total_cost_cents: i64,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BookingError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Doctor {doctor_id} is already booked at {date_time}")]
    Conflict {
        doctor_id: Uuid,
        date_time: NaiveDateTime,
        /// Slots still free for that doctor and date, to re-offer to the patient.
        free_slots: Vec<NaiveTime>,
    },

    #[error("Booking {booking_id} is {current} and cannot change")]
    InvalidState {
        booking_id: Uuid,
        current: BookingStatus,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { doctor_id, date_time } => BookingError::Conflict {
                doctor_id,
                date_time,
                free_slots: Vec::new(),
            },
            StoreError::NotFound { .. } => BookingError::NotFound(err.to_string()),
            StoreError::InvalidState { booking_id, current } => {
                BookingError::InvalidState { booking_id, current }
            }
            StoreError::Validation(msg) => BookingError::ValidationError(msg),
            StoreError::Backend(msg) => BookingError::Storage(msg),
        }
    }
}

impl From<SlotError> for BookingError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::InvalidArgument(msg) => BookingError::InvalidArgument(msg),
            SlotError::Storage(e) => e.into(),
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err {
            BookingError::InvalidArgument(_) => AppError::BadRequest(message),
            BookingError::Conflict { free_slots, .. } => AppError::SlotTaken {
                message,
                free_slots: format_slots(&free_slots),
            },
            BookingError::InvalidState { .. } => AppError::Conflict(message),
            BookingError::NotFound(_) => AppError::NotFound(message),
            BookingError::ValidationError(_) => AppError::ValidationError(message),
            BookingError::Forbidden(_) => AppError::Forbidden(message),
            BookingError::Storage(_) => AppError::Database(message),
        }
    }
}
