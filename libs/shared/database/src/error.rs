use chrono::NaiveDateTime;
use thiserror::Error;
use uuid::Uuid;

use shared_models::clinic::BookingStatus;

use crate::supabase::SupabaseError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Doctor {doctor_id} already has a booking at {date_time}")]
    Conflict {
        doctor_id: Uuid,
        date_time: NaiveDateTime,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Booking {booking_id} is {current}")]
    InvalidState {
        booking_id: Uuid,
        current: BookingStatus,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        StoreError::NotFound { entity, id }
    }
}

impl From<SupabaseError> for StoreError {
    fn from(err: SupabaseError) -> Self {
        StoreError::Backend(err.to_string())
    }
}
