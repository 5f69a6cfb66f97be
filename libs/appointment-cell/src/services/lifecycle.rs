// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::clinic::BookingStatus;

use crate::models::BookingError;

/// Booking state machine: `Scheduled` is the only non-terminal state.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookingLifecycleService;

impl BookingLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        booking_id: Uuid,
        current_status: BookingStatus,
        new_status: BookingStatus,
    ) -> Result<(), BookingError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!(
                "Invalid status transition attempted on {}: {} -> {}",
                booking_id, current_status, new_status
            );
            return Err(BookingError::InvalidState {
                booking_id,
                current: current_status,
            });
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: BookingStatus) -> Vec<BookingStatus> {
        match current_status {
            BookingStatus::Scheduled => vec![BookingStatus::Completed, BookingStatus::Canceled],
            // Terminal states
            BookingStatus::Completed | BookingStatus::Canceled => vec![],
        }
    }
}
