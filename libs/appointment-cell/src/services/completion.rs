// libs/appointment-cell/src/services/completion.rs
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{AppState, ClinicStore};
use shared_models::auth::Actor;
use shared_models::clinic::BookingStatus;

use crate::models::{BookingError, CompleteBookingRequest, CompletionSummary, OutcomeView};
use crate::services::booking::ensure_visible;
use crate::services::lifecycle::BookingLifecycleService;

/// Records the clinical outcome of a booking and closes it.
///
/// Every write goes through one [`shared_database::CompletionTx`]. Any error
/// returns early and drops the transaction, which discards whatever was
/// staged, so the booking is either fully completed or untouched.
pub struct CompletionService {
    store: Arc<dyn ClinicStore>,
    lifecycle: BookingLifecycleService,
}

impl CompletionService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(state.store.clone())
    }

    pub fn with_store(store: Arc<dyn ClinicStore>) -> Self {
        Self {
            store,
            lifecycle: BookingLifecycleService::new(),
        }
    }

    /// Completion on behalf of an authenticated actor. Only the booking's own
    /// doctor or staff may complete it.
    pub async fn complete_as(
        &self,
        actor: &Actor,
        booking_id: Uuid,
        request: CompleteBookingRequest,
    ) -> Result<CompletionSummary, BookingError> {
        let booking = self
            .store
            .booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Booking {} not found", booking_id)))?;

        match actor {
            Actor::Patient { .. } => {
                return Err(BookingError::Forbidden(
                    "Patients cannot complete bookings".to_string(),
                ));
            }
            Actor::Doctor { .. } | Actor::Staff { .. } => ensure_visible(actor, &booking)?,
        }

        self.complete(booking_id, request).await
    }

    pub async fn complete(
        &self,
        booking_id: Uuid,
        request: CompleteBookingRequest,
    ) -> Result<CompletionSummary, BookingError> {
        validate_request(&request)?;
        info!(
            "Completing booking {} with {} services and {} prescriptions",
            booking_id,
            request.services.len(),
            request.prescriptions.len()
        );

        let mut tx = self.store.begin_completion(booking_id).await?;
        let snapshot = tx.booking().clone();
        self.lifecycle
            .validate_status_transition(snapshot.id, snapshot.status, BookingStatus::Completed)?;

        let appointment = tx
            .insert_appointment(request.complaints, request.diagnosis_id)
            .await?;

        let mut performed_services = Vec::with_capacity(request.services.len());
        for line in &request.services {
            let performed = tx
                .insert_performed_service(appointment.id, line.service_id, line.count())
                .await?;
            performed_services.push(performed);
        }

        let mut prescriptions = Vec::with_capacity(request.prescriptions.len());
        for medication in request.prescriptions {
            prescriptions.push(tx.insert_prescription(appointment.id, medication).await?);
        }

        let booking = tx.mark_completed().await?;
        tx.commit().await?;

        info!("Booking {} completed as appointment {}", booking.id, appointment.id);
        Ok(CompletionSummary {
            booking,
            appointment,
            performed_services,
            prescriptions,
        })
    }

    /// Appointment record of a completed booking with its total cost.
    pub async fn outcome(&self, actor: &Actor, booking_id: Uuid) -> Result<OutcomeView, BookingError> {
        let booking = self
            .store
            .booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Booking {} not found", booking_id)))?;
        ensure_visible(actor, &booking)?;

        let outcome = self
            .store
            .appointment_for_booking(booking_id)
            .await?
            .ok_or_else(|| {
                BookingError::NotFound(format!("Booking {} has no appointment record", booking_id))
            })?;

        let mut total_cost_cents = 0_i64;
        for performed in &outcome.performed_services {
            match self.store.service(performed.service_id).await? {
                Some(service) => {
                    total_cost_cents += service.cost_cents * i64::from(performed.count);
                }
                None => warn!("Service {} missing from catalog", performed.service_id),
            }
        }
        debug!("Booking {} cost {} cents", booking_id, total_cost_cents);

        Ok(OutcomeView {
            booking,
            outcome,
            total_cost_cents,
        })
    }
}

fn validate_request(request: &CompleteBookingRequest) -> Result<(), BookingError> {
    if let Some(line) = request.services.iter().find(|line| line.count() == 0) {
        return Err(BookingError::ValidationError(format!(
            "Service {} must be performed at least once",
            line.service_id
        )));
    }
    if request.prescriptions.iter().any(|name| name.trim().is_empty()) {
        return Err(BookingError::ValidationError(
            "Prescription medication name cannot be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceLine;
    use assert_matches::assert_matches;

    #[test]
    fn zero_count_is_rejected() {
        let request = CompleteBookingRequest {
            services: vec![ServiceLine {
                service_id: Uuid::new_v4(),
                count: Some(0),
            }],
            ..Default::default()
        };
        assert_matches!(validate_request(&request), Err(BookingError::ValidationError(_)));
    }

    #[test]
    fn blank_prescription_is_rejected() {
        let request = CompleteBookingRequest {
            prescriptions: vec!["  ".to_string()],
            ..Default::default()
        };
        assert_matches!(validate_request(&request), Err(BookingError::ValidationError(_)));
    }

    #[test]
    fn empty_payload_is_structurally_valid() {
        assert!(validate_request(&CompleteBookingRequest::default()).is_ok());
    }
}
