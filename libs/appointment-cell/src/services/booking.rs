// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::services::AvailabilityService;
use shared_database::{AppState, ClinicStore};
use shared_models::auth::Actor;
use shared_models::clinic::{Booking, BookingStatus, NewBooking, BOOKING_DATE_TIME_FORMAT};

use crate::models::{BookingError, CreateBookingRequest};
use crate::services::lifecycle::BookingLifecycleService;

pub struct BookingService {
    store: Arc<dyn ClinicStore>,
    availability: AvailabilityService,
    lifecycle: BookingLifecycleService,
}

impl BookingService {
    pub fn new(state: &AppState) -> Self {
        Self::with_availability(state.store.clone(), AvailabilityService::new(state))
    }

    pub fn with_availability(store: Arc<dyn ClinicStore>, availability: AvailabilityService) -> Self {
        Self {
            store,
            availability,
            lifecycle: BookingLifecycleService::new(),
        }
    }

    /// Creates a `Scheduled` booking if the slot is inside the working window
    /// and still free. The free check and the insert are one storage step, so
    /// of two racing requests for the same slot exactly one wins.
    pub async fn create(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
        date_time: NaiveDateTime,
    ) -> Result<Booking, BookingError> {
        info!("Booking doctor {} for patient {} at {}", doctor_id, patient_id, date_time);

        if !self.availability.calendar().is_bookable(date_time) {
            return Err(BookingError::InvalidArgument(format!(
                "{} is not a slot of the working day",
                date_time.format(BOOKING_DATE_TIME_FORMAT)
            )));
        }

        let result = self
            .store
            .reserve_slot(NewBooking {
                doctor_id,
                patient_id,
                date_time,
            })
            .await;

        match result {
            Ok(booking) => {
                info!("Booking {} created", booking.id);
                Ok(booking)
            }
            Err(e) => match BookingError::from(e) {
                BookingError::Conflict { doctor_id, date_time, .. } => {
                    warn!("Slot {} already taken for doctor {}", date_time, doctor_id);
                    let free_slots = self
                        .availability
                        .free_slots(doctor_id, date_time.date())
                        .await
                        .unwrap_or_else(|e| {
                            warn!("Could not list free slots after conflict: {}", e);
                            Vec::new()
                        });
                    Err(BookingError::Conflict {
                        doctor_id,
                        date_time,
                        free_slots,
                    })
                }
                other => Err(other),
            },
        }
    }

    /// Resolves the patient from the actor and parses the requested time.
    pub async fn create_booking(
        &self,
        actor: &Actor,
        request: CreateBookingRequest,
    ) -> Result<Booking, BookingError> {
        let patient_id = match actor {
            Actor::Patient { patient_id, .. } => match request.patient_id {
                Some(requested) if requested != *patient_id => {
                    return Err(BookingError::Forbidden(
                        "Patients can only book for themselves".to_string(),
                    ));
                }
                _ => *patient_id,
            },
            Actor::Doctor { .. } => {
                return Err(BookingError::Forbidden(
                    "Doctors cannot create bookings".to_string(),
                ));
            }
            Actor::Staff { .. } => request.patient_id.ok_or_else(|| {
                BookingError::InvalidArgument("patient_id is required".to_string())
            })?,
        };

        let date_time = parse_date_time(&request.date_time)?;
        self.create(request.doctor_id, patient_id, date_time).await
    }

    pub async fn get_booking(&self, actor: &Actor, booking_id: Uuid) -> Result<Booking, BookingError> {
        let booking = self
            .store
            .booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Booking {} not found", booking_id)))?;

        ensure_visible(actor, &booking)?;
        Ok(booking)
    }

    /// Bookings the actor may see. Patients get newest first, doctors and
    /// staff oldest first.
    pub async fn list_bookings(&self, actor: &Actor) -> Result<Vec<Booking>, BookingError> {
        let bookings = match actor {
            Actor::Patient { patient_id, .. } => {
                let mut own = self.store.bookings_for_patient(*patient_id).await?;
                own.reverse();
                own
            }
            Actor::Doctor { doctor_id, .. } => self.store.bookings_for_doctor(*doctor_id).await?,
            Actor::Staff { .. } => self.store.all_bookings().await?,
        };

        debug!("Listing {} bookings for {}", bookings.len(), actor.user_id());
        Ok(bookings)
    }

    pub async fn cancel(&self, actor: &Actor, booking_id: Uuid) -> Result<Booking, BookingError> {
        let booking = self.get_booking(actor, booking_id).await?;
        self.lifecycle
            .validate_status_transition(booking.id, booking.status, BookingStatus::Canceled)?;

        let canceled = self
            .store
            .transition_booking(booking.id, BookingStatus::Scheduled, BookingStatus::Canceled)
            .await?;

        info!("Booking {} canceled by {}", canceled.id, actor.user_id());
        Ok(canceled)
    }
}

pub fn parse_date_time(raw: &str) -> Result<NaiveDateTime, BookingError> {
    NaiveDateTime::parse_from_str(raw.trim(), BOOKING_DATE_TIME_FORMAT).map_err(|_| {
        BookingError::InvalidArgument(format!("'{}' is not a YYYY-MM-DD HH:MM date-time", raw))
    })
}

/// Patients and doctors only see their own bookings.
pub fn ensure_visible(actor: &Actor, booking: &Booking) -> Result<(), BookingError> {
    let visible = match actor {
        Actor::Patient { patient_id, .. } => booking.patient_id == *patient_id,
        Actor::Doctor { doctor_id, .. } => booking.doctor_id == *doctor_id,
        Actor::Staff { .. } => true,
    };

    if visible {
        Ok(())
    } else {
        Err(BookingError::Forbidden(format!(
            "Booking {} belongs to another account",
            booking.id
        )))
    }
}
