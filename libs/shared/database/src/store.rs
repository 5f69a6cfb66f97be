use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use shared_models::clinic::{
    Appointment, AppointmentOutcome, Booking, BookingStatus, Diagnosis, Doctor, NewBooking,
    Patient, PerformedService, Prescription, Service,
};

use crate::error::StoreResult;

/// Persistence contract for the scheduling core.
///
/// Bookings are the only shared mutable state. They change through
/// [`ClinicStore::reserve_slot`], [`ClinicStore::transition_booking`] and the
/// completion transaction opened by [`ClinicStore::begin_completion`]; there is
/// no other write path.
#[async_trait]
pub trait ClinicStore: Send + Sync {
    async fn doctor(&self, doctor_id: Uuid) -> StoreResult<Option<Doctor>>;

    /// All doctors, or only those of one specialization, ordered by name.
    async fn doctors(&self, specialization_id: Option<Uuid>) -> StoreResult<Vec<Doctor>>;

    async fn patient(&self, patient_id: Uuid) -> StoreResult<Option<Patient>>;

    async fn diagnosis(&self, diagnosis_id: Uuid) -> StoreResult<Option<Diagnosis>>;

    async fn service(&self, service_id: Uuid) -> StoreResult<Option<Service>>;

    async fn booking(&self, booking_id: Uuid) -> StoreResult<Option<Booking>>;

    /// Bookings of every status for the doctor on the given calendar date.
    async fn bookings_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> StoreResult<Vec<Booking>>;

    async fn bookings_for_patient(&self, patient_id: Uuid) -> StoreResult<Vec<Booking>>;

    async fn bookings_for_doctor(&self, doctor_id: Uuid) -> StoreResult<Vec<Booking>>;

    async fn all_bookings(&self) -> StoreResult<Vec<Booking>>;

    async fn appointment_for_booking(
        &self,
        booking_id: Uuid,
    ) -> StoreResult<Option<AppointmentOutcome>>;

    /// Reserve-if-free. Creates a `Scheduled` booking unless a booking that
    /// still holds its slot exists for the same doctor and date-time, in which
    /// case it fails with `StoreError::Conflict`. Check and insert happen as
    /// one step.
    async fn reserve_slot(&self, new_booking: NewBooking) -> StoreResult<Booking>;

    /// Compare-and-set on the booking status. Fails with
    /// `StoreError::InvalidState` when the stored status is not `from`.
    async fn transition_booking(
        &self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<Booking>;

    /// Opens the transactional boundary used to complete one booking.
    async fn begin_completion(&self, booking_id: Uuid) -> StoreResult<Box<dyn CompletionTx>>;
}

/// Writes staged while completing a booking. Nothing is visible to other
/// callers until [`CompletionTx::commit`]; dropping the transaction discards
/// every staged row.
#[async_trait]
pub trait CompletionTx: Send {
    /// The booking as it was when the transaction opened.
    fn booking(&self) -> &Booking;

    async fn insert_appointment(
        &mut self,
        complaints: String,
        diagnosis_id: Option<Uuid>,
    ) -> StoreResult<Appointment>;

    async fn insert_performed_service(
        &mut self,
        appointment_id: Uuid,
        service_id: Uuid,
        count: u32,
    ) -> StoreResult<PerformedService>;

    async fn insert_prescription(
        &mut self,
        appointment_id: Uuid,
        medication_name: String,
    ) -> StoreResult<Prescription>;

    async fn mark_completed(&mut self) -> StoreResult<Booking>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
