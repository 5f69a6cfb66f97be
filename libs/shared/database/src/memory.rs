use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::clinic::{
    Appointment, AppointmentOutcome, Booking, BookingStatus, Diagnosis, Doctor, NewBooking,
    Patient, PerformedService, Prescription, Service,
};

use crate::error::{StoreError, StoreResult};
use crate::store::{ClinicStore, CompletionTx};

#[derive(Debug, Default)]
struct Tables {
    doctors: HashMap<Uuid, Doctor>,
    patients: HashMap<Uuid, Patient>,
    diagnoses: HashMap<Uuid, Diagnosis>,
    services: HashMap<Uuid, Service>,
    bookings: HashMap<Uuid, Booking>,
    appointments: HashMap<Uuid, Appointment>,
    performed_services: Vec<PerformedService>,
    prescriptions: Vec<Prescription>,
}

impl Tables {
    fn slot_taken(&self, new_booking: &NewBooking) -> bool {
        self.bookings.values().any(|b| {
            b.doctor_id == new_booking.doctor_id
                && b.date_time == new_booking.date_time
                && b.status.holds_slot()
        })
    }

    fn appointment_of(&self, booking_id: Uuid) -> Option<&Appointment> {
        self.appointments.values().find(|a| a.booking_id == booking_id)
    }
}

/// Process-local store. One lock guards all tables, so every write is
/// serialised and a completion transaction sees no interleaved writers.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_doctor(&self, doctor: Doctor) {
        self.tables.write().await.doctors.insert(doctor.id, doctor);
    }

    pub async fn insert_patient(&self, patient: Patient) {
        self.tables.write().await.patients.insert(patient.id, patient);
    }

    pub async fn insert_diagnosis(&self, diagnosis: Diagnosis) {
        self.tables.write().await.diagnoses.insert(diagnosis.id, diagnosis);
    }

    pub async fn insert_service(&self, service: Service) {
        self.tables.write().await.services.insert(service.id, service);
    }

    pub async fn appointment_count(&self) -> usize {
        self.tables.read().await.appointments.len()
    }

    pub async fn performed_service_count(&self) -> usize {
        self.tables.read().await.performed_services.len()
    }

    pub async fn prescription_count(&self) -> usize {
        self.tables.read().await.prescriptions.len()
    }
}

fn sorted_by_time(mut bookings: Vec<Booking>) -> Vec<Booking> {
    bookings.sort_by_key(|b| b.date_time);
    bookings
}

#[async_trait]
impl ClinicStore for InMemoryStore {
    async fn doctor(&self, doctor_id: Uuid) -> StoreResult<Option<Doctor>> {
        Ok(self.tables.read().await.doctors.get(&doctor_id).cloned())
    }

    async fn doctors(&self, specialization_id: Option<Uuid>) -> StoreResult<Vec<Doctor>> {
        let tables = self.tables.read().await;
        let mut doctors: Vec<Doctor> = tables
            .doctors
            .values()
            .filter(|d| specialization_id.map_or(true, |s| d.specialization_id == s))
            .cloned()
            .collect();
        doctors.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(doctors)
    }

    async fn patient(&self, patient_id: Uuid) -> StoreResult<Option<Patient>> {
        Ok(self.tables.read().await.patients.get(&patient_id).cloned())
    }

    async fn diagnosis(&self, diagnosis_id: Uuid) -> StoreResult<Option<Diagnosis>> {
        Ok(self.tables.read().await.diagnoses.get(&diagnosis_id).cloned())
    }

    async fn service(&self, service_id: Uuid) -> StoreResult<Option<Service>> {
        Ok(self.tables.read().await.services.get(&service_id).cloned())
    }

    async fn booking(&self, booking_id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&booking_id).cloned())
    }

    async fn bookings_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let bookings = tables
            .bookings
            .values()
            .filter(|b| b.doctor_id == doctor_id && b.date() == date)
            .cloned()
            .collect();
        Ok(sorted_by_time(bookings))
    }

    async fn bookings_for_patient(&self, patient_id: Uuid) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let bookings = tables
            .bookings
            .values()
            .filter(|b| b.patient_id == patient_id)
            .cloned()
            .collect();
        Ok(sorted_by_time(bookings))
    }

    async fn bookings_for_doctor(&self, doctor_id: Uuid) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let bookings = tables
            .bookings
            .values()
            .filter(|b| b.doctor_id == doctor_id)
            .cloned()
            .collect();
        Ok(sorted_by_time(bookings))
    }

    async fn all_bookings(&self) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        Ok(sorted_by_time(tables.bookings.values().cloned().collect()))
    }

    async fn appointment_for_booking(
        &self,
        booking_id: Uuid,
    ) -> StoreResult<Option<AppointmentOutcome>> {
        let tables = self.tables.read().await;
        let Some(appointment) = tables.appointment_of(booking_id).cloned() else {
            return Ok(None);
        };

        let performed_services = tables
            .performed_services
            .iter()
            .filter(|ps| ps.appointment_id == appointment.id)
            .cloned()
            .collect();
        let prescriptions = tables
            .prescriptions
            .iter()
            .filter(|p| p.appointment_id == appointment.id)
            .cloned()
            .collect();

        Ok(Some(AppointmentOutcome {
            appointment,
            performed_services,
            prescriptions,
        }))
    }

    async fn reserve_slot(&self, new_booking: NewBooking) -> StoreResult<Booking> {
        let mut tables = self.tables.write().await;

        if !tables.doctors.contains_key(&new_booking.doctor_id) {
            return Err(StoreError::not_found("Doctor", new_booking.doctor_id));
        }
        if !tables.patients.contains_key(&new_booking.patient_id) {
            return Err(StoreError::not_found("Patient", new_booking.patient_id));
        }
        if tables.slot_taken(&new_booking) {
            warn!(
                "Slot {} already held for doctor {}",
                new_booking.date_time, new_booking.doctor_id
            );
            return Err(StoreError::Conflict {
                doctor_id: new_booking.doctor_id,
                date_time: new_booking.date_time,
            });
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            doctor_id: new_booking.doctor_id,
            patient_id: new_booking.patient_id,
            date_time: new_booking.date_time,
            status: BookingStatus::Scheduled,
            created_at: Utc::now(),
        };
        tables.bookings.insert(booking.id, booking.clone());
        debug!("Reserved slot {} for booking {}", booking.date_time, booking.id);

        Ok(booking)
    }

    async fn transition_booking(
        &self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<Booking> {
        let mut tables = self.tables.write().await;
        let booking = tables
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| StoreError::not_found("Booking", booking_id))?;

        if booking.status != from {
            return Err(StoreError::InvalidState {
                booking_id,
                current: booking.status,
            });
        }

        booking.status = to;
        Ok(booking.clone())
    }

    async fn begin_completion(&self, booking_id: Uuid) -> StoreResult<Box<dyn CompletionTx>> {
        let guard = self.tables.clone().write_owned().await;
        let booking = guard
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Booking", booking_id))?;

        Ok(Box::new(InMemoryCompletion {
            guard,
            booking,
            appointment: None,
            performed_services: Vec::new(),
            prescriptions: Vec::new(),
            completed: false,
        }))
    }
}

/// Holds the write lock for its whole lifetime; staged rows are applied on
/// commit and simply dropped otherwise.
struct InMemoryCompletion {
    guard: OwnedRwLockWriteGuard<Tables>,
    booking: Booking,
    appointment: Option<Appointment>,
    performed_services: Vec<PerformedService>,
    prescriptions: Vec<Prescription>,
    completed: bool,
}

impl InMemoryCompletion {
    fn staged_appointment(&self, appointment_id: Uuid) -> StoreResult<()> {
        match &self.appointment {
            Some(a) if a.id == appointment_id => Ok(()),
            _ => Err(StoreError::Validation(format!(
                "Appointment {} is not part of this completion",
                appointment_id
            ))),
        }
    }
}

#[async_trait]
impl CompletionTx for InMemoryCompletion {
    fn booking(&self) -> &Booking {
        &self.booking
    }

    async fn insert_appointment(
        &mut self,
        complaints: String,
        diagnosis_id: Option<Uuid>,
    ) -> StoreResult<Appointment> {
        if self.appointment.is_some() || self.guard.appointment_of(self.booking.id).is_some() {
            return Err(StoreError::Validation(format!(
                "Booking {} already has an appointment record",
                self.booking.id
            )));
        }
        if let Some(id) = diagnosis_id {
            if !self.guard.diagnoses.contains_key(&id) {
                return Err(StoreError::Validation(format!("Unknown diagnosis {}", id)));
            }
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            booking_id: self.booking.id,
            complaints,
            diagnosis_id,
        };
        self.appointment = Some(appointment.clone());
        Ok(appointment)
    }

    async fn insert_performed_service(
        &mut self,
        appointment_id: Uuid,
        service_id: Uuid,
        count: u32,
    ) -> StoreResult<PerformedService> {
        self.staged_appointment(appointment_id)?;
        if !self.guard.services.contains_key(&service_id) {
            return Err(StoreError::Validation(format!("Unknown service {}", service_id)));
        }

        let performed = PerformedService {
            id: Uuid::new_v4(),
            appointment_id,
            service_id,
            count,
        };
        self.performed_services.push(performed.clone());
        Ok(performed)
    }

    async fn insert_prescription(
        &mut self,
        appointment_id: Uuid,
        medication_name: String,
    ) -> StoreResult<Prescription> {
        self.staged_appointment(appointment_id)?;

        let prescription = Prescription {
            id: Uuid::new_v4(),
            appointment_id,
            medication_name,
        };
        self.prescriptions.push(prescription.clone());
        Ok(prescription)
    }

    async fn mark_completed(&mut self) -> StoreResult<Booking> {
        let current = self
            .guard
            .bookings
            .get(&self.booking.id)
            .map(|b| b.status)
            .ok_or_else(|| StoreError::not_found("Booking", self.booking.id))?;
        if current != BookingStatus::Scheduled {
            return Err(StoreError::InvalidState {
                booking_id: self.booking.id,
                current,
            });
        }

        self.completed = true;
        Ok(Booking {
            status: BookingStatus::Completed,
            ..self.booking.clone()
        })
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let InMemoryCompletion {
            mut guard,
            booking,
            appointment,
            performed_services,
            prescriptions,
            completed,
        } = *self;

        let Some(appointment) = appointment else {
            return Err(StoreError::Validation(
                "Completion has no appointment record".to_string(),
            ));
        };
        if !completed {
            return Err(StoreError::Validation(
                "Completion did not close the booking".to_string(),
            ));
        }

        if let Some(stored) = guard.bookings.get_mut(&booking.id) {
            stored.status = BookingStatus::Completed;
        }
        guard.appointments.insert(appointment.id, appointment);
        guard.performed_services.extend(performed_services);
        guard.prescriptions.extend(prescriptions);

        info!("Committed completion of booking {}", booking.id);
        Ok(())
    }
}
