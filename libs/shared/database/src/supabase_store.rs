use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::clinic::{
    Appointment, AppointmentOutcome, Booking, BookingStatus, Diagnosis, Doctor, NewBooking,
    Patient, PerformedService, Prescription, Service,
};

use crate::error::{StoreError, StoreResult};
use crate::store::{ClinicStore, CompletionTx};
use crate::supabase::{SupabaseClient, SupabaseError};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const NO_DATA_FOUND: &str = "P0002";
const PREREQUISITE_STATE: &str = "55000";

#[derive(Debug, Deserialize)]
struct ServiceRow {
    id: Uuid,
    name: String,
    cost: f64,
}

impl From<ServiceRow> for Service {
    fn from(row: ServiceRow) -> Self {
        Service {
            id: row.id,
            name: row.name,
            cost_cents: (row.cost * 100.0).round() as i64,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PerformedServiceRow {
    id: Uuid,
    appointment_id: Uuid,
    service_id: Uuid,
    count: Option<u32>,
}

impl From<PerformedServiceRow> for PerformedService {
    fn from(row: PerformedServiceRow) -> Self {
        PerformedService {
            id: row.id,
            appointment_id: row.appointment_id,
            service_id: row.service_id,
            count: row.count.unwrap_or(1),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AppointmentRow {
    id: Uuid,
    booking_id: Uuid,
    complaints: Option<String>,
    diagnosis_id: Option<Uuid>,
}

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

/// PostgREST-backed store.
///
/// The database is expected to carry a partial unique index on
/// `appointment_bookings (doctor_id, date_time) WHERE status <> 'Canceled'`
/// and a `complete_booking(payload jsonb)` function that, inside one
/// transaction, re-checks that the booking is `Scheduled` (raising SQLSTATE
/// `55000` otherwise, `P0002` when it is missing), inserts the appointment,
/// performed services and prescriptions, and flips the status.
pub struct SupabaseStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    async fn fetch_one<T>(&self, path: &str) -> StoreResult<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let rows: Vec<T> = self.supabase.request(Method::GET, path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_bookings(&self, path: &str) -> StoreResult<Vec<Booking>> {
        Ok(self.supabase.request(Method::GET, path, None, None).await?)
    }

    async fn require_booking(&self, booking_id: Uuid) -> StoreResult<Booking> {
        self.booking(booking_id)
            .await?
            .ok_or_else(|| StoreError::not_found("Booking", booking_id))
    }
}

#[async_trait]
impl ClinicStore for SupabaseStore {
    async fn doctor(&self, doctor_id: Uuid) -> StoreResult<Option<Doctor>> {
        self.fetch_one(&format!("/rest/v1/doctors?id=eq.{}", doctor_id)).await
    }

    async fn doctors(&self, specialization_id: Option<Uuid>) -> StoreResult<Vec<Doctor>> {
        let path = match specialization_id {
            Some(spec) => format!(
                "/rest/v1/doctors?specialization_id=eq.{}&order=full_name.asc",
                spec
            ),
            None => "/rest/v1/doctors?order=full_name.asc".to_string(),
        };
        Ok(self.supabase.request(Method::GET, &path, None, None).await?)
    }

    async fn patient(&self, patient_id: Uuid) -> StoreResult<Option<Patient>> {
        self.fetch_one(&format!("/rest/v1/patients?id=eq.{}", patient_id)).await
    }

    async fn diagnosis(&self, diagnosis_id: Uuid) -> StoreResult<Option<Diagnosis>> {
        self.fetch_one(&format!("/rest/v1/diagnoses?id=eq.{}", diagnosis_id)).await
    }

    async fn service(&self, service_id: Uuid) -> StoreResult<Option<Service>> {
        let row: Option<ServiceRow> = self
            .fetch_one(&format!("/rest/v1/services?id=eq.{}", service_id))
            .await?;
        Ok(row.map(Service::from))
    }

    async fn booking(&self, booking_id: Uuid) -> StoreResult<Option<Booking>> {
        self.fetch_one(&format!("/rest/v1/appointment_bookings?id=eq.{}", booking_id))
            .await
    }

    async fn bookings_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> StoreResult<Vec<Booking>> {
        let day_start = date.and_time(chrono::NaiveTime::MIN);
        let next_day = day_start + Duration::days(1);
        let path = format!(
            "/rest/v1/appointment_bookings?doctor_id=eq.{}&date_time=gte.{}&date_time=lt.{}&order=date_time.asc",
            doctor_id,
            day_start.format("%Y-%m-%dT%H:%M:%S"),
            next_day.format("%Y-%m-%dT%H:%M:%S"),
        );
        self.fetch_bookings(&path).await
    }

    async fn bookings_for_patient(&self, patient_id: Uuid) -> StoreResult<Vec<Booking>> {
        self.fetch_bookings(&format!(
            "/rest/v1/appointment_bookings?patient_id=eq.{}&order=date_time.asc",
            patient_id
        ))
        .await
    }

    async fn bookings_for_doctor(&self, doctor_id: Uuid) -> StoreResult<Vec<Booking>> {
        self.fetch_bookings(&format!(
            "/rest/v1/appointment_bookings?doctor_id=eq.{}&order=date_time.asc",
            doctor_id
        ))
        .await
    }

    async fn all_bookings(&self) -> StoreResult<Vec<Booking>> {
        self.fetch_bookings("/rest/v1/appointment_bookings?order=date_time.asc")
            .await
    }

    async fn appointment_for_booking(
        &self,
        booking_id: Uuid,
    ) -> StoreResult<Option<AppointmentOutcome>> {
        let row: Option<AppointmentRow> = self
            .fetch_one(&format!("/rest/v1/appointments?booking_id=eq.{}", booking_id))
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let services: Vec<PerformedServiceRow> = self
            .supabase
            .request(
                Method::GET,
                &format!("/rest/v1/performed_services?appointment_id=eq.{}", row.id),
                None,
                None,
            )
            .await?;
        let prescriptions: Vec<Prescription> = self
            .supabase
            .request(
                Method::GET,
                &format!("/rest/v1/prescriptions?appointment_id=eq.{}", row.id),
                None,
                None,
            )
            .await?;

        Ok(Some(AppointmentOutcome {
            appointment: Appointment {
                id: row.id,
                booking_id: row.booking_id,
                complaints: row.complaints.unwrap_or_default(),
                diagnosis_id: row.diagnosis_id,
            },
            performed_services: services.into_iter().map(PerformedService::from).collect(),
            prescriptions,
        }))
    }

    async fn reserve_slot(&self, new_booking: NewBooking) -> StoreResult<Booking> {
        if self.doctor(new_booking.doctor_id).await?.is_none() {
            return Err(StoreError::not_found("Doctor", new_booking.doctor_id));
        }
        if self.patient(new_booking.patient_id).await?.is_none() {
            return Err(StoreError::not_found("Patient", new_booking.patient_id));
        }

        let row = json!({
            "id": Uuid::new_v4(),
            "doctor_id": new_booking.doctor_id,
            "patient_id": new_booking.patient_id,
            "date_time": new_booking.date_time,
            "status": BookingStatus::Scheduled,
            "created_at": Utc::now().to_rfc3339(),
        });

        let result: Result<Vec<Booking>, SupabaseError> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointment_bookings",
                None,
                Some(row),
                Some(return_representation()),
            )
            .await;

        match result {
            Ok(rows) => rows.into_iter().next().ok_or_else(|| {
                StoreError::Backend("Booking insert returned no row".to_string())
            }),
            Err(e) if e.sql_state().as_deref() == Some(UNIQUE_VIOLATION) => {
                warn!(
                    "Unique index rejected booking for doctor {} at {}",
                    new_booking.doctor_id, new_booking.date_time
                );
                Err(StoreError::Conflict {
                    doctor_id: new_booking.doctor_id,
                    date_time: new_booking.date_time,
                })
            }
            Err(e) if e.sql_state().as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
                Err(StoreError::Validation(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn transition_booking(
        &self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<Booking> {
        let path = format!(
            "/rest/v1/appointment_bookings?id=eq.{}&status=eq.{}",
            booking_id, from
        );
        let updated: Vec<Booking> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(json!({ "status": to })),
                Some(return_representation()),
            )
            .await?;

        if let Some(booking) = updated.into_iter().next() {
            return Ok(booking);
        }

        // Nothing matched: either the booking is gone or its status moved on.
        let current = self.require_booking(booking_id).await?;
        Err(StoreError::InvalidState {
            booking_id,
            current: current.status,
        })
    }

    async fn begin_completion(&self, booking_id: Uuid) -> StoreResult<Box<dyn CompletionTx>> {
        let booking = self.require_booking(booking_id).await?;
        debug!("Opened completion for booking {}", booking_id);

        Ok(Box::new(SupabaseCompletion {
            supabase: self.supabase.clone(),
            booking,
            appointment: None,
            performed_services: Vec::new(),
            prescriptions: Vec::new(),
            completed: false,
        }))
    }
}

/// Buffers the completion rows and ships them in a single RPC on commit, so
/// the database applies all of them or none.
struct SupabaseCompletion {
    supabase: Arc<SupabaseClient>,
    booking: Booking,
    appointment: Option<Appointment>,
    performed_services: Vec<PerformedService>,
    prescriptions: Vec<Prescription>,
    completed: bool,
}

impl SupabaseCompletion {
    fn staged_appointment(&self, appointment_id: Uuid) -> StoreResult<()> {
        match &self.appointment {
            Some(a) if a.id == appointment_id => Ok(()),
            _ => Err(StoreError::Validation(format!(
                "Appointment {} is not part of this completion",
                appointment_id
            ))),
        }
    }

    async fn current_status(&self) -> StoreResult<BookingStatus> {
        let rows: Vec<Booking> = self
            .supabase
            .request(
                Method::GET,
                &format!("/rest/v1/appointment_bookings?id=eq.{}", self.booking.id),
                None,
                None,
            )
            .await?;
        rows.into_iter()
            .next()
            .map(|b| b.status)
            .ok_or_else(|| StoreError::not_found("Booking", self.booking.id))
    }
}

#[async_trait]
impl CompletionTx for SupabaseCompletion {
    fn booking(&self) -> &Booking {
        &self.booking
    }

    async fn insert_appointment(
        &mut self,
        complaints: String,
        diagnosis_id: Option<Uuid>,
    ) -> StoreResult<Appointment> {
        if self.appointment.is_some() {
            return Err(StoreError::Validation(format!(
                "Booking {} already has an appointment record",
                self.booking.id
            )));
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
        if self.booking.status != BookingStatus::Scheduled {
            return Err(StoreError::InvalidState {
                booking_id: self.booking.id,
                current: self.booking.status,
            });
        }
        self.completed = true;
        Ok(Booking {
            status: BookingStatus::Completed,
            ..self.booking.clone()
        })
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let Some(appointment) = &self.appointment else {
            return Err(StoreError::Validation(
                "Completion has no appointment record".to_string(),
            ));
        };
        if !self.completed {
            return Err(StoreError::Validation(
                "Completion did not close the booking".to_string(),
            ));
        }

        let payload = json!({
            "payload": {
                "booking_id": self.booking.id,
                "appointment": appointment,
                "performed_services": self.performed_services,
                "prescriptions": self.prescriptions,
            }
        });

        match self.supabase.rpc::<Value>("complete_booking", payload).await {
            Ok(_) => {
                info!("Committed completion of booking {}", self.booking.id);
                Ok(())
            }
            Err(e) => match e.sql_state().as_deref() {
                Some(PREREQUISITE_STATE) => Err(StoreError::InvalidState {
                    booking_id: self.booking.id,
                    current: self.current_status().await?,
                }),
                Some(NO_DATA_FOUND) => Err(StoreError::not_found("Booking", self.booking.id)),
                Some(FOREIGN_KEY_VIOLATION) | Some(UNIQUE_VIOLATION) => {
                    Err(StoreError::Validation(e.to_string()))
                }
                _ => Err(e.into()),
            },
        }
    }
}
