use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Text format of a slot position, e.g. `09:30`.
pub const SLOT_FORMAT: &str = "%H:%M";
/// Text format of a booking request's date-time, e.g. `2024-06-10 10:00`.
pub const BOOKING_DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ==============================================================================
// REFERENCE DATA
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Specialization {
    pub id: Uuid,
    pub name: String,
    pub accreditation_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Office {
    pub id: Uuid,
    pub number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub license_number: String,
    pub specialization_id: Uuid,
    pub office_id: Option<Uuid>,
}

/// Shape returned to the booking form when it lists doctors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub full_name: String,
}

impl From<&Doctor> for DoctorSummary {
    fn from(doctor: &Doctor) -> Self {
        Self {
            id: doctor.id,
            full_name: doctor.full_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub address: Option<String>,
    pub birth_date: NaiveDate,
    pub med_card_number: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnosis {
    pub id: Uuid,
    pub name: String,
    pub code_icd: String,
    pub description: Option<String>,
}

/// Catalog entry; cost is kept in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub cost_cents: i64,
}

// ==============================================================================
// BOOKINGS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BookingStatus {
    Scheduled,
    Completed,
    Canceled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "Scheduled",
            BookingStatus::Completed => "Completed",
            BookingStatus::Canceled => "Canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Scheduled)
    }

    /// Whether a booking in this status occupies its slot.
    pub fn holds_slot(&self) -> bool {
        !matches!(self, BookingStatus::Canceled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Scheduled" => Ok(BookingStatus::Scheduled),
            "Completed" => Ok(BookingStatus::Completed),
            "Canceled" => Ok(BookingStatus::Canceled),
            other => Err(format!("unknown booking status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date_time: NaiveDateTime,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn date(&self) -> NaiveDate {
        self.date_time.date()
    }

    pub fn time_of_day(&self) -> NaiveTime {
        self.date_time.time()
    }
}

/// Row to insert when a slot is reserved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewBooking {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date_time: NaiveDateTime,
}

// ==============================================================================
// COMPLETION RECORDS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub complaints: String,
    pub diagnosis_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformedService {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub service_id: Uuid,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub medication_name: String,
}

/// Everything recorded against a booking when it was completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentOutcome {
    pub appointment: Appointment,
    pub performed_services: Vec<PerformedService>,
    pub prescriptions: Vec<Prescription>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_matches_stored_values() {
        for status in [BookingStatus::Scheduled, BookingStatus::Completed, BookingStatus::Canceled] {
            assert_eq!(status.as_str().parse::<BookingStatus>(), Ok(status));
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::Value::String(status.to_string())
            );
        }
        assert!("cancelled".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn only_canceled_bookings_release_their_slot() {
        assert!(BookingStatus::Scheduled.holds_slot());
        assert!(BookingStatus::Completed.holds_slot());
        assert!(!BookingStatus::Canceled.holds_slot());
        assert!(!BookingStatus::Scheduled.is_terminal());
    }
}
