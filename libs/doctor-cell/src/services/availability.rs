use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Timelike};
use tracing::debug;
use uuid::Uuid;

use shared_database::{AppState, ClinicStore};
use shared_models::clinic::{DATE_FORMAT, SLOT_FORMAT};

use crate::models::SlotError;
use crate::services::calendar::CalendarPolicy;

/// Computes free slots by subtracting a doctor's live bookings from the
/// working window. Read-only against booking state.
pub struct AvailabilityService {
    store: Arc<dyn ClinicStore>,
    calendar: CalendarPolicy,
}

impl AvailabilityService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(state.store.clone(), CalendarPolicy::from_config(&state.config))
    }

    pub fn with_store(store: Arc<dyn ClinicStore>, calendar: CalendarPolicy) -> Self {
        Self { store, calendar }
    }

    pub fn calendar(&self) -> &CalendarPolicy {
        &self.calendar
    }

    /// Times of day held by bookings that are not canceled, truncated to the
    /// minute so rows written with seconds still block their slot.
    pub async fn busy_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<BTreeSet<NaiveTime>, SlotError> {
        let bookings = self.store.bookings_for_doctor_on(doctor_id, date).await?;

        Ok(bookings
            .into_iter()
            .filter(|b| b.status.holds_slot())
            .map(|b| truncate_to_minute(b.time_of_day()))
            .collect())
    }

    /// Slot starts of the working window not held by a live booking, ascending.
    /// An unknown doctor has no bookings, so the whole window comes back.
    pub async fn free_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, SlotError> {
        debug!("Calculating free slots for doctor {} on {}", doctor_id, date);

        let busy = self.busy_slots(doctor_id, date).await?;
        let free: Vec<NaiveTime> = self
            .calendar
            .working_window(date)
            .slot_starts()
            .into_iter()
            .filter(|slot| !busy.contains(slot))
            .collect();

        debug!("Found {} free slots ({} busy)", free.len(), busy.len());
        Ok(free)
    }

    /// Same as [`free_slots`](Self::free_slots) for a `YYYY-MM-DD` date string.
    pub async fn free_slots_on(
        &self,
        doctor_id: Uuid,
        raw_date: &str,
    ) -> Result<Vec<NaiveTime>, SlotError> {
        let date = parse_date(raw_date)?;
        self.free_slots(doctor_id, date).await
    }
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, SlotError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| SlotError::InvalidArgument(format!("'{}' is not a YYYY-MM-DD date", raw)))
}

pub fn format_slots(slots: &[NaiveTime]) -> Vec<String> {
    slots
        .iter()
        .map(|slot| slot.format(SLOT_FORMAT).to_string())
        .collect()
}
