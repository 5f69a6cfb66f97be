use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;

use shared_config::{AppConfig, ClinicHours};

/// The bookable part of one day: `[start, end)` cut into equal slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkingWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub slot_duration: Duration,
}

impl WorkingWindow {
    /// Slot start times, ascending, inclusive of `start` and exclusive of `end`.
    pub fn slot_starts(&self) -> Vec<NaiveTime> {
        let step = self.slot_duration.num_minutes();
        if step <= 0 || self.start >= self.end {
            return Vec::new();
        }

        let slots = (self.end - self.start).num_minutes() / step;
        (0..slots)
            .map(|i| self.start + Duration::minutes(i * step))
            .collect()
    }

    /// Whether `time` is exactly the start of one of this window's slots.
    pub fn is_slot_start(&self, time: NaiveTime) -> bool {
        let step = self.slot_duration.num_minutes();
        if step <= 0 || time < self.start || time >= self.end {
            return false;
        }
        if time.second() != 0 || time.nanosecond() != 0 {
            return false;
        }
        (time - self.start).num_minutes() % step == 0
    }
}

/// Fixed clinic calendar: the same window on every date, no weekend or
/// holiday carve-outs. The hours come from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarPolicy {
    hours: ClinicHours,
}

impl Default for CalendarPolicy {
    fn default() -> Self {
        Self::new(ClinicHours::default())
    }
}

impl CalendarPolicy {
    pub fn new(hours: ClinicHours) -> Self {
        Self { hours }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.clinic_hours)
    }

    pub fn working_window(&self, _date: NaiveDate) -> WorkingWindow {
        WorkingWindow {
            start: self.hours.day_start,
            end: self.hours.day_end,
            slot_duration: Duration::minutes(i64::from(self.hours.slot_minutes)),
        }
    }

    pub fn is_bookable(&self, date_time: NaiveDateTime) -> bool {
        self.working_window(date_time.date())
            .is_slot_start(date_time.time())
    }
}
