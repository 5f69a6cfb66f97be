pub mod availability;
pub mod calendar;
pub mod doctor;

pub use availability::AvailabilityService;
pub use calendar::{CalendarPolicy, WorkingWindow};
pub use doctor::DoctorService;
