pub mod booking;
pub mod completion;
pub mod lifecycle;

pub use booking::BookingService;
pub use completion::CompletionService;
pub use lifecycle::BookingLifecycleService;
