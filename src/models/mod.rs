pub mod booking;
pub mod catalog;
pub mod time_slot;
pub mod worker;

pub use booking::{Booking, BookingStatus, NewBooking, Refusal, StatusEntry, Transition};
pub use catalog::{
    OptionSelection, PricingRule, SelectedOptions, SelectionMode, ServiceCatalog,
    ServiceDefinition, ServiceOption, SubCategory,
};
pub use time_slot::{TimeSlot, TIME_SLOTS};
pub use worker::{Worker, WorkerStatus, WorkerSummary};
