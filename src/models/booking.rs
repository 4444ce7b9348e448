use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::catalog::SelectedOptions;
use super::time_slot::TimeSlot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub service_id: String,
    pub service_name: String,
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub other_requirements: Option<String>,
    pub selected_options: SelectedOptions,
    pub customer_id: String,
    pub customer_name: String,
    pub status: BookingStatus,
    pub estimated_charge: Option<Decimal>,
    pub initial_estimate: Option<Decimal>,
    pub worker_id: Option<String>,
    pub worker_name: Option<String>,
    pub refused_by: Vec<String>,
    pub canceled_worker_ids: Vec<String>,
    pub status_history: Vec<StatusEntry>,
    pub version: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    pub fn has_refused(&self, worker_id: &str) -> bool {
        self.refused_by.iter().any(|w| w == worker_id)
    }

    pub fn is_assigned_to(&self, worker_id: &str) -> bool {
        self.worker_id.as_deref() == Some(worker_id)
    }
}

/// Where a booking sits in its lifecycle.
///
/// `AwaitingEstimate` and `AwaitingAssignment` are both "pending manager
/// approval"; they differ in whether the customer has already accepted a
/// price, which decides if the manager estimates or assigns next.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    AwaitingEstimate,
    AwaitingAssignment,
    PendingCustomerApproval,
    WorkerAssigned,
    InProgress,
    Completed,
    Canceled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::AwaitingEstimate => "awaiting_estimate",
            BookingStatus::AwaitingAssignment => "awaiting_assignment",
            BookingStatus::PendingCustomerApproval => "pending_customer_approval",
            BookingStatus::WorkerAssigned => "worker_assigned",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "awaiting_estimate" => Some(BookingStatus::AwaitingEstimate),
            "awaiting_assignment" => Some(BookingStatus::AwaitingAssignment),
            "pending_customer_approval" => Some(BookingStatus::PendingCustomerApproval),
            "worker_assigned" => Some(BookingStatus::WorkerAssigned),
            "in_progress" => Some(BookingStatus::InProgress),
            "completed" => Some(BookingStatus::Completed),
            "canceled" => Some(BookingStatus::Canceled),
            _ => None,
        }
    }

    /// Human-facing label; both manager sub-states share one.
    pub fn label(&self) -> &'static str {
        match self {
            BookingStatus::AwaitingEstimate | BookingStatus::AwaitingAssignment => {
                "Pending Manager Approval"
            }
            BookingStatus::PendingCustomerApproval => "Pending Customer Approval",
            BookingStatus::WorkerAssigned => "Worker Assigned",
            BookingStatus::InProgress => "In Progress",
            BookingStatus::Completed => "Completed",
            BookingStatus::Canceled => "Canceled",
        }
    }

    pub fn is_pending_manager_approval(&self) -> bool {
        matches!(
            self,
            BookingStatus::AwaitingEstimate | BookingStatus::AwaitingAssignment
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: BookingStatus,
    pub recorded_at: NaiveDateTime,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refusal {
    pub worker_id: String,
    pub reason: Option<String>,
}

/// Everything a committed status change appends to the store, alongside the
/// booking's updated scalar fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: BookingStatus,
    pub entry: StatusEntry,
    pub refusal: Option<Refusal>,
    pub displaced_worker: Option<String>,
}

/// Customer input for a new booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub service_id: String,
    #[serde(default)]
    pub selected_options: SelectedOptions,
    pub date: NaiveDate,
    pub time_slot: String,
    pub customer_id: String,
    pub customer_name: String,
    #[serde(default)]
    pub other_requirements: Option<String>,
}
