use serde::Serialize;

use crate::models::{Booking, BookingStatus, Worker};

/// Two jobs for the same worker must start at least this far apart.
pub const MIN_GAP_MINUTES: u32 = 120;

/// Why a worker cannot take a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Disqualification {
    Inactive,
    NotQualified { service_id: String },
    PreviouslyRefused,
    TimeConflict { booking_id: String, time_slot: String },
}

impl std::fmt::Display for Disqualification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disqualification::Inactive => write!(f, "worker is inactive"),
            Disqualification::NotQualified { service_id } => {
                write!(f, "worker is not qualified for {service_id}")
            }
            Disqualification::PreviouslyRefused => {
                write!(f, "worker has already refused this booking")
            }
            Disqualification::TimeConflict {
                booking_id,
                time_slot,
            } => write!(
                f,
                "worker has booking {booking_id} at {time_slot}, less than 2 hours apart"
            ),
        }
    }
}

/// Runs every eligibility rule for one worker. `same_day` may contain the
/// booking itself and bookings from other dates; both are ignored.
pub fn check_worker(
    booking: &Booking,
    same_day: &[Booking],
    worker: &Worker,
) -> Result<(), Disqualification> {
    if !worker.is_active() {
        return Err(Disqualification::Inactive);
    }
    if !worker.is_qualified_for(&booking.service_id) {
        return Err(Disqualification::NotQualified {
            service_id: booking.service_id.clone(),
        });
    }
    if booking.has_refused(&worker.id) {
        return Err(Disqualification::PreviouslyRefused);
    }

    let clash = same_day.iter().find(|other| {
        other.id != booking.id
            && other.date == booking.date
            && other.status != BookingStatus::Canceled
            && other.is_assigned_to(&worker.id)
            && other.time_slot.minutes_between(&booking.time_slot) < MIN_GAP_MINUTES
    });

    match clash {
        Some(other) => Err(Disqualification::TimeConflict {
            booking_id: other.id.clone(),
            time_slot: other.time_slot.to_string(),
        }),
        None => Ok(()),
    }
}

/// Workers that may be assigned to `booking`, sorted by display name.
pub fn eligible_workers(booking: &Booking, same_day: &[Booking], workers: &[Worker]) -> Vec<Worker> {
    let mut eligible: Vec<Worker> = workers
        .iter()
        .filter(|w| check_worker(booking, same_day, w).is_ok())
        .cloned()
        .collect();

    eligible.sort_by(|a, b| {
        a.display_name
            .cmp(&b.display_name)
            .then_with(|| a.id.cmp(&b.id))
    });
    eligible
}
