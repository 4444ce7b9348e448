//! The booking state machine, free of I/O.
//!
//! Each operation checks its preconditions against the in-memory booking
//! first and only then mutates it, returning the [`Transition`] the store must
//! append. On error the booking is left exactly as it was passed in.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::errors::BookingError;
use crate::models::{
    Booking, BookingStatus, NewBooking, Refusal, ServiceDefinition, StatusEntry, TimeSlot,
    Transition, Worker,
};
use crate::services::eligibility;

use BookingStatus::*;

pub fn new_booking(
    id: String,
    input: &NewBooking,
    service: &ServiceDefinition,
    now: NaiveDateTime,
) -> Result<Booking, BookingError> {
    if input.customer_id.trim().is_empty() {
        return Err(BookingError::Validation("customer id is required".to_string()));
    }
    if input.customer_name.trim().is_empty() {
        return Err(BookingError::Validation("customer name is required".to_string()));
    }
    let time_slot =
        TimeSlot::parse(&input.time_slot).map_err(|e| BookingError::Validation(e.to_string()))?;
    service
        .validate_selection(&input.selected_options)
        .map_err(BookingError::Validation)?;

    Ok(Booking {
        id,
        service_id: service.id.clone(),
        service_name: service.name.clone(),
        date: input.date,
        time_slot,
        other_requirements: input
            .other_requirements
            .clone()
            .filter(|r| !r.trim().is_empty()),
        selected_options: input.selected_options.clone(),
        customer_id: input.customer_id.clone(),
        customer_name: input.customer_name.clone(),
        status: AwaitingEstimate,
        estimated_charge: None,
        initial_estimate: None,
        worker_id: None,
        worker_name: None,
        refused_by: vec![],
        canceled_worker_ids: vec![],
        status_history: vec![StatusEntry {
            status: AwaitingEstimate,
            recorded_at: now,
            note: None,
        }],
        version: 1,
        created_at: now,
        updated_at: now,
    })
}

/// Stores the manager's quote and hands the booking to the customer.
pub fn submit_estimate(
    booking: &mut Booking,
    amount: Decimal,
    now: NaiveDateTime,
) -> Result<Transition, BookingError> {
    require(booking, "submit estimate", &[AwaitingEstimate])?;
    require_positive(amount, "estimate")?;

    booking.estimated_charge = Some(amount);
    if booking.initial_estimate.is_none() {
        booking.initial_estimate = Some(amount);
    }
    Ok(record(
        booking,
        PendingCustomerApproval,
        Some(format!("estimate {amount}")),
        now,
    ))
}

pub fn accept_estimate(booking: &mut Booking, now: NaiveDateTime) -> Result<Transition, BookingError> {
    require(booking, "accept estimate", &[PendingCustomerApproval])?;
    Ok(record(booking, AwaitingAssignment, None, now))
}

pub fn reject_estimate(booking: &mut Booking, now: NaiveDateTime) -> Result<Transition, BookingError> {
    require(booking, "reject estimate", &[PendingCustomerApproval])?;
    Ok(record(
        booking,
        Canceled,
        Some("estimate rejected by customer".to_string()),
        now,
    ))
}

/// Assigns or re-assigns `worker`. Re-assignment always lands in
/// `WorkerAssigned`, so the new worker has to accept the job themselves.
///
/// `expected_previous` is the worker the caller believes is currently
/// assigned; a mismatch means the caller acted on a stale read.
pub fn assign_worker(
    booking: &mut Booking,
    worker: &Worker,
    same_day: &[Booking],
    expected_previous: Option<&str>,
    now: NaiveDateTime,
) -> Result<Transition, BookingError> {
    require(
        booking,
        "assign worker",
        &[AwaitingAssignment, WorkerAssigned, InProgress],
    )?;

    if let Some(expected) = expected_previous {
        if !booking.is_assigned_to(expected) {
            return Err(BookingError::Conflict(booking.id.clone()));
        }
    }
    if booking.is_assigned_to(&worker.id) {
        return Err(BookingError::Validation(format!(
            "worker {} is already assigned to booking {}",
            worker.id, booking.id
        )));
    }
    eligibility::check_worker(booking, same_day, worker).map_err(|reason| {
        BookingError::Ineligible {
            booking_id: booking.id.clone(),
            worker_id: worker.id.clone(),
            reason,
        }
    })?;

    let displaced = booking.worker_id.take();
    if let Some(previous) = &displaced {
        if !booking.canceled_worker_ids.contains(previous) {
            booking.canceled_worker_ids.push(previous.clone());
        }
    }
    booking.worker_id = Some(worker.id.clone());
    booking.worker_name = Some(worker.display_name.clone());

    let note = match &displaced {
        Some(previous) => format!("reassigned from {previous} to {}", worker.id),
        None => format!("assigned to {}", worker.id),
    };
    let mut transition = record(booking, WorkerAssigned, Some(note), now);
    transition.displaced_worker = displaced;
    Ok(transition)
}

pub fn accept_job(booking: &mut Booking, now: NaiveDateTime) -> Result<Transition, BookingError> {
    require(booking, "accept job", &[WorkerAssigned])?;
    Ok(record(booking, InProgress, None, now))
}

/// The refusing worker is remembered forever and the booking goes back to
/// the manager with its estimate intact.
pub fn refuse_job(
    booking: &mut Booking,
    worker_id: &str,
    reason: Option<String>,
    now: NaiveDateTime,
) -> Result<Transition, BookingError> {
    require(booking, "refuse job", &[WorkerAssigned, InProgress])?;
    if !booking.is_assigned_to(worker_id) {
        return Err(BookingError::Validation(format!(
            "worker {worker_id} is not assigned to booking {}",
            booking.id
        )));
    }

    let reason = reason.filter(|r| !r.trim().is_empty());
    booking.refused_by.push(worker_id.to_string());
    booking.worker_id = None;
    booking.worker_name = None;

    let note = match &reason {
        Some(r) => format!("refused by {worker_id}: {r}"),
        None => format!("refused by {worker_id}"),
    };
    let mut transition = record(booking, AwaitingAssignment, Some(note), now);
    transition.refusal = Some(Refusal {
        worker_id: worker_id.to_string(),
        reason,
    });
    Ok(transition)
}

pub fn complete_job(
    booking: &mut Booking,
    final_amount: Decimal,
    now: NaiveDateTime,
) -> Result<Transition, BookingError> {
    require(booking, "complete job", &[InProgress])?;
    require_positive(final_amount, "final charge")?;

    booking.estimated_charge = Some(final_amount);
    Ok(record(
        booking,
        Completed,
        Some(format!("final charge {final_amount}")),
        now,
    ))
}

/// Manager cancellation; not allowed once work has started.
pub fn cancel_booking(
    booking: &mut Booking,
    reason: Option<String>,
    now: NaiveDateTime,
) -> Result<Transition, BookingError> {
    require(
        booking,
        "cancel booking",
        &[
            AwaitingEstimate,
            AwaitingAssignment,
            PendingCustomerApproval,
            WorkerAssigned,
        ],
    )?;
    let note = reason.filter(|r| !r.trim().is_empty());
    Ok(record(booking, Canceled, note, now))
}

fn require(
    booking: &Booking,
    operation: &'static str,
    allowed: &[BookingStatus],
) -> Result<(), BookingError> {
    if allowed.contains(&booking.status) {
        Ok(())
    } else {
        Err(BookingError::InvalidTransition {
            operation,
            status: booking.status,
        })
    }
}

fn require_positive(amount: Decimal, what: &str) -> Result<(), BookingError> {
    if amount <= Decimal::ZERO {
        return Err(BookingError::Validation(format!(
            "{what} must be positive, got {amount}"
        )));
    }
    Ok(())
}

fn record(
    booking: &mut Booking,
    to: BookingStatus,
    note: Option<String>,
    now: NaiveDateTime,
) -> Transition {
    let from = booking.status;
    let entry = StatusEntry {
        status: to,
        recorded_at: now,
        note,
    };
    booking.status = to;
    booking.status_history.push(entry.clone());
    booking.updated_at = now;

    Transition {
        from,
        entry,
        refusal: None,
        displaced_worker: None,
    }
}
