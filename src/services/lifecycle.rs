use chrono::{NaiveDateTime, Timelike, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::{queries, workers};
use crate::errors::BookingError;
use crate::models::{Booking, NewBooking, ServiceCatalog, Transition, WorkerSummary};
use crate::services::{eligibility, estimate, transitions};

#[derive(Debug, Clone, Serialize)]
pub struct CreatedBooking {
    pub booking: Booking,
    pub calculated_estimate: Decimal,
}

pub fn create_booking(
    conn: &Connection,
    catalog: &ServiceCatalog,
    input: &NewBooking,
) -> Result<CreatedBooking, BookingError> {
    let service = catalog
        .service(&input.service_id)
        .ok_or_else(|| BookingError::Validation(format!("unknown service {}", input.service_id)))?;

    let id = uuid::Uuid::new_v4().to_string();
    let booking = transitions::new_booking(id, input, service, now())?;
    let calculated_estimate = estimate::calculate(service, &booking.selected_options);
    queries::create_booking(conn, &booking)?;

    tracing::info!(
        booking_id = %booking.id,
        service_id = %booking.service_id,
        date = %booking.date,
        time_slot = %booking.time_slot,
        "booking created"
    );

    Ok(CreatedBooking {
        booking,
        calculated_estimate,
    })
}

pub fn get_booking(conn: &Connection, booking_id: &str) -> Result<Booking, BookingError> {
    queries::require_booking(conn, booking_id)
}

/// The calculator's suggestion for an existing booking.
pub fn calculated_estimate(
    conn: &Connection,
    catalog: &ServiceCatalog,
    booking_id: &str,
) -> Result<Decimal, BookingError> {
    let booking = queries::require_booking(conn, booking_id)?;
    estimate::estimate_for(catalog, &booking.service_id, &booking.selected_options).ok_or_else(
        || BookingError::Validation(format!("service {} is no longer offered", booking.service_id)),
    )
}

pub fn submit_estimate(
    conn: &Connection,
    booking_id: &str,
    amount: Decimal,
) -> Result<Booking, BookingError> {
    run(conn, booking_id, |b, now| transitions::submit_estimate(b, amount, now))
}

pub fn accept_estimate(conn: &Connection, booking_id: &str) -> Result<Booking, BookingError> {
    run(conn, booking_id, transitions::accept_estimate)
}

pub fn reject_estimate(conn: &Connection, booking_id: &str) -> Result<Booking, BookingError> {
    run(conn, booking_id, transitions::reject_estimate)
}

/// Eligibility is evaluated against a fresh same-day read; the write is still
/// guarded by the version check, so a concurrent change surfaces as
/// `Conflict` and the caller retries from the top.
pub fn assign_worker(
    conn: &Connection,
    booking_id: &str,
    worker_id: &str,
    previous_worker_id: Option<&str>,
) -> Result<Booking, BookingError> {
    let mut booking = queries::require_booking(conn, booking_id)?;
    let worker = workers::require_worker(conn, worker_id)?;
    let same_day = queries::get_bookings_on_date(conn, booking.date)?;

    let expected_version = booking.version;
    let transition =
        transitions::assign_worker(&mut booking, &worker, &same_day, previous_worker_id, now())?;
    commit(conn, &mut booking, expected_version, &transition)?;
    Ok(booking)
}

pub fn accept_job(conn: &Connection, booking_id: &str) -> Result<Booking, BookingError> {
    run(conn, booking_id, transitions::accept_job)
}

pub fn refuse_job(
    conn: &Connection,
    booking_id: &str,
    worker_id: &str,
    reason: Option<String>,
) -> Result<Booking, BookingError> {
    workers::require_worker(conn, worker_id)?;
    run(conn, booking_id, |b, now| {
        transitions::refuse_job(b, worker_id, reason, now)
    })
}

pub fn complete_job(
    conn: &Connection,
    booking_id: &str,
    final_amount: Decimal,
) -> Result<Booking, BookingError> {
    run(conn, booking_id, |b, now| {
        transitions::complete_job(b, final_amount, now)
    })
}

pub fn cancel_booking(
    conn: &Connection,
    booking_id: &str,
    reason: Option<String>,
) -> Result<Booking, BookingError> {
    run(conn, booking_id, |b, now| {
        transitions::cancel_booking(b, reason, now)
    })
}

/// Active, qualified, non-refusing workers with no clashing job that day,
/// ordered by display name.
pub fn get_eligible_workers(
    conn: &Connection,
    booking_id: &str,
) -> Result<Vec<WorkerSummary>, BookingError> {
    let booking = queries::require_booking(conn, booking_id)?;
    let candidates = workers::list_active_workers_qualified_for(conn, &booking.service_id)?;
    let same_day = queries::get_bookings_on_date(conn, booking.date)?;

    Ok(eligibility::eligible_workers(&booking, &same_day, &candidates)
        .iter()
        .map(|w| w.summary())
        .collect())
}

fn run<F>(conn: &Connection, booking_id: &str, apply: F) -> Result<Booking, BookingError>
where
    F: FnOnce(&mut Booking, NaiveDateTime) -> Result<Transition, BookingError>,
{
    let mut booking = queries::require_booking(conn, booking_id)?;
    let expected_version = booking.version;
    let transition = apply(&mut booking, now())?;
    commit(conn, &mut booking, expected_version, &transition)?;
    Ok(booking)
}

fn commit(
    conn: &Connection,
    booking: &mut Booking,
    expected_version: i64,
    transition: &Transition,
) -> Result<(), BookingError> {
    match queries::apply_transition(conn, booking, expected_version, transition) {
        Ok(()) => {
            booking.version = expected_version + 1;
            tracing::info!(
                booking_id = %booking.id,
                from = %transition.from,
                to = %transition.entry.status,
                worker_id = booking.worker_id.as_deref().unwrap_or("-"),
                "booking transition committed"
            );
            Ok(())
        }
        Err(e) => {
            if matches!(e, BookingError::Conflict(_)) {
                tracing::warn!(
                    booking_id = %booking.id,
                    expected_version,
                    "booking changed since read, transition rejected"
                );
            }
            Err(e)
        }
    }
}

fn now() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{BookingStatus, Worker, WorkerStatus};
    use chrono::NaiveDate;

    fn setup() -> (Connection, ServiceCatalog) {
        (db::init_db(":memory:").unwrap(), ServiceCatalog::builtin().unwrap())
    }

    fn add_worker(conn: &Connection, id: &str, name: &str, services: &[&str]) {
        workers::create_worker(
            conn,
            &Worker {
                id: id.to_string(),
                display_name: name.to_string(),
                status: WorkerStatus::Active,
                services: services.iter().map(|s| s.to_string()).collect(),
            },
        )
        .unwrap();
    }

    fn book(conn: &Connection, catalog: &ServiceCatalog, service: &str, options: &str, slot: &str) -> CreatedBooking {
        let input = NewBooking {
            service_id: service.to_string(),
            selected_options: serde_json::from_str(options).unwrap(),
            date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            time_slot: slot.to_string(),
            customer_id: "c1".to_string(),
            customer_name: "Carol".to_string(),
            other_requirements: None,
        };
        create_booking(conn, catalog, &input).unwrap()
    }

    /// Creates a gardening booking and walks it to `AwaitingAssignment`.
    fn ready_for_assignment(conn: &Connection, catalog: &ServiceCatalog, slot: &str) -> String {
        let id = book(conn, catalog, "gardening", r#"{"duration":"2-hours"}"#, slot).booking.id;
        submit_estimate(conn, &id, Decimal::from(60)).unwrap();
        accept_estimate(conn, &id).unwrap();
        id
    }

    fn eligible_ids(conn: &Connection, booking_id: &str) -> Vec<String> {
        get_eligible_workers(conn, booking_id)
            .unwrap()
            .into_iter()
            .map(|w| w.worker_id)
            .collect()
    }

    #[test]
    fn test_create_returns_calculated_estimate() {
        let (conn, catalog) = setup();
        let created = book(&conn, &catalog, "gardening", r#"{"duration":"3-hours"}"#, "10:00 AM");
        assert_eq!(created.calculated_estimate, Decimal::from(90));
        assert_eq!(created.booking.status, BookingStatus::AwaitingEstimate);
        assert_eq!(
            calculated_estimate(&conn, &catalog, &created.booking.id).unwrap(),
            Decimal::from(90)
        );
    }

    #[test]
    fn test_create_rejects_unknown_service() {
        let (conn, catalog) = setup();
        let input = NewBooking {
            service_id: "car-wash".to_string(),
            selected_options: Default::default(),
            date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            time_slot: "10:00 AM".to_string(),
            customer_id: "c1".to_string(),
            customer_name: "Carol".to_string(),
            other_requirements: None,
        };
        assert!(matches!(
            create_booking(&conn, &catalog, &input),
            Err(BookingError::Validation(_))
        ));
    }

    #[test]
    fn test_submit_estimate_round_trip() {
        let (conn, catalog) = setup();
        let id = book(&conn, &catalog, "gardening", "{}", "10:00 AM").booking.id;
        submit_estimate(&conn, &id, Decimal::from(500)).unwrap();

        let stored = get_booking(&conn, &id).unwrap();
        assert_eq!(stored.status, BookingStatus::PendingCustomerApproval);
        assert_eq!(stored.estimated_charge, Some(Decimal::from(500)));
        assert_eq!(stored.initial_estimate, Some(Decimal::from(500)));
    }

    #[test]
    fn test_rejected_booking_accepts_nothing_further() {
        let (conn, catalog) = setup();
        add_worker(&conn, "w1", "Wendy", &["gardening"]);
        let id = book(&conn, &catalog, "gardening", r#"{"duration":"3-hours"}"#, "10:00 AM").booking.id;
        submit_estimate(&conn, &id, Decimal::from(90)).unwrap();
        reject_estimate(&conn, &id).unwrap();

        let before = get_booking(&conn, &id).unwrap();
        assert_eq!(before.status, BookingStatus::Canceled);

        let attempts = [
            submit_estimate(&conn, &id, Decimal::from(90)),
            accept_estimate(&conn, &id),
            reject_estimate(&conn, &id),
            assign_worker(&conn, &id, "w1", None),
            accept_job(&conn, &id),
            complete_job(&conn, &id, Decimal::from(90)),
            cancel_booking(&conn, &id, None),
        ];
        for attempt in attempts {
            assert!(matches!(attempt, Err(BookingError::InvalidTransition { .. })));
        }

        let after = get_booking(&conn, &id).unwrap();
        assert_eq!(after.status_history, before.status_history);
        assert_eq!(after.version, before.version);
    }

    #[test]
    fn test_accept_job_twice_is_invalid() {
        let (conn, catalog) = setup();
        add_worker(&conn, "w1", "Wendy", &["gardening"]);
        let id = ready_for_assignment(&conn, &catalog, "10:00 AM");
        assign_worker(&conn, &id, "w1", None).unwrap();
        accept_job(&conn, &id).unwrap();

        let before = get_booking(&conn, &id).unwrap();
        assert!(matches!(
            accept_job(&conn, &id),
            Err(BookingError::InvalidTransition { .. })
        ));
        let after = get_booking(&conn, &id).unwrap();
        assert_eq!(after.status, BookingStatus::InProgress);
        assert_eq!(after.status_history, before.status_history);
    }

    #[test]
    fn test_refusal_excludes_worker_from_future_assignment() {
        let (conn, catalog) = setup();
        add_worker(&conn, "w1", "Wendy", &["gardening"]);
        add_worker(&conn, "w2", "Xavier", &["gardening"]);
        let id = ready_for_assignment(&conn, &catalog, "10:00 AM");

        assign_worker(&conn, &id, "w1", None).unwrap();
        let refused = refuse_job(&conn, &id, "w1", Some("double booked".to_string())).unwrap();
        assert_eq!(refused.refused_by, vec!["w1".to_string()]);
        assert_eq!(refused.worker_id, None);
        assert!(refused.status.is_pending_manager_approval());
        assert_eq!(refused.estimated_charge, Some(Decimal::from(60)));

        assert_eq!(eligible_ids(&conn, &id), vec!["w2".to_string()]);
        assert!(matches!(
            assign_worker(&conn, &id, "w1", None),
            Err(BookingError::Ineligible { .. })
        ));
    }

    #[test]
    fn test_time_conflict_window() {
        let (conn, catalog) = setup();
        add_worker(&conn, "w1", "Wendy", &["gardening"]);
        let first = ready_for_assignment(&conn, &catalog, "10:00 AM");
        assign_worker(&conn, &first, "w1", None).unwrap();

        let close = ready_for_assignment(&conn, &catalog, "11:00 AM");
        assert!(eligible_ids(&conn, &close).is_empty());
        assert!(matches!(
            assign_worker(&conn, &close, "w1", None),
            Err(BookingError::Ineligible {
                reason: eligibility::Disqualification::TimeConflict { .. },
                ..
            })
        ));

        let two_hours = ready_for_assignment(&conn, &catalog, "12:00 PM");
        assert_eq!(eligible_ids(&conn, &two_hours), vec!["w1".to_string()]);
        assign_worker(&conn, &two_hours, "w1", None).unwrap();
    }

    #[test]
    fn test_reassign_records_displaced_worker() {
        let (conn, catalog) = setup();
        add_worker(&conn, "w1", "Wendy", &["gardening"]);
        add_worker(&conn, "w2", "Xavier", &["gardening"]);
        let id = ready_for_assignment(&conn, &catalog, "10:00 AM");
        assign_worker(&conn, &id, "w1", None).unwrap();
        accept_job(&conn, &id).unwrap();

        let reassigned = assign_worker(&conn, &id, "w2", Some("w1")).unwrap();
        assert_eq!(reassigned.status, BookingStatus::WorkerAssigned);
        assert_eq!(reassigned.canceled_worker_ids, vec!["w1".to_string()]);

        let stored = get_booking(&conn, &id).unwrap();
        assert_eq!(stored.worker_id.as_deref(), Some("w2"));
        assert_eq!(stored.canceled_worker_ids, vec!["w1".to_string()]);
    }

    #[test]
    fn test_unknown_entities() {
        let (conn, catalog) = setup();
        let id = ready_for_assignment(&conn, &catalog, "10:00 AM");
        assert!(matches!(
            assign_worker(&conn, &id, "ghost", None),
            Err(BookingError::NotFound(_))
        ));
        assert!(matches!(accept_job(&conn, "missing"), Err(BookingError::NotFound(_))));
        assert!(matches!(
            get_eligible_workers(&conn, "missing"),
            Err(BookingError::NotFound(_))
        ));
    }

    #[test]
    fn test_complete_job_sets_final_charge() {
        let (conn, catalog) = setup();
        add_worker(&conn, "w1", "Wendy", &["gardening"]);
        let id = ready_for_assignment(&conn, &catalog, "10:00 AM");
        assign_worker(&conn, &id, "w1", None).unwrap();
        accept_job(&conn, &id).unwrap();
        let done = complete_job(&conn, &id, Decimal::from(75)).unwrap();

        assert_eq!(done.status, BookingStatus::Completed);
        assert_eq!(done.estimated_charge, Some(Decimal::from(75)));
        assert_eq!(done.initial_estimate, Some(Decimal::from(60)));
        let stored = get_booking(&conn, &id).unwrap();
        assert_eq!(stored.status_history.last().map(|e| e.status), Some(BookingStatus::Completed));
    }

    #[test]
    fn test_create_with_oversized_catalog_keeps_base_price() {
        let conn = db::init_db(":memory:").unwrap();
        let catalog = ServiceCatalog::from_json(
            r#"{"services":[{
                "id":"silo-cleaning","name":"Silo Cleaning","base_price":"100000000000000000000",
                "pricing":{"kind":"unit_count","count_category":"num-silos"},
                "sub_categories":[{"id":"num-silos","name":"Silos","options":[
                    {"id":"many","name":"4000000000 Silos"}
                ]}]
            }]}"#,
        )
        .unwrap();

        let created = book(&conn, &catalog, "silo-cleaning", r#"{"num-silos":"many"}"#, "10:00 AM");
        assert_eq!(
            created.calculated_estimate,
            catalog.service("silo-cleaning").unwrap().base_price
        );
        assert_eq!(
            get_booking(&conn, &created.booking.id).unwrap().status,
            BookingStatus::AwaitingEstimate
        );
    }
}
