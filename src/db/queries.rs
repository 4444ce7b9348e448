use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;

use crate::errors::BookingError;
use crate::models::{Booking, BookingStatus, SelectedOptions, StatusEntry, TimeSlot, Transition};

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

const BOOKING_COLUMNS: &str = "id, service_id, service_name, date, time_slot, other_requirements, \
     selected_options, customer_id, customer_name, status, estimated_charge, initial_estimate, \
     worker_id, worker_name, version, created_at, updated_at";

// ── Bookings ──

/// Inserts a new booking together with its seeded status history.
pub fn create_booking(conn: &Connection, booking: &Booking) -> Result<(), BookingError> {
    let options_json = serde_json::to_string(&booking.selected_options)
        .map_err(|e| BookingError::Corrupt(e.to_string()))?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
        ),
        params![
            booking.id,
            booking.service_id,
            booking.service_name,
            booking.date.format(DATE_FORMAT).to_string(),
            booking.time_slot.as_str(),
            booking.other_requirements,
            options_json,
            booking.customer_id,
            booking.customer_name,
            booking.status.as_str(),
            booking.estimated_charge.map(|d| d.to_string()),
            booking.initial_estimate.map(|d| d.to_string()),
            booking.worker_id,
            booking.worker_name,
            booking.version,
            format_ts(&booking.created_at),
            format_ts(&booking.updated_at),
        ],
    )?;
    for entry in &booking.status_history {
        insert_history(&tx, &booking.id, entry)?;
    }
    tx.commit()?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> Result<Option<Booking>, BookingError> {
    let result = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
            params![id],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;

    match result {
        Some(booking) => {
            let mut booking = booking?;
            load_children(conn, &mut booking)?;
            Ok(Some(booking))
        }
        None => Ok(None),
    }
}

pub fn require_booking(conn: &Connection, id: &str) -> Result<Booking, BookingError> {
    get_booking(conn, id)?.ok_or_else(|| BookingError::NotFound(format!("booking {id}")))
}

/// Every booking on `date`, regardless of status.
pub fn get_bookings_on_date(conn: &Connection, date: NaiveDate) -> Result<Vec<Booking>, BookingError> {
    query_bookings(
        conn,
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE date = ?1 ORDER BY created_at ASC, id ASC"),
        &[&date.format(DATE_FORMAT).to_string()],
    )
}

/// The worker's current assignments on `date`, earliest slot first.
pub fn get_worker_bookings_on_date(
    conn: &Connection,
    worker_id: &str,
    date: NaiveDate,
) -> Result<Vec<Booking>, BookingError> {
    let mut bookings = query_bookings(
        conn,
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE worker_id = ?1 AND date = ?2 AND status != 'canceled'"
        ),
        &[&worker_id, &date.format(DATE_FORMAT).to_string()],
    )?;
    bookings.sort_by_key(|b| b.time_slot.start_minutes());
    Ok(bookings)
}

pub fn list_bookings(
    conn: &Connection,
    status: Option<BookingStatus>,
    date: Option<NaiveDate>,
    limit: i64,
) -> Result<Vec<Booking>, BookingError> {
    let mut clauses = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(status) = status {
        values.push(Box::new(status.as_str()));
        clauses.push(format!("status = ?{}", values.len()));
    }
    if let Some(date) = date {
        values.push(Box::new(date.format(DATE_FORMAT).to_string()));
        clauses.push(format!("date = ?{}", values.len()));
    }
    values.push(Box::new(limit));
    let limit_param = values.len();

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings {where_sql} \
         ORDER BY date DESC, created_at DESC LIMIT ?{limit_param}"
    );

    let params_refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|p| p.as_ref()).collect();
    query_bookings(conn, &sql, &params_refs)
}

/// Commits a state-machine transition atomically.
///
/// The scalar update only applies if the stored version still equals
/// `expected_version`; the history entry and any refusal or displacement are
/// appended in the same SQLite transaction.
pub fn apply_transition(
    conn: &Connection,
    booking: &Booking,
    expected_version: i64,
    transition: &Transition,
) -> Result<(), BookingError> {
    let now = format_ts(&booking.updated_at);
    let tx = conn.unchecked_transaction()?;

    let updated = tx.execute(
        "UPDATE bookings SET
           status = ?1,
           estimated_charge = ?2,
           initial_estimate = ?3,
           worker_id = ?4,
           worker_name = ?5,
           version = version + 1,
           updated_at = ?6
         WHERE id = ?7 AND version = ?8",
        params![
            booking.status.as_str(),
            booking.estimated_charge.map(|d| d.to_string()),
            booking.initial_estimate.map(|d| d.to_string()),
            booking.worker_id,
            booking.worker_name,
            now,
            booking.id,
            expected_version,
        ],
    )?;

    if updated == 0 {
        let exists: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM bookings WHERE id = ?1",
            params![booking.id],
            |row| row.get(0),
        )?;
        return Err(if exists {
            BookingError::Conflict(booking.id.clone())
        } else {
            BookingError::NotFound(format!("booking {}", booking.id))
        });
    }

    insert_history(&tx, &booking.id, &transition.entry)?;

    if let Some(refusal) = &transition.refusal {
        tx.execute(
            "INSERT INTO booking_refusals (booking_id, worker_id, reason, refused_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![booking.id, refusal.worker_id, refusal.reason, now],
        )?;
    }

    if let Some(worker_id) = &transition.displaced_worker {
        tx.execute(
            "INSERT OR IGNORE INTO booking_displaced_workers (booking_id, worker_id, displaced_at)
             VALUES (?1, ?2, ?3)",
            params![booking.id, worker_id, now],
        )?;
    }

    tx.commit()?;
    Ok(())
}

fn insert_history(conn: &Connection, booking_id: &str, entry: &StatusEntry) -> Result<(), BookingError> {
    conn.execute(
        "INSERT INTO booking_status_history (booking_id, status, note, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            booking_id,
            entry.status.as_str(),
            entry.note,
            format_ts(&entry.recorded_at)
        ],
    )?;
    Ok(())
}

fn query_bookings(
    conn: &Connection,
    sql: &str,
    values: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<Booking>, BookingError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(values, |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        let mut booking = row??;
        load_children(conn, &mut booking)?;
        bookings.push(booking);
    }
    Ok(bookings)
}

fn load_children(conn: &Connection, booking: &mut Booking) -> Result<(), BookingError> {
    let mut stmt = conn.prepare(
        "SELECT status, note, recorded_at FROM booking_status_history
         WHERE booking_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![booking.id], |row| {
        let status: String = row.get(0)?;
        let note: Option<String> = row.get(1)?;
        let recorded_at: String = row.get(2)?;
        Ok((status, note, recorded_at))
    })?;

    let mut history = vec![];
    for row in rows {
        let (status, note, recorded_at) = row?;
        history.push(StatusEntry {
            status: parse_status(&status)?,
            recorded_at: parse_ts(&recorded_at)?,
            note,
        });
    }
    booking.status_history = history;

    booking.refused_by = worker_ids(
        conn,
        "SELECT worker_id FROM booking_refusals WHERE booking_id = ?1 ORDER BY refused_at ASC, rowid ASC",
        &booking.id,
    )?;
    booking.canceled_worker_ids = worker_ids(
        conn,
        "SELECT worker_id FROM booking_displaced_workers WHERE booking_id = ?1 ORDER BY displaced_at ASC, rowid ASC",
        &booking.id,
    )?;
    Ok(())
}

fn worker_ids(conn: &Connection, sql: &str, booking_id: &str) -> Result<Vec<String>, BookingError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![booking_id], |row| row.get::<_, String>(0))?;

    let mut ids = vec![];
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

fn parse_booking_row(row: &rusqlite::Row) -> Result<Booking, BookingError> {
    let id: String = row.get(0)?;
    let date_str: String = row.get(3)?;
    let slot_str: String = row.get(4)?;
    let options_json: String = row.get(6)?;
    let status_str: String = row.get(9)?;
    let estimated_charge: Option<String> = row.get(10)?;
    let initial_estimate: Option<String> = row.get(11)?;
    let created_at_str: String = row.get(15)?;
    let updated_at_str: String = row.get(16)?;

    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
        .map_err(|_| BookingError::Corrupt(format!("booking {id} has invalid date {date_str}")))?;
    let time_slot = TimeSlot::parse(&slot_str)
        .map_err(|e| BookingError::Corrupt(format!("booking {id}: {e}")))?;
    let selected_options: SelectedOptions = serde_json::from_str(&options_json)
        .map_err(|e| BookingError::Corrupt(format!("booking {id} options: {e}")))?;

    Ok(Booking {
        id,
        service_id: row.get(1)?,
        service_name: row.get(2)?,
        date,
        time_slot,
        other_requirements: row.get(5)?,
        selected_options,
        customer_id: row.get(7)?,
        customer_name: row.get(8)?,
        status: parse_status(&status_str)?,
        estimated_charge: parse_amount(estimated_charge)?,
        initial_estimate: parse_amount(initial_estimate)?,
        worker_id: row.get(12)?,
        worker_name: row.get(13)?,
        refused_by: vec![],
        canceled_worker_ids: vec![],
        status_history: vec![],
        version: row.get(14)?,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}

fn parse_status(s: &str) -> Result<BookingStatus, BookingError> {
    BookingStatus::parse(s).ok_or_else(|| BookingError::Corrupt(format!("unknown status {s}")))
}

fn parse_amount(value: Option<String>) -> Result<Option<Decimal>, BookingError> {
    value
        .map(|v| Decimal::from_str(&v).map_err(|_| BookingError::Corrupt(format!("invalid amount {v}"))))
        .transpose()
}

pub(crate) fn parse_ts(s: &str) -> Result<NaiveDateTime, BookingError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|_| BookingError::Corrupt(format!("invalid timestamp {s}")))
}

fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}
