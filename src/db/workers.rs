use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::BookingError;
use crate::models::{Worker, WorkerStatus};

pub fn create_worker(conn: &Connection, worker: &Worker) -> Result<(), BookingError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO workers (id, display_name, status) VALUES (?1, ?2, ?3)",
        params![worker.id, worker.display_name, worker.status.as_str()],
    )?;
    for service_id in &worker.services {
        tx.execute(
            "INSERT OR IGNORE INTO worker_services (worker_id, service_id) VALUES (?1, ?2)",
            params![worker.id, service_id],
        )?;
    }
    tx.commit()?;
    Ok(())
}

pub fn get_worker(conn: &Connection, id: &str) -> Result<Option<Worker>, BookingError> {
    let row = conn
        .query_row(
            "SELECT id, display_name, status FROM workers WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, display_name, status)) => Ok(Some(build_worker(conn, id, display_name, &status)?)),
        None => Ok(None),
    }
}

pub fn require_worker(conn: &Connection, id: &str) -> Result<Worker, BookingError> {
    get_worker(conn, id)?.ok_or_else(|| BookingError::NotFound(format!("worker {id}")))
}

/// All workers ordered by display name (byte-wise, then id).
pub fn list_workers(conn: &Connection) -> Result<Vec<Worker>, BookingError> {
    query_workers(
        conn,
        "SELECT id, display_name, status FROM workers ORDER BY display_name ASC, id ASC",
        &[],
    )
}

pub fn list_active_workers_qualified_for(
    conn: &Connection,
    service_id: &str,
) -> Result<Vec<Worker>, BookingError> {
    query_workers(
        conn,
        "SELECT w.id, w.display_name, w.status FROM workers w
         INNER JOIN worker_services s ON s.worker_id = w.id
         WHERE s.service_id = ?1 AND w.status = 'active'
         ORDER BY w.display_name ASC, w.id ASC",
        &[&service_id],
    )
}

pub fn update_worker_status(
    conn: &Connection,
    id: &str,
    status: WorkerStatus,
) -> Result<bool, BookingError> {
    let count = conn.execute(
        "UPDATE workers SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(count > 0)
}

fn query_workers(
    conn: &Connection,
    sql: &str,
    values: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<Worker>, BookingError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(values, |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut workers = vec![];
    for row in rows {
        let (id, display_name, status) = row?;
        workers.push(build_worker(conn, id, display_name, &status)?);
    }
    Ok(workers)
}

fn build_worker(
    conn: &Connection,
    id: String,
    display_name: String,
    status: &str,
) -> Result<Worker, BookingError> {
    let status = WorkerStatus::parse(status)
        .ok_or_else(|| BookingError::Corrupt(format!("worker {id} has unknown status {status}")))?;

    let mut stmt = conn.prepare(
        "SELECT service_id FROM worker_services WHERE worker_id = ?1 ORDER BY service_id ASC",
    )?;
    let rows = stmt.query_map(params![id], |row| row.get::<_, String>(0))?;
    let mut services = vec![];
    for row in rows {
        services.push(row?);
    }

    Ok(Worker {
        id,
        display_name,
        status,
        services,
    })
}
