use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::{queries, workers};
use crate::errors::{AppError, BookingError};
use crate::models::{Worker, WorkerStatus};
use crate::state::AppState;

use super::bookings::{parse_date, BookingResponse};

// GET /api/workers
pub async fn list_workers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Worker>>, AppError> {
    let db = state.conn()?;
    Ok(Json(workers::list_workers(&db)?))
}

// POST /api/workers
#[derive(Deserialize)]
pub struct CreateWorkerRequest {
    pub display_name: String,
    #[serde(default)]
    pub services: Vec<String>,
}

pub async fn create_worker(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateWorkerRequest>,
) -> Result<(StatusCode, Json<Worker>), AppError> {
    let display_name = req.display_name.trim();
    if display_name.is_empty() {
        return Err(BookingError::Validation("display_name is required".to_string()).into());
    }

    let mut services = req.services;
    services.sort();
    services.dedup();
    if let Some(unknown) = services.iter().find(|s| state.catalog.service(s).is_none()) {
        return Err(BookingError::Validation(format!("unknown service {unknown}")).into());
    }

    let worker = Worker {
        id: uuid::Uuid::new_v4().to_string(),
        display_name: display_name.to_string(),
        status: WorkerStatus::Active,
        services,
    };

    {
        let db = state.conn()?;
        workers::create_worker(&db, &worker)?;
    }
    tracing::info!(worker_id = %worker.id, services = ?worker.services, "worker registered");

    Ok((StatusCode::CREATED, Json(worker)))
}

// POST /api/workers/:id/status
#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Worker>, AppError> {
    let status = WorkerStatus::parse(&req.status)
        .ok_or_else(|| BookingError::Validation(format!("unknown worker status {}", req.status)))?;

    let db = state.conn()?;
    if !workers::update_worker_status(&db, &id, status)? {
        return Err(BookingError::NotFound(format!("worker {id}")).into());
    }
    tracing::info!(worker_id = %id, status = status.as_str(), "worker status changed");

    Ok(Json(workers::require_worker(&db, &id)?))
}

// GET /api/workers/:id/schedule
#[derive(Deserialize)]
pub struct ScheduleQuery {
    pub date: Option<String>,
}

#[derive(Serialize)]
pub struct ScheduleResponse {
    worker_id: String,
    date: chrono::NaiveDate,
    bookings: Vec<BookingResponse>,
}

pub async fn schedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<ScheduleResponse>, AppError> {
    let date = match query.date.as_deref().filter(|d| !d.is_empty()) {
        Some(d) => parse_date(d)?,
        None => chrono::Local::now().date_naive(),
    };

    let db = state.conn()?;
    workers::require_worker(&db, &id)?;
    let bookings = queries::get_worker_bookings_on_date(&db, &id, date)?;

    Ok(Json(ScheduleResponse {
        worker_id: id,
        date,
        bookings: bookings.into_iter().map(Into::into).collect(),
    }))
}
