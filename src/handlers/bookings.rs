use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::{AppError, BookingError};
use crate::models::{Booking, BookingStatus, NewBooking, ServiceDefinition, WorkerSummary};
use crate::services::lifecycle;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

/// A booking as the API returns it: the stored record plus the display label
/// the dashboards show for its status.
#[derive(Serialize)]
pub struct BookingResponse {
    #[serde(flatten)]
    booking: Booking,
    status_label: &'static str,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        let status_label = booking.status.label();
        Self {
            booking,
            status_label,
        }
    }
}

// GET /api/services
pub async fn list_services(State(state): State<Arc<AppState>>) -> Json<Vec<ServiceDefinition>> {
    Json(state.catalog.services.clone())
}

// POST /api/bookings
#[derive(Serialize)]
pub struct CreateBookingResponse {
    booking: BookingResponse,
    calculated_estimate: Decimal,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewBooking>,
) -> Result<(StatusCode, Json<CreateBookingResponse>), AppError> {
    let created = {
        let db = state.conn()?;
        lifecycle::create_booking(&db, &state.catalog, &input)?
    };
    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse {
            booking: created.booking.into(),
            calculated_estimate: created.calculated_estimate,
        }),
    ))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub date: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| {
            BookingStatus::parse(s)
                .ok_or_else(|| BookingError::Validation(format!("unknown status {s}")))
        })
        .transpose()?;
    let date = query
        .date
        .as_deref()
        .filter(|d| !d.is_empty())
        .map(parse_date)
        .transpose()?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let bookings = {
        let db = state.conn()?;
        queries::list_bookings(&db, status, date, limit)?
    };
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let db = state.conn()?;
    Ok(Json(lifecycle::get_booking(&db, &id)?.into()))
}

// GET /api/bookings/:id/estimate
#[derive(Serialize)]
pub struct EstimateResponse {
    booking_id: String,
    calculated_estimate: Decimal,
}

pub async fn get_calculated_estimate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EstimateResponse>, AppError> {
    let db = state.conn()?;
    let calculated_estimate = lifecycle::calculated_estimate(&db, &state.catalog, &id)?;
    Ok(Json(EstimateResponse {
        booking_id: id,
        calculated_estimate,
    }))
}

// POST /api/bookings/:id/estimate
#[derive(Deserialize)]
pub struct SubmitEstimateRequest {
    pub amount: Decimal,
}

pub async fn submit_estimate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SubmitEstimateRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let db = state.conn()?;
    Ok(Json(lifecycle::submit_estimate(&db, &id, req.amount)?.into()))
}

// POST /api/bookings/:id/estimate/accept
pub async fn accept_estimate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let db = state.conn()?;
    Ok(Json(lifecycle::accept_estimate(&db, &id)?.into()))
}

// POST /api/bookings/:id/estimate/reject
pub async fn reject_estimate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let db = state.conn()?;
    Ok(Json(lifecycle::reject_estimate(&db, &id)?.into()))
}

// GET /api/bookings/:id/eligible-workers
pub async fn get_eligible_workers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<WorkerSummary>>, AppError> {
    let db = state.conn()?;
    Ok(Json(lifecycle::get_eligible_workers(&db, &id)?))
}

// POST /api/bookings/:id/assign
#[derive(Deserialize)]
pub struct AssignRequest {
    pub worker_id: String,
    #[serde(default)]
    pub previous_worker_id: Option<String>,
}

pub async fn assign_worker(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let db = state.conn()?;
    let booking = lifecycle::assign_worker(
        &db,
        &id,
        &req.worker_id,
        req.previous_worker_id.as_deref(),
    )?;
    Ok(Json(booking.into()))
}

// POST /api/bookings/:id/accept
pub async fn accept_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let db = state.conn()?;
    Ok(Json(lifecycle::accept_job(&db, &id)?.into()))
}

// POST /api/bookings/:id/refuse
#[derive(Deserialize)]
pub struct RefuseRequest {
    pub worker_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn refuse_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RefuseRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let db = state.conn()?;
    Ok(Json(
        lifecycle::refuse_job(&db, &id, &req.worker_id, req.reason)?.into(),
    ))
}

// POST /api/bookings/:id/complete
#[derive(Deserialize)]
pub struct CompleteRequest {
    pub final_amount: Decimal,
}

pub async fn complete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let db = state.conn()?;
    Ok(Json(lifecycle::complete_job(&db, &id, req.final_amount)?.into()))
}

// POST /api/bookings/:id/cancel
#[derive(Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let db = state.conn()?;
    Ok(Json(lifecycle::cancel_booking(&db, &id, req.reason)?.into()))
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, BookingError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| BookingError::Validation(format!("invalid date {s}, expected YYYY-MM-DD")))
}
