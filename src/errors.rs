use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::BookingStatus;
use crate::services::eligibility::Disqualification;

/// Failures of the booking core. Every variant is raised before any write is
/// issued, except `Conflict`, which is detected by the store's version check
/// and leaves the record untouched.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("cannot {operation}: booking is {status}")]
    InvalidTransition {
        operation: &'static str,
        status: BookingStatus,
    },

    #[error("worker {worker_id} is not eligible for booking {booking_id}: {reason}")]
    Ineligible {
        booking_id: String,
        worker_id: String,
        reason: Disqualification,
    },

    #[error("booking {0} was modified concurrently, reload and retry")]
    Conflict(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl BookingError {
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::NotFound(_) => "not_found",
            BookingError::InvalidTransition { .. } => "invalid_transition",
            BookingError::Ineligible { .. } => "ineligible",
            BookingError::Conflict(_) => "conflict",
            BookingError::Validation(_) => "validation_error",
            BookingError::Database(_) | BookingError::Corrupt(_) => "internal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::InvalidTransition { .. } => StatusCode::CONFLICT,
            BookingError::Ineligible { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::Conflict(_) => StatusCode::CONFLICT,
            BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::Database(_) | BookingError::Corrupt(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("AI provider error: {0}")]
    Ai(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Booking(e) => (e.status_code(), e.code()),
            AppError::Ai(_) => (StatusCode::BAD_GATEWAY, "oracle_unavailable"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string(), "code": code });
        (status, axum::Json(body)).into_response()
    }
}
