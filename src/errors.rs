use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::ledger::store::StoreError;
use crate::ledger::LedgerError;
use crate::services::proofs::ProofError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => AppError::Unavailable(msg),
            StoreError::BookingMissing(id) => AppError::NotFound(format!("booking {id}")),
            StoreError::SeatClaimed(_) | StoreError::SoldOut | StoreError::StaleBooking => {
                AppError::Conflict(err.to_string())
            }
            StoreError::Backend(msg) => AppError::Internal(msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::from(err).into()
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::ScheduleNotFound(_) | LedgerError::BookingNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            LedgerError::ScheduleExpired
            | LedgerError::SeatInvalid(_)
            | LedgerError::FareMismatch { .. }
            | LedgerError::Validation(_) => AppError::Validation(err.to_string()),
            LedgerError::SeatUnavailable(_)
            | LedgerError::AlreadyCancelled
            | LedgerError::CancellationWindowClosed
            | LedgerError::PaidAfterCancellation(_)
            | LedgerError::InvalidPaymentTransition { .. } => AppError::Conflict(err.to_string()),
            LedgerError::Store(store) => store.into(),
        }
    }
}

impl From<ProofError> for AppError {
    fn from(err: ProofError) -> Self {
        match err {
            ProofError::TooLarge(_) => AppError::PayloadTooLarge(err.to_string()),
            ProofError::Io(e) => AppError::Internal(e.to_string()),
            _ => AppError::Validation(err.to_string()),
        }
    }
}
