use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use darshan_booking::BookingError;
use darshan_catalog::CatalogError;
use darshan_ledger::LedgerError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    TempleClosed(String),
    SlotFull,
    NotFoundError(String),
    ConflictError(String),
    CapacityBelowReserved(String),
    ServiceUnavailable(String),
    Internal(anyhow::Error),
}

impl AppError {
    /// Stable discriminator for clients; the message may change, the kind
    /// does not.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::AuthenticationError(_) => "UNAUTHORIZED",
            AppError::AuthorizationError(_) => "FORBIDDEN",
            AppError::ValidationError(_) => "INVALID_REQUEST",
            AppError::TempleClosed(_) => "TEMPLE_CLOSED",
            AppError::SlotFull => "SLOT_FULL",
            AppError::NotFoundError(_) => "NOT_FOUND",
            AppError::ConflictError(_) => "CONFLICT",
            AppError::CapacityBelowReserved(_) => "CAPACITY_BELOW_RESERVED",
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationError(_) => StatusCode::FORBIDDEN,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::TempleClosed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::SlotFull => StatusCode::CONFLICT,
            AppError::NotFoundError(_) => StatusCode::NOT_FOUND,
            AppError::ConflictError(_) => StatusCode::CONFLICT,
            AppError::CapacityBelowReserved(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal<E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>>(err: E) -> Self {
        AppError::Internal(anyhow::Error::from_boxed(err.into()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = self.status();
        let message = match self {
            AppError::AuthenticationError(msg)
            | AppError::AuthorizationError(msg)
            | AppError::ValidationError(msg)
            | AppError::TempleClosed(msg)
            | AppError::NotFoundError(msg)
            | AppError::ConflictError(msg)
            | AppError::CapacityBelowReserved(msg)
            | AppError::ServiceUnavailable(msg) => msg,
            AppError::SlotFull => "The requested slot is fully booked".to_string(),
            AppError::Internal(err) => {
                tracing::error!("Internal Server Error: {}", err);
                "Internal Server Error".to_string()
            }
        };

        let body = Json(json!({
            "kind": kind,
            "error": message,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::InvalidRequest(msg) => AppError::ValidationError(msg),
            BookingError::TempleClosed(msg) => AppError::TempleClosed(msg),
            BookingError::SlotFull => AppError::SlotFull,
            BookingError::NotFound(id) => AppError::NotFoundError(format!("booking {id} not found")),
            BookingError::InvalidTransition { from, to } => {
                AppError::ConflictError(format!("cannot move booking from {from} to {to}"))
            }
            BookingError::ServiceUnavailable(msg) => AppError::ServiceUnavailable(msg),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::CapacityExceeded { .. } => AppError::SlotFull,
            // Double releases are a programming error, logged rather than
            // surfaced to users.
            LedgerError::InvalidToken => AppError::internal(err),
            LedgerError::CapacityBelowReserved {
                requested,
                reserved,
            } => AppError::CapacityBelowReserved(format!(
                "capacity {requested} is below the already-reserved count {reserved}"
            )),
            LedgerError::Storage(msg) => AppError::ServiceUnavailable(msg),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::InvalidSchedule { reason } => AppError::ValidationError(reason),
        }
    }
}
