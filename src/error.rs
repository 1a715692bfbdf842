//! Ошибки ядра бронирования и их отображение в HTTP-ответы.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::models::api::{
    OperationResult, MSG_RESERVATION_INVALID, MSG_SEAT_NOT_FOUND, MSG_SEAT_TAKEN,
};
use crate::models::SeatId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReservationError {
    #[error("seat {0} not found")]
    NotFound(SeatId),
    #[error("seat {0} is not available to this client")]
    SeatUnavailable(SeatId),
    #[error("seats are not all held by the requesting client")]
    InvalidReservation,
    /// Проигранная гонка CAS. Наружу не выходит: движок повторяет попытку.
    #[error("concurrent update on seat {0}")]
    Conflict(SeatId),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ReservationError {
    /// Сообщение для клиента в поле `message`.
    pub fn user_message(&self) -> String {
        match self {
            ReservationError::NotFound(_) => MSG_SEAT_NOT_FOUND.to_string(),
            ReservationError::SeatUnavailable(_) | ReservationError::Conflict(_) => {
                MSG_SEAT_TAKEN.to_string()
            }
            ReservationError::InvalidReservation => MSG_RESERVATION_INVALID.to_string(),
            ReservationError::InvalidInput(reason) => reason.clone(),
        }
    }

    pub fn to_result(&self) -> OperationResult {
        OperationResult::failed(self.user_message())
    }
}

/// Ошибка обработчика: HTTP-статус плюс тело `{success: false, message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: OperationResult,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, body: OperationResult::failed(message) }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ReservationError> for ApiError {
    fn from(err: ReservationError) -> Self {
        // Бизнес-отказы - это 200 с success=false; клиент читает поле success.
        let status = match &err {
            ReservationError::NotFound(_) => StatusCode::NOT_FOUND,
            ReservationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ReservationError::SeatUnavailable(_)
            | ReservationError::InvalidReservation
            | ReservationError::Conflict(_) => StatusCode::OK,
        };
        Self { status, body: err.to_result() }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<&str> = field_errors.keys().map(|k| k.as_ref()).collect();
        fields.sort_unstable();
        Self::bad_request(format!("invalid fields: {}", fields.join(", ")))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
