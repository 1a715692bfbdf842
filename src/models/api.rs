//! Тела запросов и ответов HTTP API.
//!
//! Одни и те же структуры использует и сервер (axum), и клиент (reqwest).
//! Запросы принимают как camelCase JSON, так и старые form-поля
//! (`seat_id`, `user_id`, `seat_ids`, `name`).

use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

use super::seat::{Seat, SeatId};

pub const MSG_SEAT_RESERVED: &str = "Seat reserved";
pub const MSG_SEAT_TAKEN: &str = "Seat is already taken";
pub const MSG_SEAT_RELEASED: &str = "Seat released";
pub const MSG_BOOKING_OK: &str = "Booking successful!";
pub const MSG_RESERVATION_INVALID: &str = "Reservation expired or invalid";
pub const MSG_SEAT_NOT_FOUND: &str = "Seat not found";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HoldRequest {
    #[serde(alias = "seat_id")]
    pub seat_id: SeatId,
    #[serde(alias = "user_id")]
    #[validate(length(max = 64), custom(function = "not_blank"))]
    pub client_id: String,
}

pub type ReleaseRequest = HoldRequest;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    #[serde(alias = "user_id")]
    #[validate(length(max = 64), custom(function = "not_blank"))]
    pub client_id: String,
    #[serde(alias = "seat_ids", deserialize_with = "seat_id_list")]
    #[validate(length(min = 1))]
    pub seat_ids: Vec<SeatId>,
    #[serde(alias = "name")]
    #[validate(length(max = 100), custom(function = "not_blank"))]
    pub buyer_name: String,
}

/// Пустая строка и строка из одних пробелов - одно и то же.
fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Список мест: JSON-массив или строка через запятую (form-формат).
fn seat_id_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<SeatId>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Joined(String),
    }

    let parts = match Raw::deserialize(deserializer)? {
        Raw::List(items) => items,
        Raw::Joined(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
    };

    parts
        .iter()
        .map(|part| part.parse().map_err(serde::de::Error::custom))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HeldSeatsQuery {
    #[serde(alias = "user_id")]
    #[validate(length(max = 64), custom(function = "not_blank"))]
    pub client_id: String,
}

/// Корзина клиента: удерживаемые им места и их суммарная цена.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldSeatsResponse {
    pub seats: Vec<Seat>,
    pub total: u64,
}
