use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Идентификатор места: пара (ряд, место), на проводе - строка `"ряд-место"`.
///
/// Порядок сравнения - сначала ряд, затем место; на нём держится
/// детерминированный порядок `list()` и порядок захвата блокировок.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeatId {
    pub row: u16,
    pub col: u16,
}

impl SeatId {
    pub const fn new(row: u16, col: u16) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.row, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed seat id {0:?}, expected \"<row>-<col>\"")]
pub struct SeatIdParseError(pub String);

impl FromStr for SeatId {
    type Err = SeatIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SeatIdParseError(s.to_string());
        let (row, col) = s.trim().split_once('-').ok_or_else(malformed)?;
        let row: u16 = row.parse().map_err(|_| malformed())?;
        let col: u16 = col.parse().map_err(|_| malformed())?;
        if row == 0 || col == 0 {
            return Err(malformed());
        }
        Ok(SeatId { row, col })
    }
}

impl Serialize for SeatId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SeatId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Непрозрачный идентификатор клиента. Никакой проверки личности.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Случайный идентификатор для нового клиента.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ClientId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Standard,
    Vip,
}

/// Состояние места в том виде, в каком его видит клиент.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatState {
    Available,
    Held,
    Purchased,
}

/// Изменяемая часть места внутри реестра.
///
/// Ровно один вариант в каждый момент; владелец есть только у `Held`,
/// имя покупателя только у `Purchased`. `Purchased` терминален.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatStatus {
    Available,
    Held {
        holder: ClientId,
        held_at: DateTime<Utc>,
    },
    Purchased {
        purchaser_name: String,
    },
}

impl SeatStatus {
    pub fn state(&self) -> SeatState {
        match self {
            SeatStatus::Available => SeatState::Available,
            SeatStatus::Held { .. } => SeatState::Held,
            SeatStatus::Purchased { .. } => SeatState::Purchased,
        }
    }

    pub fn holder(&self) -> Option<&ClientId> {
        match self {
            SeatStatus::Held { holder, .. } => Some(holder),
            _ => None,
        }
    }

    pub fn is_held_by(&self, client: &ClientId) -> bool {
        self.holder() == Some(client)
    }

    pub fn purchaser_name(&self) -> Option<&str> {
        match self {
            SeatStatus::Purchased { purchaser_name } => Some(purchaser_name),
            _ => None,
        }
    }
}

/// Копия места для снапшота и ответа API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: SeatId,
    pub row: u16,
    pub col: u16,
    pub price: u32,
    pub category: Category,
    pub state: SeatState,
    pub holder_id: Option<ClientId>,
    pub purchaser_name: Option<String>,
}

impl Seat {
    pub fn from_status(id: SeatId, price: u32, category: Category, status: &SeatStatus) -> Self {
        Seat {
            id,
            row: id.row,
            col: id.col,
            price,
            category,
            state: status.state(),
            holder_id: status.holder().cloned(),
            purchaser_name: status.purchaser_name().map(str::to_string),
        }
    }

    pub fn is_held_by(&self, client: &ClientId) -> bool {
        self.state == SeatState::Held && self.holder_id.as_ref() == Some(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_id_round_trips_through_its_wire_form() {
        let id: SeatId = "3-10".parse().unwrap();
        assert_eq!(id, SeatId::new(3, 10));
        assert_eq!(id.to_string(), "3-10");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"3-10\"");
    }

    #[test]
    fn malformed_seat_ids_are_rejected() {
        for raw in ["", "1", "1,1", "a-1", "1-", "0-4", "4-0", "-1-2", "70000-1"] {
            assert!(raw.parse::<SeatId>().is_err(), "{raw:?} should not parse");
        }
        assert!(serde_json::from_str::<SeatId>("\"x-y\"").is_err());
    }

    #[test]
    fn seat_ids_order_by_row_then_col() {
        let mut ids = vec![SeatId::new(2, 1), SeatId::new(1, 10), SeatId::new(1, 2)];
        ids.sort();
        assert_eq!(ids, vec![SeatId::new(1, 2), SeatId::new(1, 10), SeatId::new(2, 1)]);
    }

    #[test]
    fn seat_serializes_with_camel_case_fields() {
        let status = SeatStatus::Held { holder: ClientId::from("u1"), held_at: Utc::now() };
        let seat = Seat::from_status(SeatId::new(1, 1), 12, Category::Standard, &status);
        let json = serde_json::to_value(&seat).unwrap();

        assert_eq!(json["id"], "1-1");
        assert_eq!(json["state"], "held");
        assert_eq!(json["category"], "standard");
        assert_eq!(json["holderId"], "u1");
        assert!(json["purchaserName"].is_null());
    }

    #[test]
    fn generated_client_ids_are_distinct() {
        let a = ClientId::generate();
        let b = ClientId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert_eq!(serde_json::to_value(&a).unwrap(), a.as_str());
    }

    #[test]
    fn purchased_status_has_no_holder() {
        let status = SeatStatus::Purchased { purchaser_name: "Alice".to_string() };
        assert_eq!(status.state(), SeatState::Purchased);
        assert!(status.holder().is_none());
        assert_eq!(status.purchaser_name(), Some("Alice"));
    }
}
