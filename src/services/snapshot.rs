use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::api::HeldSeatsResponse;
use crate::models::{ClientId, Seat};
use crate::registry::SeatRegistry;

/// Копия всех мест на момент чтения.
///
/// Снапшот содержит ровно изменения с номерами `1..=revision`, поэтому
/// два снапшота с одной ревизией совпадают, а меньшая ревизия всегда старше.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub revision: u64,
    pub seats: Vec<Seat>,
}

impl Snapshot {
    pub fn seat(&self, id: crate::models::SeatId) -> Option<&Seat> {
        self.seats.iter().find(|seat| seat.id == id)
    }

    pub fn held_by<'a>(&'a self, client: &'a ClientId) -> impl Iterator<Item = &'a Seat> + 'a {
        self.seats.iter().filter(move |seat| seat.is_held_by(client))
    }
}

// Только чтение: изменять реестр через издателя нельзя.
#[derive(Clone)]
pub struct SnapshotPublisher {
    registry: Arc<SeatRegistry>,
}

impl SnapshotPublisher {
    pub fn new(registry: Arc<SeatRegistry>) -> Self {
        Self { registry }
    }

    pub fn snapshot(&self) -> Snapshot {
        let (revision, seats) = self.registry.consistent_view();
        Snapshot { revision, seats }
    }

    /// Корзина клиента: его холды и их сумма.
    pub fn held_by(&self, client: &ClientId) -> HeldSeatsResponse {
        let seats: Vec<Seat> = self
            .registry
            .list()
            .into_iter()
            .filter(|seat| seat.is_held_by(client))
            .collect();
        let total = seats.iter().map(|seat| u64::from(seat.price)).sum();
        HeldSeatsResponse { seats, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VenueConfig;
    use crate::models::{SeatId, SeatState};
    use crate::services::reservation::ReservationEngine;

    #[test]
    fn snapshot_reflects_engine_mutations() {
        let registry = Arc::new(SeatRegistry::new(&VenueConfig::default()));
        let engine = ReservationEngine::new(registry.clone());
        let publisher = SnapshotPublisher::new(registry);
        let empty = publisher.snapshot();
        assert_eq!(empty.revision, 0);
        assert!(empty.seats.iter().all(|s| s.state == SeatState::Available));

        let u1 = ClientId::from("u1");
        engine.hold(SeatId::new(1, 1), &u1).unwrap();

        let snap = publisher.snapshot();
        assert!(snap.revision > empty.revision);
        let seat = snap.seat(SeatId::new(1, 1)).unwrap();
        assert_eq!(seat.state, SeatState::Held);
        assert_eq!(seat.holder_id.as_ref(), Some(&u1));
        // Снапшот - копия: последующие изменения его не трогают.
        engine.release(SeatId::new(1, 1), &u1).unwrap();
        assert_eq!(snap.seat(SeatId::new(1, 1)).unwrap().state, SeatState::Held);
    }

    #[test]
    fn held_by_sums_client_cart() {
        let registry = Arc::new(SeatRegistry::new(&VenueConfig::default()));
        let engine = ReservationEngine::new(registry.clone());
        let publisher = SnapshotPublisher::new(registry);
        let u1 = ClientId::from("u1");
        let u2 = ClientId::from("u2");

        engine.hold(SeatId::new(1, 1), &u1).unwrap();
        engine.hold(SeatId::new(8, 3), &u1).unwrap();
        engine.hold(SeatId::new(2, 2), &u2).unwrap();

        let cart = publisher.held_by(&u1);
        let ids: Vec<SeatId> = cart.seats.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![SeatId::new(1, 1), SeatId::new(8, 3)]);
        assert_eq!(cart.total, 12 + 18);
        assert_eq!(publisher.snapshot().held_by(&u2).count(), 1);
    }
}
