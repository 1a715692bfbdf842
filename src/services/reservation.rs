//! reservation.rs
//!
//! Движок бронирования - единственный, кто изменяет реестр мест.
//!
//! Каждая операция - это ограниченный цикл оптимистичных попыток:
//! 1.  прочитать текущее состояние места;
//! 2.  проверить предусловия;
//! 3.  применить изменение через compare-and-set.
//!
//! Если CAS проиграл гонку (`Conflict`), попытка повторяется до
//! `MAX_CAS_ATTEMPTS` раз. Ни одна операция не ждёт другую.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ReservationError;
use crate::models::{ClientId, SeatId, SeatStatus};
use crate::registry::{SeatChange, SeatRegistry};

pub const MAX_CAS_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    Held,
    /// Клиент уже держит это место; ничего не изменилось.
    AlreadyHeld,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    /// Место не удерживалось этим клиентом; ничего не изменилось.
    NotHeld,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    pub seat_ids: Vec<SeatId>,
    pub purchaser_name: String,
    pub total_price: u64,
}

/// Ответ операции, которая так и не выиграла CAS.
trait Retried: Sized {
    fn exhausted(seat_id: SeatId) -> Result<Self, ReservationError>;
}

impl Retried for HoldOutcome {
    fn exhausted(seat_id: SeatId) -> Result<Self, ReservationError> {
        Err(ReservationError::SeatUnavailable(seat_id))
    }
}

// Место постоянно меняется под нами - значит оно уже не наше.
impl Retried for ReleaseOutcome {
    fn exhausted(_: SeatId) -> Result<Self, ReservationError> {
        Ok(ReleaseOutcome::NotHeld)
    }
}

impl Retried for PurchaseReceipt {
    fn exhausted(_: SeatId) -> Result<Self, ReservationError> {
        Err(ReservationError::InvalidReservation)
    }
}

#[derive(Clone)]
pub struct ReservationEngine {
    registry: Arc<SeatRegistry>,
}

impl ReservationEngine {
    pub fn new(registry: Arc<SeatRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SeatRegistry> {
        &self.registry
    }

    /// Повторяет `attempt`, пока он возвращает `Conflict`. После
    /// `MAX_CAS_ATTEMPTS` проигрышей ответ определяет тип результата.
    fn with_retries<T: Retried>(
        &self,
        op: &'static str,
        mut attempt: impl FnMut() -> Result<T, ReservationError>,
    ) -> Result<T, ReservationError> {
        let mut last_conflict = None;
        for n in 1..=MAX_CAS_ATTEMPTS {
            match attempt() {
                Err(ReservationError::Conflict(seat_id)) => {
                    debug!(op, %seat_id, attempt = n, "CAS conflict, retrying");
                    last_conflict = Some(seat_id);
                }
                other => return other,
            }
        }
        warn!(op, attempts = MAX_CAS_ATTEMPTS, "CAS retries exhausted");
        match last_conflict {
            Some(seat_id) => T::exhausted(seat_id),
            None => Err(ReservationError::InvalidReservation),
        }
    }

    /// Ставит место в холд за клиентом.
    ///
    /// Повторный холд своего места - успех без изменений. Место, которое
    /// держит другой клиент или которое продано, даёт `SeatUnavailable`.
    pub fn hold(&self, seat_id: SeatId, client: &ClientId) -> Result<HoldOutcome, ReservationError> {
        self.hold_at(seat_id, client, Utc::now())
    }

    pub fn hold_at(
        &self,
        seat_id: SeatId,
        client: &ClientId,
        now: DateTime<Utc>,
    ) -> Result<HoldOutcome, ReservationError> {
        let outcome = self.with_retries(
            "hold",
            || {
                let current = self.registry.status(seat_id)?;
                match &current {
                    SeatStatus::Available => {}
                    SeatStatus::Held { holder, .. } if holder == client => {
                        return Ok(HoldOutcome::AlreadyHeld);
                    }
                    SeatStatus::Held { .. } | SeatStatus::Purchased { .. } => {
                        return Err(ReservationError::SeatUnavailable(seat_id));
                    }
                }

                let next = SeatStatus::Held { holder: client.clone(), held_at: now };
                if self.registry.compare_and_set(seat_id, &current, next)? {
                    Ok(HoldOutcome::Held)
                } else {
                    Err(ReservationError::Conflict(seat_id))
                }
            },
        )?;

        match outcome {
            HoldOutcome::Held => info!(%seat_id, client = %client, "Seat held"),
            HoldOutcome::AlreadyHeld => debug!(%seat_id, client = %client, "Seat already held by client"),
        }
        Ok(outcome)
    }

    /// Снимает холд клиента. Чужое, свободное или проданное место - тихий no-op.
    pub fn release(&self, seat_id: SeatId, client: &ClientId) -> Result<ReleaseOutcome, ReservationError> {
        let outcome = self.with_retries(
            "release",
            || {
                let current = self.registry.status(seat_id)?;
                if !current.is_held_by(client) {
                    return Ok(ReleaseOutcome::NotHeld);
                }
                if self.registry.compare_and_set(seat_id, &current, SeatStatus::Available)? {
                    Ok(ReleaseOutcome::Released)
                } else {
                    Err(ReservationError::Conflict(seat_id))
                }
            },
        )?;

        match outcome {
            ReleaseOutcome::Released => info!(%seat_id, client = %client, "Seat released"),
            ReleaseOutcome::NotHeld => debug!(%seat_id, client = %client, "Release ignored, seat not held by client"),
        }
        Ok(outcome)
    }

    /// Выкупает пакет мест: все места должны быть в холде у клиента.
    ///
    /// Проверка и запись идут одним пакетным CAS, поэтому при любом отказе
    /// ни одно место пакета не меняется.
    pub fn purchase(
        &self,
        seat_ids: &[SeatId],
        client: &ClientId,
        buyer_name: &str,
    ) -> Result<PurchaseReceipt, ReservationError> {
        let buyer_name = buyer_name.trim();
        if buyer_name.is_empty() {
            return Err(ReservationError::InvalidInput("buyer name must not be blank".to_string()));
        }

        let ids: BTreeSet<SeatId> = seat_ids.iter().copied().collect();
        if ids.is_empty() {
            return Err(ReservationError::InvalidReservation);
        }

        let receipt = self.with_retries(
            "purchase",
            || {
                let mut changes = Vec::with_capacity(ids.len());
                let mut total_price = 0u64;

                for &seat_id in &ids {
                    let current = self.registry.status(seat_id)?;
                    if !current.is_held_by(client) {
                        debug!(%seat_id, client = %client, state = ?current.state(), "Purchase rejected, seat not held by client");
                        return Err(ReservationError::InvalidReservation);
                    }
                    total_price += u64::from(self.registry.price(seat_id)?);
                    changes.push(SeatChange {
                        seat_id,
                        expected: current,
                        new: SeatStatus::Purchased { purchaser_name: buyer_name.to_string() },
                    });
                }

                let first = changes[0].seat_id;
                if self.registry.compare_and_set_batch(changes)? {
                    Ok(PurchaseReceipt {
                        seat_ids: ids.iter().copied().collect(),
                        purchaser_name: buyer_name.to_string(),
                        total_price,
                    })
                } else {
                    Err(ReservationError::Conflict(first))
                }
            },
        )?;

        info!(
            client = %client,
            seats = receipt.seat_ids.len(),
            total = receipt.total_price,
            "Seats purchased"
        );
        Ok(receipt)
    }

    /// Возвращает в `available` холды старше `ttl` на момент `now`.
    ///
    /// Идёт тем же путём CAS: если место успели отпустить, перехватить или
    /// выкупить, оно остаётся как есть.
    pub fn expire_stale_holds(&self, ttl: Duration, now: DateTime<Utc>) -> Vec<SeatId> {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return Vec::new();
        };
        let cutoff = now - ttl;

        let mut expired = Vec::new();
        for (seat_id, status) in self.registry.statuses() {
            let SeatStatus::Held { held_at, .. } = &status else {
                continue;
            };
            if *held_at > cutoff {
                continue;
            }
            match self.registry.compare_and_set(seat_id, &status, SeatStatus::Available) {
                Ok(true) => expired.push(seat_id),
                Ok(false) => debug!(%seat_id, "Hold changed during sweep, skipped"),
                Err(e) => warn!(%seat_id, error = %e, "Failed to expire hold"),
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "Expired stale holds");
        }
        expired
    }
}
