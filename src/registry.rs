//! registry.rs
//!
//! Авторитетное хранилище мест в памяти процесса.
//!
//! Каждое место лежит за собственным `parking_lot::Mutex`, поэтому операции над
//! разными местами друг друга не блокируют. Любое изменение проходит через
//! compare-and-set: запись применяется только если текущее состояние совпадает
//! с ожидаемым. Пакетный CAS берёт блокировки в порядке возрастания `SeatId`,
//! так что два пакета не могут взаимно заблокироваться.

use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use crate::config::VenueConfig;
use crate::error::ReservationError;
use crate::models::{Category, Seat, SeatId, SeatStatus};

const SNAPSHOT_ATTEMPTS: usize = 3;

struct SeatSlot {
    id: SeatId,
    price: u32,
    category: Category,
    status: Mutex<SeatStatus>,
}

impl SeatSlot {
    fn view(&self, status: &SeatStatus) -> Seat {
        Seat::from_status(self.id, self.price, self.category, status)
    }
}

/// Одно изменение в составе пакетного CAS.
#[derive(Debug, Clone)]
pub struct SeatChange {
    pub seat_id: SeatId,
    pub expected: SeatStatus,
    pub new: SeatStatus,
}

pub struct SeatRegistry {
    // Слоты лежат в порядке (row, col): индекс вычисляется из координат.
    slots: Vec<SeatSlot>,
    rows: u16,
    cols: u16,
    revision: AtomicU64,
}

impl SeatRegistry {
    /// Строит зал по схеме. Все места изначально свободны.
    pub fn new(venue: &VenueConfig) -> Self {
        let last_standard_row = venue.rows.saturating_sub(venue.vip_rows);
        let mut slots = Vec::with_capacity(venue.seat_count());

        for row in 1..=venue.rows {
            let (category, price) = if row > last_standard_row {
                (Category::Vip, venue.vip_price)
            } else {
                (Category::Standard, venue.standard_price)
            };
            for col in 1..=venue.cols {
                slots.push(SeatSlot {
                    id: SeatId::new(row, col),
                    price,
                    category,
                    status: Mutex::new(SeatStatus::Available),
                });
            }
        }

        info!(rows = venue.rows, cols = venue.cols, vip_rows = venue.vip_rows, "Seat registry initialized");

        Self {
            slots,
            rows: venue.rows,
            cols: venue.cols,
            revision: AtomicU64::new(0),
        }
    }

    fn slot(&self, id: SeatId) -> Result<&SeatSlot, ReservationError> {
        if id.row == 0 || id.col == 0 || id.row > self.rows || id.col > self.cols {
            return Err(ReservationError::NotFound(id));
        }
        let index = (id.row as usize - 1) * self.cols as usize + (id.col as usize - 1);
        Ok(&self.slots[index])
    }

    pub fn contains(&self, id: SeatId) -> bool {
        self.slot(id).is_ok()
    }

    pub fn get(&self, id: SeatId) -> Result<Seat, ReservationError> {
        let slot = self.slot(id)?;
        let status = slot.status.lock();
        Ok(slot.view(&status))
    }

    /// Текущее внутреннее состояние места (копия).
    pub fn status(&self, id: SeatId) -> Result<SeatStatus, ReservationError> {
        Ok(self.slot(id)?.status.lock().clone())
    }

    /// Все места по порядку: ряд, затем место. Атомарность - на уровне места.
    pub fn list(&self) -> Vec<Seat> {
        self.slots
            .iter()
            .map(|slot| {
                let status = slot.status.lock();
                slot.view(&status)
            })
            .collect()
    }

    /// Внутренние состояния всех мест, в том же порядке, что и `list()`.
    pub fn statuses(&self) -> Vec<(SeatId, SeatStatus)> {
        self.slots
            .iter()
            .map(|slot| (slot.id, slot.status.lock().clone()))
            .collect()
    }

    /// Согласованный срез зала: ровно те изменения, что вошли в ревизию.
    ///
    /// Сначала оптимистично: ревизия до и после копирования совпала - значит
    /// ни одно изменение не попало в окно. Иначе берутся блокировки всех мест
    /// по возрастанию `SeatId`, как в пакетном CAS.
    pub fn consistent_view(&self) -> (u64, Vec<Seat>) {
        for _ in 0..SNAPSHOT_ATTEMPTS {
            let before = self.revision();
            let seats = self.list();
            if self.revision() == before {
                return (before, seats);
            }
        }

        let guards: Vec<MutexGuard<'_, SeatStatus>> =
            self.slots.iter().map(|slot| slot.status.lock()).collect();
        let revision = self.revision();
        let seats = self
            .slots
            .iter()
            .zip(&guards)
            .map(|(slot, status)| slot.view(status))
            .collect();
        (revision, seats)
    }

    pub fn price(&self, id: SeatId) -> Result<u32, ReservationError> {
        Ok(self.slot(id)?.price)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    fn bump_revision(&self) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }

    /// Записывает `new`, только если текущее состояние равно `expected`.
    pub fn compare_and_set(
        &self,
        id: SeatId,
        expected: &SeatStatus,
        new: SeatStatus,
    ) -> Result<bool, ReservationError> {
        let slot = self.slot(id)?;
        let mut status = slot.status.lock();
        if *status != *expected {
            return Ok(false);
        }
        *status = new;
        // Ревизия растёт, пока место ещё заблокировано.
        self.bump_revision();
        Ok(true)
    }

    /// Всё-или-ничего: либо все ожидания совпали и все места записаны,
    /// либо ничего не изменилось.
    ///
    /// Места в пакете должны быть уникальны.
    pub fn compare_and_set_batch(&self, changes: Vec<SeatChange>) -> Result<bool, ReservationError> {
        let mut changes = changes;
        changes.sort_by_key(|change| change.seat_id);
        if changes.windows(2).any(|pair| pair[0].seat_id == pair[1].seat_id) {
            return Err(ReservationError::InvalidInput("duplicate seat in batch".to_string()));
        }

        let slots = changes
            .iter()
            .map(|change| self.slot(change.seat_id))
            .collect::<Result<Vec<_>, _>>()?;

        // Блокировки строго по возрастанию SeatId.
        let mut guards: Vec<MutexGuard<'_, SeatStatus>> =
            slots.iter().map(|slot| slot.status.lock()).collect();

        let all_match = guards
            .iter()
            .zip(&changes)
            .all(|(current, change)| **current == change.expected);
        if !all_match {
            return Ok(false);
        }

        for (guard, change) in guards.iter_mut().zip(changes) {
            **guard = change.new;
        }
        self.bump_revision();
        Ok(true)
    }
}
