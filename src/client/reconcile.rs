//! reconcile.rs
//!
//! Клиентский цикл согласования.
//!
//! Клиент не хранит собственной истины о местах: «мои места» всегда
//! вычисляются фильтрацией последнего снапшота по `holderId == мой id`.
//! Локально хранится только состояние операций по местам:
//!
//! - `Pending` - операция отправлена, ответа ещё нет. Это же маркер
//!   «в полёте»: повторный клик по месту игнорируется.
//! - `Confirmed` - сервер ответил успехом, но снапшот это ещё не показал.
//! - `Failed` - сервер отказал или запрос не дошёл.
//!
//! Новый снапшот вытесняет `Confirmed` и `Failed`, `Pending` остаются.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::api::{ClientError, SeatsApi};
use crate::models::{ClientId, OperationResult, Seat, SeatId, SeatState};
use crate::services::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatAction {
    Hold,
    Release,
    Purchase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalSeatState {
    Pending(SeatAction),
    Confirmed(SeatAction),
    Failed { action: SeatAction, message: String },
}

/// Локальная картина зала у одного клиента.
#[derive(Debug, Clone)]
pub struct SeatBoard {
    client_id: ClientId,
    snapshot: Option<Snapshot>,
    local: BTreeMap<SeatId, LocalSeatState>,
}

impl SeatBoard {
    pub fn new(client_id: ClientId) -> Self {
        Self { client_id, snapshot: None, local: BTreeMap::new() }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn revision(&self) -> Option<u64> {
        self.snapshot.as_ref().map(|s| s.revision)
    }

    /// Применяет снапшот. Снапшот старше уже применённого отбрасывается.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> bool {
        if let Some(current) = &self.snapshot {
            if snapshot.revision < current.revision {
                return false;
            }
        }
        self.local.retain(|_, state| matches!(state, LocalSeatState::Pending(_)));
        self.snapshot = Some(snapshot);
        true
    }

    pub fn local_state(&self, seat_id: SeatId) -> Option<&LocalSeatState> {
        self.local.get(&seat_id)
    }

    pub fn is_in_flight(&self, seat_id: SeatId) -> bool {
        matches!(self.local.get(&seat_id), Some(LocalSeatState::Pending(_)))
    }

    /// Ставит маркер «в полёте». `false` - по месту уже идёт операция.
    pub fn begin(&mut self, seat_id: SeatId, action: SeatAction) -> bool {
        if self.is_in_flight(seat_id) {
            return false;
        }
        self.local.insert(seat_id, LocalSeatState::Pending(action));
        true
    }

    pub fn settle(&mut self, seat_id: SeatId, action: SeatAction, result: &OperationResult) {
        let state = if result.success {
            LocalSeatState::Confirmed(action)
        } else {
            LocalSeatState::Failed { action, message: result.message.clone() }
        };
        self.local.insert(seat_id, state);
    }

    pub fn fail(&mut self, seat_id: SeatId, action: SeatAction, message: impl Into<String>) {
        self.local.insert(seat_id, LocalSeatState::Failed { action, message: message.into() });
    }

    /// Что сделает клик по месту: своё - отпустить, свободное - взять.
    pub fn toggle_action(&self, seat_id: SeatId) -> Option<SeatAction> {
        let seat = self.snapshot.as_ref()?.seat(seat_id)?;
        if seat.is_held_by(&self.client_id) {
            Some(SeatAction::Release)
        } else if seat.state == SeatState::Available {
            Some(SeatAction::Hold)
        } else {
            None
        }
    }

    pub fn my_held_seats(&self) -> Vec<&Seat> {
        match &self.snapshot {
            Some(snapshot) => snapshot.held_by(&self.client_id).collect(),
            None => Vec::new(),
        }
    }

    pub fn my_held_seat_ids(&self) -> Vec<SeatId> {
        self.my_held_seats().into_iter().map(|seat| seat.id).collect()
    }

    pub fn cart_total(&self) -> u64 {
        self.my_held_seats().iter().map(|seat| u64::from(seat.price)).sum()
    }
}

/// Опрос снапшота по таймеру плюс операции клиента с немедленным переопросом.
pub struct ReconciliationLoop<A> {
    api: A,
    board: Mutex<SeatBoard>,
}

impl<A: SeatsApi> ReconciliationLoop<A> {
    pub fn new(api: A, client_id: ClientId) -> Self {
        Self { api, board: Mutex::new(SeatBoard::new(client_id)) }
    }

    pub fn board(&self) -> SeatBoard {
        self.board.lock().clone()
    }

    pub fn with_board<R>(&self, f: impl FnOnce(&SeatBoard) -> R) -> R {
        let board = self.board.lock();
        f(&*board)
    }

    /// Забирает снапшот и применяет его. `false` - ответ устарел.
    pub async fn refresh(&self) -> Result<bool, ClientError> {
        let snapshot = self.api.fetch_snapshot().await?;
        let revision = snapshot.revision;
        let applied = self.board.lock().apply_snapshot(snapshot);
        if !applied {
            debug!(revision, "Stale snapshot ignored");
        }
        Ok(applied)
    }

    /// Клик по месту. `None` - клик проигнорирован (место занято,
    /// снапшота ещё нет или по месту уже идёт операция).
    pub async fn toggle(&self, seat_id: SeatId) -> Result<Option<OperationResult>, ClientError> {
        let (action, client) = {
            let mut board = self.board.lock();
            let Some(action) = board.toggle_action(seat_id) else {
                return Ok(None);
            };
            if !board.begin(seat_id, action) {
                debug!(%seat_id, "Seat operation already in flight");
                return Ok(None);
            }
            (action, board.client_id().clone())
        };

        let result = if action == SeatAction::Hold {
            self.api.hold(seat_id, &client).await
        } else {
            self.api.release(seat_id, &client).await
        };
        self.settle(&[seat_id], action, result).await.map(Some)
    }

    /// Выкупает все места, которые сейчас держит клиент.
    pub async fn checkout(&self, buyer_name: &str) -> Result<Option<OperationResult>, ClientError> {
        let (seat_ids, client) = {
            let mut board = self.board.lock();
            let seat_ids = board.my_held_seat_ids();
            if seat_ids.is_empty() || seat_ids.iter().any(|id| board.is_in_flight(*id)) {
                return Ok(None);
            }
            for id in &seat_ids {
                board.begin(*id, SeatAction::Purchase);
            }
            (seat_ids, board.client_id().clone())
        };

        let result = self.api.purchase(&seat_ids, &client, buyer_name).await;
        self.settle(&seat_ids, SeatAction::Purchase, result).await.map(Some)
    }

    async fn settle(
        &self,
        seat_ids: &[SeatId],
        action: SeatAction,
        result: Result<OperationResult, ClientError>,
    ) -> Result<OperationResult, ClientError> {
        {
            let mut board = self.board.lock();
            match &result {
                Ok(outcome) => {
                    for id in seat_ids {
                        board.settle(*id, action, outcome);
                    }
                }
                Err(e) => {
                    for id in seat_ids {
                        board.fail(*id, action, e.to_string());
                    }
                }
            }
        }

        // После любой операции - сразу свежий снапшот.
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Refresh after {:?} failed", action);
        }
        result
    }

    /// Периодический опрос до сигнала остановки.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = interval.as_millis() as u64, "Seat polling started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        warn!(error = %e, "Seat poll failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Seat polling stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn seat(row: u16, col: u16, state: SeatState, holder: Option<&str>) -> Seat {
        Seat {
            id: SeatId::new(row, col),
            row,
            col,
            price: 12,
            category: Category::Standard,
            state,
            holder_id: holder.map(ClientId::from),
            purchaser_name: None,
        }
    }

    fn snapshot(revision: u64, seats: Vec<Seat>) -> Snapshot {
        Snapshot { revision, seats }
    }

    #[test]
    fn my_seats_are_derived_from_snapshot_only() {
        let mut board = SeatBoard::new(ClientId::from("me"));
        assert!(board.my_held_seats().is_empty());

        board.apply_snapshot(snapshot(
            3,
            vec![
                seat(1, 1, SeatState::Held, Some("me")),
                seat(1, 2, SeatState::Held, Some("other")),
                seat(1, 3, SeatState::Available, None),
            ],
        ));
        assert_eq!(board.my_held_seat_ids(), vec![SeatId::new(1, 1)]);
        assert_eq!(board.cart_total(), 12);
    }

    #[test]
    fn older_snapshot_is_ignored() {
        let mut board = SeatBoard::new(ClientId::from("me"));
        assert!(board.apply_snapshot(snapshot(5, vec![seat(1, 1, SeatState::Held, Some("me"))])));
        assert!(!board.apply_snapshot(snapshot(4, vec![seat(1, 1, SeatState::Available, None)])));
        assert_eq!(board.revision(), Some(5));
        assert_eq!(board.my_held_seat_ids(), vec![SeatId::new(1, 1)]);
    }

    #[test]
    fn pending_suppresses_duplicate_clicks_until_settled() {
        let mut board = SeatBoard::new(ClientId::from("me"));
        let id = SeatId::new(2, 2);

        assert!(board.begin(id, SeatAction::Hold));
        assert!(!board.begin(id, SeatAction::Hold));
        assert!(board.is_in_flight(id));

        board.settle(id, SeatAction::Hold, &OperationResult::ok("Seat reserved"));
        assert_eq!(board.local_state(id), Some(&LocalSeatState::Confirmed(SeatAction::Hold)));
        assert!(board.begin(id, SeatAction::Release));
    }

    #[test]
    fn snapshot_drops_settled_markers_and_keeps_pending() {
        let mut board = SeatBoard::new(ClientId::from("me"));
        let confirmed = SeatId::new(1, 1);
        let failed = SeatId::new(1, 2);
        let pending = SeatId::new(1, 3);

        board.begin(confirmed, SeatAction::Hold);
        board.settle(confirmed, SeatAction::Hold, &OperationResult::ok("Seat reserved"));
        board.begin(failed, SeatAction::Hold);
        board.settle(failed, SeatAction::Hold, &OperationResult::failed("Seat is already taken"));
        board.begin(pending, SeatAction::Release);

        assert!(matches!(
            board.local_state(failed),
            Some(LocalSeatState::Failed { message, .. }) if message == "Seat is already taken"
        ));

        board.apply_snapshot(snapshot(1, Vec::new()));
        assert_eq!(board.local_state(confirmed), None);
        assert_eq!(board.local_state(failed), None);
        assert_eq!(board.local_state(pending), Some(&LocalSeatState::Pending(SeatAction::Release)));
    }

    #[test]
    fn toggle_action_follows_seat_ownership() {
        let mut board = SeatBoard::new(ClientId::from("me"));
        assert_eq!(board.toggle_action(SeatId::new(1, 1)), None);

        let mut sold = seat(1, 4, SeatState::Purchased, None);
        sold.purchaser_name = Some("Alice".to_string());
        board.apply_snapshot(snapshot(
            1,
            vec![
                seat(1, 1, SeatState::Held, Some("me")),
                seat(1, 2, SeatState::Available, None),
                seat(1, 3, SeatState::Held, Some("other")),
                sold,
            ],
        ));

        assert_eq!(board.toggle_action(SeatId::new(1, 1)), Some(SeatAction::Release));
        assert_eq!(board.toggle_action(SeatId::new(1, 2)), Some(SeatAction::Hold));
        assert_eq!(board.toggle_action(SeatId::new(1, 3)), None);
        assert_eq!(board.toggle_action(SeatId::new(1, 4)), None);
    }
}
