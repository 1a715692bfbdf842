use chrono::Utc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::models::SeatId;
use crate::services::reservation::ReservationEngine;

/// Фоновая очистка просроченных холдов.
pub struct CleanupService {
    engine: ReservationEngine,
    ttl: Duration,
    interval: Duration,
}

impl CleanupService {
    pub fn new(engine: ReservationEngine, ttl: Duration, interval: Duration) -> Self {
        Self { engine, ttl, interval }
    }

    /// Один проход очистки
    pub fn run_sweep(&self) -> Vec<SeatId> {
        let expired = self.engine.expire_stale_holds(self.ttl, Utc::now());
        if expired.is_empty() {
            debug!("🧹 No stale holds to cleanup");
        } else {
            info!("🧹 Released {} stale holds", expired.len());
        }
        expired
    }

    /// Запускает цикл очистки до сигнала остановки.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                ttl_secs = self.ttl.as_secs(),
                interval_secs = self.interval.as_secs(),
                "🧹 Hold cleanup started"
            );
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_sweep();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("🧹 Hold cleanup stopped");
        })
    }
}
