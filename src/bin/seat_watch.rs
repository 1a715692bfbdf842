//! Опрашивающий клиент: держит локальную картину зала и пишет сводку в лог.

use anyhow::Context;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seat_booking::client::{HttpSeatsApi, ReconciliationLoop, SeatBoard};
use seat_booking::config::Config;
use seat_booking::models::{ClientId, SeatState};

fn log_summary(board: &SeatBoard) {
    let Some(snapshot) = board.snapshot() else {
        info!("No snapshot yet");
        return;
    };
    let count = |state: SeatState| snapshot.seats.iter().filter(|s| s.state == state).count();
    info!(
        revision = snapshot.revision,
        available = count(SeatState::Available),
        held = count(SeatState::Held),
        purchased = count(SeatState::Purchased),
        mine = board.my_held_seat_ids().len(),
        "Hall status"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let api = HttpSeatsApi::new(config.client.api_url.clone()).context("Failed to build HTTP client")?;
    let client_id = ClientId::generate();
    info!(client = %client_id, url = %config.client.api_url, "Watching seats");

    let reconciler = Arc::new(ReconciliationLoop::new(api, client_id));
    let interval = config.client.poll_interval();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poller = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.run(interval, shutdown_rx).await })
    };

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => reconciler.with_board(log_summary),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = poller.await;
    Ok(())
}
