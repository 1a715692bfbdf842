use anyhow::Context;
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seat_booking::{build_router, config::Config, AppState};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Failed to load configuration")?;

    let filter = tracing_subscriber::EnvFilter::new(&config.app.rust_log);
    if config.app.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting Seat Booking API");

    // Create the shared application state
    let app_state = AppState::new(config.clone());
    info!(seats = app_state.registry.len(), "Hall ready");

    // --- Start background tasks ---
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Stale holds go back to the pool every sweep interval
    let cleanup = app_state
        .cleanup_service()
        .map(|service| service.spawn(shutdown_rx.clone()));
    if cleanup.is_none() {
        info!("Hold expiry disabled (HOLD_TTL_SECONDS=0)");
    }

    // --- Start the web server ---
    let app = build_router(app_state.clone());

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port)
        .parse()
        .context("HOST/PORT do not form a valid socket address")?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    // --- Tear down ---
    let _ = shutdown_tx.send(true);
    if let Some(handle) = cleanup {
        let _ = handle.await;
    }
    info!("Server stopped");
    Ok(())
}
