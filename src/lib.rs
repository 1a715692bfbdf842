pub mod client;
pub mod config;
pub mod controllers;
pub mod error;
pub mod middleware;
pub mod models;
pub mod registry;
pub mod services;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

// Shared state для всего приложения
pub struct AppState {
    pub config: config::Config,
    pub registry: Arc<registry::SeatRegistry>,
    pub engine: services::ReservationEngine,
    pub snapshots: services::SnapshotPublisher,
}

impl AppState {
    /// Создаёт реестр по схеме зала и всё, что на нём держится.
    pub fn new(config: config::Config) -> Arc<Self> {
        let registry = Arc::new(registry::SeatRegistry::new(&config.venue));
        let engine = services::ReservationEngine::new(registry.clone());
        let snapshots = services::SnapshotPublisher::new(registry.clone());

        Arc::new(Self {
            config,
            registry,
            engine,
            snapshots,
        })
    }

    /// Фоновая очистка холдов, если TTL задан.
    pub fn cleanup_service(&self) -> Option<services::CleanupService> {
        let ttl = self.config.holds.ttl()?;
        Some(services::CleanupService::new(
            self.engine.clone(),
            ttl,
            self.config.holds.sweep_interval(),
        ))
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Seat Booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
