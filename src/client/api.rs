//! Транспорт клиента: как цикл согласования разговаривает с сервером.
//!
//! `SeatsApi` - граница между логикой согласования и доставкой. Есть две
//! реализации: HTTP поверх reqwest и локальная, которая зовёт движок
//! напрямую в том же процессе.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::models::api::{
    HoldRequest, OperationResult, PurchaseRequest, ReleaseRequest, MSG_BOOKING_OK,
    MSG_SEAT_RELEASED, MSG_SEAT_RESERVED,
};
use crate::models::{ClientId, SeatId};
use crate::services::Snapshot;
use crate::AppState;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {0}")]
    Server(u16),
}

pub trait SeatsApi: Send + Sync {
    fn fetch_snapshot(&self) -> impl Future<Output = Result<Snapshot, ClientError>> + Send;

    fn hold(
        &self,
        seat_id: SeatId,
        client: &ClientId,
    ) -> impl Future<Output = Result<OperationResult, ClientError>> + Send;

    fn release(
        &self,
        seat_id: SeatId,
        client: &ClientId,
    ) -> impl Future<Output = Result<OperationResult, ClientError>> + Send;

    fn purchase(
        &self,
        seat_ids: &[SeatId],
        client: &ClientId,
        buyer_name: &str,
    ) -> impl Future<Output = Result<OperationResult, ClientError>> + Send;
}

/// HTTP-клиент к `/api/seats*`.
#[derive(Clone)]
pub struct HttpSeatsApi {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpSeatsApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn post<B: serde::Serialize + Sync>(&self, path: &str, body: &B) -> Result<OperationResult, ClientError> {
        let response = self.http_client.post(self.url(path)).json(body).send().await?;
        let status = response.status();
        // 4xx несут тело {success, message}; 5xx - нет.
        if status.is_server_error() {
            error!(%status, path, "Seat API request failed");
            return Err(ClientError::Server(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}

impl SeatsApi for HttpSeatsApi {
    async fn fetch_snapshot(&self) -> Result<Snapshot, ClientError> {
        let response = self.http_client.get(self.url("/seats")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Server(status.as_u16()));
        }
        Ok(response.json().await?)
    }

    async fn hold(&self, seat_id: SeatId, client: &ClientId) -> Result<OperationResult, ClientError> {
        let body = HoldRequest { seat_id, client_id: client.to_string() };
        self.post("/seats/hold", &body).await
    }

    async fn release(&self, seat_id: SeatId, client: &ClientId) -> Result<OperationResult, ClientError> {
        let body = ReleaseRequest { seat_id, client_id: client.to_string() };
        self.post("/seats/release", &body).await
    }

    async fn purchase(
        &self,
        seat_ids: &[SeatId],
        client: &ClientId,
        buyer_name: &str,
    ) -> Result<OperationResult, ClientError> {
        let body = PurchaseRequest {
            client_id: client.to_string(),
            seat_ids: seat_ids.to_vec(),
            buyer_name: buyer_name.to_string(),
        };
        self.post("/seats/purchase", &body).await
    }
}

/// Транспорт без сети: тот же процесс, тот же движок.
#[derive(Clone)]
pub struct LocalSeatsApi {
    state: Arc<AppState>,
}

impl LocalSeatsApi {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

impl SeatsApi for LocalSeatsApi {
    async fn fetch_snapshot(&self) -> Result<Snapshot, ClientError> {
        Ok(self.state.snapshots.snapshot())
    }

    async fn hold(&self, seat_id: SeatId, client: &ClientId) -> Result<OperationResult, ClientError> {
        Ok(match self.state.engine.hold(seat_id, client) {
            Ok(_) => OperationResult::ok(MSG_SEAT_RESERVED),
            Err(e) => e.to_result(),
        })
    }

    async fn release(&self, seat_id: SeatId, client: &ClientId) -> Result<OperationResult, ClientError> {
        Ok(match self.state.engine.release(seat_id, client) {
            Ok(_) => OperationResult::ok(MSG_SEAT_RELEASED),
            Err(e) => e.to_result(),
        })
    }

    async fn purchase(
        &self,
        seat_ids: &[SeatId],
        client: &ClientId,
        buyer_name: &str,
    ) -> Result<OperationResult, ClientError> {
        Ok(match self.state.engine.purchase(seat_ids, client, buyer_name) {
            Ok(_) => OperationResult::ok(MSG_BOOKING_OK),
            Err(e) => e.to_result(),
        })
    }
}
