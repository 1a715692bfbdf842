use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::Payload;
use crate::models::api::{
    HeldSeatsQuery, HoldRequest, OperationResult, PurchaseRequest, ReleaseRequest,
    MSG_BOOKING_OK, MSG_SEAT_RELEASED, MSG_SEAT_RESERVED,
};
use crate::models::ClientId;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/seats", get(get_seats))
        .route("/seats/held", get(get_held_seats))
        .route("/seats/hold", post(hold_seat))
        .route("/seats/reserve", post(hold_seat))
        .route("/seats/release", post(release_seat))
        .route("/seats/purchase", post(purchase_seats))
        .route("/seats/book", post(purchase_seats))
}

/* ---------- SNAPSHOT ---------- */

// GET /api/seats
async fn get_seats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.snapshots.snapshot()))
}

// GET /api/seats/held?clientId=...
async fn get_held_seats(
    State(state): State<Arc<AppState>>,
    query: Result<Query<HeldSeatsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // Отказ экстрактора тоже уходит в форме {success, message}.
    let Query(params) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    params.validate()?;
    let client = ClientId::from(params.client_id);
    Ok((StatusCode::OK, Json(state.snapshots.held_by(&client))))
}

/* ---------- HOLDS ---------- */

// POST /api/seats/hold
async fn hold_seat(
    State(state): State<Arc<AppState>>,
    Payload(req): Payload<HoldRequest>,
) -> Result<Json<OperationResult>, ApiError> {
    let client = ClientId::from(req.client_id);
    state.engine.hold(req.seat_id, &client)?;
    Ok(Json(OperationResult::ok(MSG_SEAT_RESERVED)))
}

// POST /api/seats/release
async fn release_seat(
    State(state): State<Arc<AppState>>,
    Payload(req): Payload<ReleaseRequest>,
) -> Result<Json<OperationResult>, ApiError> {
    let client = ClientId::from(req.client_id);
    // Отпускание чужого места - не ошибка, ответ одинаковый.
    state.engine.release(req.seat_id, &client)?;
    Ok(Json(OperationResult::ok(MSG_SEAT_RELEASED)))
}

/* ---------- PURCHASE ---------- */

// POST /api/seats/purchase
async fn purchase_seats(
    State(state): State<Arc<AppState>>,
    Payload(req): Payload<PurchaseRequest>,
) -> Result<Json<OperationResult>, ApiError> {
    let client = ClientId::from(req.client_id);
    let receipt = state.engine.purchase(&req.seat_ids, &client, &req.buyer_name)?;
    tracing::debug!(seats = ?receipt.seat_ids, total = receipt.total_price, "purchase completed");
    Ok(Json(OperationResult::ok(MSG_BOOKING_OK)))
}
