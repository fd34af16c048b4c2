use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::queue::QueuedOrder;
use crate::error::AppError;
use crate::models::assignment::AssignmentResult;
use crate::models::order::{Actor, ActorRole, NewOrder, Order, OrderStatus, Progress};
use crate::models::packing::PackingState;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route(
            "/orders/:id/transitions",
            post(request_transition).get(allowed_transitions),
        )
        .route("/orders/:id/payment", post(settle_payment))
        .route("/orders/:id/packing", get(get_packing))
        .route("/orders/:id/packing/:item_id", patch(update_packing))
        .route("/orders/:id/assign", post(request_assignment))
        .route("/assignments", get(list_assignments))
        .route("/queues/:role", get(list_queue))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub expected_version: u64,
    pub new_status: OrderStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackingUpdateRequest {
    pub picked_quantity: i64,
    pub packed: bool,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub role: ActorRole,
    #[serde(default)]
    pub personnel_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlePaymentRequest {
    pub expected_version: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub progress: Progress,
    pub elapsed_seconds: i64,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        let progress = order.current_progress();
        let elapsed_seconds = order.elapsed_time(Utc::now()).num_seconds();
        Self {
            order,
            progress,
            elapsed_seconds,
        }
    }
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<NewOrder>,
) -> Result<Json<Order>, AppError> {
    let order = state.coordinator.place_order(payload, &actor)?;
    Ok(Json(order))
}

async fn list_orders(State(state): State<Arc<AppState>>) -> Json<Vec<Order>> {
    Json(state.coordinator.list_orders())
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderView>, AppError> {
    let order = state.coordinator.get_order(id)?;
    Ok(Json(order.into()))
}

async fn request_transition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(payload): Json<TransitionRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state.coordinator.request_transition(
        id,
        payload.expected_version,
        payload.new_status,
        &actor,
        payload.note,
    )?;
    Ok(Json(order))
}

async fn allowed_transitions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
) -> Result<Json<Vec<OrderStatus>>, AppError> {
    Ok(Json(state.coordinator.allowed_transitions(id, &actor)?))
}

async fn settle_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(payload): Json<SettlePaymentRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .coordinator
        .mark_payment_settled(id, payload.expected_version, &actor)?;
    Ok(Json(order))
}

async fn get_packing(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PackingState>, AppError> {
    Ok(Json(state.coordinator.packing_state(id)?))
}

async fn update_packing(
    State(state): State<Arc<AppState>>,
    Path((id, item_id)): Path<(Uuid, String)>,
    actor: Actor,
    Json(payload): Json<PackingUpdateRequest>,
) -> Result<Json<PackingState>, AppError> {
    let packing = state.coordinator.request_packing_update(
        id,
        &item_id,
        payload.picked_quantity,
        payload.packed,
        payload.note,
        &actor,
    )?;
    Ok(Json(packing))
}

async fn request_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state.coordinator.request_manual_assignment(
        id,
        payload.role,
        payload.personnel_id.as_deref(),
        &actor,
    )?;
    Ok(Json(order))
}

async fn list_assignments(State(state): State<Arc<AppState>>) -> Json<Vec<AssignmentResult>> {
    Json(state.coordinator.assignments())
}

async fn list_queue(
    State(state): State<Arc<AppState>>,
    Path(role): Path<ActorRole>,
) -> Json<Vec<QueuedOrder>> {
    Json(state.coordinator.pending(role))
}
