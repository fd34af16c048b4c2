use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::order::ActorRole;
use crate::models::personnel::{Availability, NewPersonnel, PerformanceStats, Personnel};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/personnel", post(create_personnel).get(list_personnel))
        .route("/personnel/:id", get(get_personnel))
        .route("/personnel/:id/availability", patch(update_availability))
        .route("/personnel/:id/stats", patch(update_stats))
}

#[derive(Deserialize)]
pub struct PersonnelQuery {
    pub role: Option<ActorRole>,
}

#[derive(Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub availability: Availability,
}

async fn create_personnel(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewPersonnel>,
) -> Result<Json<Personnel>, AppError> {
    let personnel = state.coordinator.register_personnel(payload)?;
    Ok(Json(personnel))
}

async fn list_personnel(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PersonnelQuery>,
) -> Json<Vec<Personnel>> {
    Json(state.coordinator.list_personnel(query.role))
}

async fn get_personnel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Personnel>, AppError> {
    Ok(Json(state.coordinator.queue().personnel(&id)?))
}

async fn update_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Personnel>, AppError> {
    let personnel = state
        .coordinator
        .set_personnel_availability(&id, payload.availability)?;
    Ok(Json(personnel))
}

async fn update_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<PerformanceStats>,
) -> Result<Json<Personnel>, AppError> {
    let personnel = state.coordinator.update_personnel_stats(&id, payload)?;
    Ok(Json(personnel))
}
