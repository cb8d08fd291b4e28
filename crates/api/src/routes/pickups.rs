//! Pickup attempt endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{MachineId, OrderId, PickupId};
use domain::Pickup;
use serde::{Deserialize, Serialize};
use store::VendingStore;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::parse_id;

#[derive(Deserialize)]
pub struct CreatePickupRequest {
    pub order_id: String,
    pub machine_id: String,
}

#[derive(Serialize)]
pub struct PickupResponse {
    pub id: String,
    pub order_id: String,
    pub machine_id: String,
    pub state: String,
    pub created_at: String,
    pub picked_up_at: Option<String>,
}

fn pickup_response(pickup: &Pickup) -> PickupResponse {
    PickupResponse {
        id: pickup.id().to_string(),
        order_id: pickup.order_id().to_string(),
        machine_id: pickup.machine_id().to_string(),
        state: pickup.state().to_string(),
        created_at: pickup.created_at().to_rfc3339(),
        picked_up_at: pickup.picked_up_at().map(|t| t.to_rfc3339()),
    }
}

/// POST /pickups — start a pickup attempt for a paid order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreatePickupRequest>,
) -> Result<(StatusCode, Json<PickupResponse>), ApiError> {
    let order_id: OrderId = parse_id(&req.order_id, "order id")?;
    let machine_id: MachineId = parse_id(&req.machine_id, "machine id")?;

    let pickup = state.pickups.create_pickup(order_id, machine_id).await?;

    Ok((StatusCode::CREATED, Json(pickup_response(&pickup))))
}

/// GET /pickups/{id} — load a pickup by id.
#[tracing::instrument(skip(state))]
pub async fn get<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<PickupResponse>, ApiError> {
    let pickup_id: PickupId = parse_id(&id, "pickup id")?;
    let pickup = state.pickups.get_pickup(pickup_id).await?;

    Ok(Json(pickup_response(&pickup)))
}

/// POST /pickups/{id}/complete — dispense and consume the order.
#[tracing::instrument(skip(state))]
pub async fn complete<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<PickupResponse>, ApiError> {
    let pickup_id: PickupId = parse_id(&id, "pickup id")?;
    let pickup = state.pickups.complete_pickup(pickup_id).await?;

    Ok(Json(pickup_response(&pickup)))
}

/// POST /pickups/{id}/fail — record a failed dispense attempt.
#[tracing::instrument(skip(state))]
pub async fn fail<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<PickupResponse>, ApiError> {
    let pickup_id: PickupId = parse_id(&id, "pickup id")?;
    let pickup = state.pickups.fail_pickup(pickup_id).await?;

    Ok(Json(pickup_response(&pickup)))
}

/// GET /orders/{id}/pickups — attempts for one order, oldest first.
#[tracing::instrument(skip(state))]
pub async fn list_for_order<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PickupResponse>>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    let pickups = state.pickups.pickups_for_order(order_id).await?;

    Ok(Json(pickups.iter().map(pickup_response).collect()))
}
