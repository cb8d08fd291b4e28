//! Slot configuration and quantity ledger endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{MachineId, StockId};
use domain::Stock;
use serde::{Deserialize, Serialize};
use store::VendingStore;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::parse_id;

#[derive(Deserialize)]
pub struct ConfigureSlotRequest {
    pub slot_number: u32,
    pub product_id: String,
    pub max_capacity: u32,
    pub low_threshold: u32,
}

#[derive(Deserialize)]
pub struct ApplyDeltaRequest {
    pub delta: i32,
}

#[derive(Serialize)]
pub struct StockResponse {
    pub id: String,
    pub machine_id: String,
    pub slot_number: u32,
    pub product_id: String,
    pub quantity: u32,
    pub max_capacity: u32,
    pub low_threshold: u32,
}

fn stock_response(stock: &Stock) -> StockResponse {
    StockResponse {
        id: stock.id().to_string(),
        machine_id: stock.machine_id().to_string(),
        slot_number: stock.slot_number(),
        product_id: stock.product_id().to_string(),
        quantity: stock.quantity(),
        max_capacity: stock.max_capacity(),
        low_threshold: stock.low_threshold(),
    }
}

/// POST /machines/{id}/slots — configure a new slot, starting empty.
#[tracing::instrument(skip(state, req))]
pub async fn configure_slot<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ConfigureSlotRequest>,
) -> Result<(StatusCode, Json<StockResponse>), ApiError> {
    let machine_id: MachineId = parse_id(&id, "machine id")?;

    let stock = state
        .stock
        .configure_slot(
            machine_id,
            req.slot_number,
            req.product_id.into(),
            req.max_capacity,
            req.low_threshold,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(stock_response(&stock))))
}

/// GET /machines/{id}/stock — slots for one machine, by slot number.
#[tracing::instrument(skip(state))]
pub async fn list_for_machine<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<StockResponse>>, ApiError> {
    let machine_id: MachineId = parse_id(&id, "machine id")?;
    let stock = state.stock.stock_for_machine(machine_id).await?;

    Ok(Json(stock.iter().map(stock_response).collect()))
}

/// POST /stock/{id}/delta — apply a signed quantity change to a slot.
#[tracing::instrument(skip(state, req))]
pub async fn apply_delta<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ApplyDeltaRequest>,
) -> Result<Json<StockResponse>, ApiError> {
    let stock_id: StockId = parse_id(&id, "stock id")?;
    let stock = state.stock.apply_delta(stock_id, req.delta).await?;

    Ok(Json(stock_response(&stock)))
}
