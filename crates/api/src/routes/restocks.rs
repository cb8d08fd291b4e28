//! Restock batch endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{MachineId, RestockId, UserId};
use domain::Restock;
use ops::RestockLine;
use serde::{Deserialize, Serialize};
use store::VendingStore;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::parse_id;

#[derive(Deserialize)]
pub struct CreateRestockRequest {
    pub user_id: String,
    pub lines: Vec<RestockLineRequest>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct RestockLineRequest {
    pub stock_id: String,
    pub quantity_to_add: u32,
}

#[derive(Deserialize)]
pub struct RestockToMaxRequest {
    pub user_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct RestockResponse {
    pub id: String,
    pub machine_id: String,
    pub user_id: String,
    pub items: Vec<RestockItemResponse>,
    pub total_added: u32,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct RestockItemResponse {
    pub stock_id: String,
    pub quantity_before: u32,
    pub quantity_after: u32,
    pub quantity_added: u32,
}

fn restock_response(restock: &Restock) -> RestockResponse {
    let items = restock
        .items
        .iter()
        .map(|item| RestockItemResponse {
            stock_id: item.stock_id.to_string(),
            quantity_before: item.quantity_before,
            quantity_after: item.quantity_after,
            quantity_added: item.quantity_added,
        })
        .collect();

    RestockResponse {
        id: restock.id.to_string(),
        machine_id: restock.machine_id.to_string(),
        user_id: restock.user_id.to_string(),
        items,
        total_added: restock.total_added(),
        notes: restock.notes.clone(),
        created_at: restock.created_at.to_rfc3339(),
    }
}

/// POST /machines/{id}/restocks — apply an explicit restock batch.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<CreateRestockRequest>,
) -> Result<(StatusCode, Json<RestockResponse>), ApiError> {
    let machine_id: MachineId = parse_id(&id, "machine id")?;
    let user_id: UserId = parse_id(&req.user_id, "user id")?;

    let mut lines = Vec::with_capacity(req.lines.len());
    for line in &req.lines {
        lines.push(RestockLine {
            stock_id: parse_id(&line.stock_id, "stock id")?,
            quantity_to_add: line.quantity_to_add,
        });
    }

    let restock = state
        .restocks
        .create_restock(machine_id, user_id, lines, req.notes)
        .await?;

    Ok((StatusCode::CREATED, Json(restock_response(&restock))))
}

/// POST /machines/{id}/restocks/max — top every slot up to capacity.
///
/// Without a `user_id` the batch is attributed to the directory's
/// fallback admin.
#[tracing::instrument(skip(state, req))]
pub async fn create_max<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<RestockToMaxRequest>,
) -> Result<(StatusCode, Json<RestockResponse>), ApiError> {
    let machine_id: MachineId = parse_id(&id, "machine id")?;
    let user_id: Option<UserId> = match &req.user_id {
        Some(raw) => Some(parse_id(raw, "user id")?),
        None => None,
    };

    let restock = state
        .restocks
        .restock_to_max(machine_id, user_id, req.notes)
        .await?;

    Ok((StatusCode::CREATED, Json(restock_response(&restock))))
}

/// GET /machines/{id}/restocks — restock history, most recent first.
#[tracing::instrument(skip(state))]
pub async fn list_for_machine<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RestockResponse>>, ApiError> {
    let machine_id: MachineId = parse_id(&id, "machine id")?;
    let restocks = state.restocks.restocks_for_machine(machine_id).await?;

    Ok(Json(restocks.iter().map(restock_response).collect()))
}

/// GET /restocks/{id} — load one restock record.
#[tracing::instrument(skip(state))]
pub async fn get<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<RestockResponse>, ApiError> {
    let restock_id: RestockId = parse_id(&id, "restock id")?;
    let restock = state.restocks.get_restock(restock_id).await?;

    Ok(Json(restock_response(&restock)))
}
