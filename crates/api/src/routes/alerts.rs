//! Machine alert endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::MachineId;
use domain::{Alert, AlertMetadata};
use serde::Serialize;
use store::VendingStore;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::parse_id;

#[derive(Serialize)]
pub struct AlertResponse {
    pub id: String,
    pub machine_id: String,
    pub alert_type: String,
    pub level: String,
    pub status: String,
    pub is_active: bool,
    pub message: String,
    pub metadata: AlertMetadata,
    pub created_at: String,
}

fn alert_response(alert: &Alert) -> AlertResponse {
    AlertResponse {
        id: alert.id.to_string(),
        machine_id: alert.machine_id.to_string(),
        alert_type: alert.alert_type.to_string(),
        level: alert.level.to_string(),
        status: alert.status.to_string(),
        is_active: alert.is_active,
        message: alert.message.clone(),
        metadata: alert.metadata,
        created_at: alert.created_at.to_rfc3339(),
    }
}

/// GET /machines/{id}/alerts — current alert set for one machine.
#[tracing::instrument(skip(state))]
pub async fn list_for_machine<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AlertResponse>>, ApiError> {
    let machine_id: MachineId = parse_id(&id, "machine id")?;
    let alerts = state.alerts.alerts_for_machine(machine_id).await?;

    Ok(Json(alerts.iter().map(alert_response).collect()))
}

/// GET /alerts — active alerts across all machines.
#[tracing::instrument(skip(state))]
pub async fn list_active<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<AlertResponse>>, ApiError> {
    let alerts = state.alerts.active_alerts().await?;

    Ok(Json(alerts.iter().map(alert_response).collect()))
}

/// POST /machines/{id}/alerts/recompute — rederive the alert set from
/// the machine's current stock rows.
#[tracing::instrument(skip(state))]
pub async fn recompute<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AlertResponse>>, ApiError> {
    let machine_id: MachineId = parse_id(&id, "machine id")?;
    let alerts = state.alerts.recompute(machine_id).await?;

    Ok(Json(alerts.iter().map(alert_response).collect()))
}
