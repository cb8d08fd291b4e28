//! Payment provider webhook.
//!
//! The provider delivers payment and refund events at least once. The
//! reconciler absorbs redeliveries, so the handler can acknowledge every
//! event it has seen before instead of erroring on duplicates.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use ops::{PaymentSucceeded, RefundUpdated};
use serde::{Deserialize, Serialize};
use store::VendingStore;

use crate::AppState;
use crate::error::ApiError;

/// One provider event, discriminated by `event_type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum PaymentEventRequest {
    PaymentSucceeded(PaymentSucceeded),
    RefundUpdated(RefundUpdated),
}

#[derive(Serialize)]
pub struct WebhookAck {
    pub outcome: &'static str,
}

/// POST /webhooks/payments — reconcile one provider event.
#[tracing::instrument(skip(state, event))]
pub async fn payment_event<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(event): Json<PaymentEventRequest>,
) -> Result<Json<WebhookAck>, ApiError> {
    let outcome = match &event {
        PaymentEventRequest::PaymentSucceeded(event) => {
            state.reconciler.payment_succeeded(event).await?
        }
        PaymentEventRequest::RefundUpdated(event) => state.reconciler.refund_updated(event).await?,
    };

    Ok(Json(WebhookAck {
        outcome: outcome.as_str(),
    }))
}
