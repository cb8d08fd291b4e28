//! Order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, PaymentRef};
use domain::Order;
use ops::OrderLine;
use serde::{Deserialize, Serialize};
use store::VendingStore;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::parse_id;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineRequest>,
}

#[derive(Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct BeginPaymentRequest {
    pub payment_ref: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub state: String,
    pub items: Vec<OrderItemResponse>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub payment_ref: Option<String>,
    pub refunded_total: i64,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub label: String,
    pub quantity: u32,
    pub unit_price: i64,
}

pub(crate) fn order_response(order: &Order) -> OrderResponse {
    let items = order
        .items()
        .iter()
        .map(|item| OrderItemResponse {
            product_id: item.product_id.to_string(),
            label: item.label.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price.minor(),
        })
        .collect();

    OrderResponse {
        id: order.id().to_string(),
        state: order.state().to_string(),
        items,
        amount_total: order.amount_total().map(|m| m.minor()),
        currency: order.currency().map(|c| c.to_string()),
        payment_ref: order.payment_ref().map(|p| p.to_string()),
        refunded_total: order.refunded_total().minor(),
        created_at: order.created_at().to_rfc3339(),
    }
}

// -- Handlers --

/// POST /orders — create an order from catalog product lines.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let lines = req
        .items
        .into_iter()
        .map(|line| OrderLine {
            product_id: line.product_id.into(),
            quantity: line.quantity,
        })
        .collect();

    let order = state.checkout.create_order(lines).await?;

    Ok((StatusCode::CREATED, Json(order_response(&order))))
}

/// GET /orders/{id} — load an order by id.
#[tracing::instrument(skip(state))]
pub async fn get<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    let order = state.checkout.get_order(order_id).await?;

    Ok(Json(order_response(&order)))
}

/// GET /orders — list orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.checkout.list_orders().await?;

    Ok(Json(orders.iter().map(order_response).collect()))
}

/// POST /orders/{id}/payment — open a payment session for the order.
#[tracing::instrument(skip(state, req))]
pub async fn begin_payment<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<BeginPaymentRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    if req.payment_ref.is_empty() {
        return Err(ApiError::BadRequest(
            "payment_ref must not be empty".to_string(),
        ));
    }

    let order = state
        .checkout
        .begin_payment(order_id, PaymentRef::from(req.payment_ref))
        .await?;

    Ok(Json(order_response(&order)))
}

/// POST /orders/{id}/cancel — cancel an unpaid order.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    let order = state.checkout.cancel_order(order_id).await?;

    Ok(Json(order_response(&order)))
}

/// POST /orders/{id}/expire — expire an order whose payment window
/// lapsed.
#[tracing::instrument(skip(state))]
pub async fn expire<S: VendingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    let order = state.checkout.expire_order(order_id).await?;

    Ok(Json(order_response(&order)))
}
