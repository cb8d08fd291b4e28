//! API error types with HTTP response mapping.

use alerts::AlertError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::OrderError;
use ops::OpsError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Operational service error.
    Ops(OpsError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Ops(err) => ops_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn ops_error_to_response(err: OpsError) -> (StatusCode, String) {
    let status = match &err {
        OpsError::NotFound { .. } => StatusCode::NOT_FOUND,
        OpsError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        OpsError::Order(order_err) => match order_err {
            OrderError::NoItems
            | OrderError::InvalidQuantity { .. }
            | OrderError::InvalidPrice { .. }
            | OrderError::InvalidRefundAmount { .. } => StatusCode::BAD_REQUEST,
            OrderError::InvalidStateTransition { .. } | OrderError::AmountAlreadySet => {
                StatusCode::CONFLICT
            }
            OrderError::RefundExceedsTotal { .. } | OrderError::AmountUnknown => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        },
        OpsError::Stock(_) | OpsError::Pickup(_) => StatusCode::CONFLICT,
        OpsError::RefundBeforePayment { .. } | OpsError::Conflict { .. } => StatusCode::CONFLICT,
        OpsError::Store(store_err) => store_error_status(store_err),
        OpsError::Catalog(_) | OpsError::Directory(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "internal server error");
    }

    (status, err.to_string())
}

fn store_error_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::VersionConflict { .. }
        | StoreError::SlotTaken { .. }
        | StoreError::PendingPickupExists(_)
        | StoreError::PickupNotPending { .. } => StatusCode::CONFLICT,
        StoreError::Database(_) | StoreError::Migration(_) | StoreError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<OpsError> for ApiError {
    fn from(err: OpsError) -> Self {
        ApiError::Ops(err)
    }
}

impl From<AlertError> for ApiError {
    fn from(err: AlertError) -> Self {
        let AlertError::Store(inner) = err;
        ApiError::Ops(OpsError::Store(inner))
    }
}
