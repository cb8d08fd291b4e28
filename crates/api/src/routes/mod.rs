//! HTTP route handlers.

pub mod alerts;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod pickups;
pub mod restocks;
pub mod stock;
pub mod webhooks;

use uuid::Uuid;

use crate::error::ApiError;

/// Parses a path or body segment as a UUID-backed id.
pub(crate) fn parse_id<T: From<Uuid>>(raw: &str, what: &str) -> Result<T, ApiError> {
    let uuid = Uuid::parse_str(raw)
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what}: {e}")))?;
    Ok(T::from(uuid))
}
