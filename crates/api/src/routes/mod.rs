//! Route handlers, one module per resource.

pub mod admin;
pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;

use std::str::FromStr;

use axum::Json;
use axum::extract::rejection::JsonRejection;

use crate::error::ApiError;

/// Unwraps a JSON body, turning a malformed one into a 400 with the usual
/// error shape.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// Parses a path identifier, answering 404 for malformed ids.
pub(crate) fn parse_id<T: FromStr>(id: &str, entity: &str) -> Result<T, ApiError> {
    id.parse()
        .map_err(|_| ApiError::NotFound(format!("{entity} {id} not found")))
}
