//! API error types with HTTP response mapping.
//!
//! Every failure is rendered as `{"message": ..., "error": ...}`. `message`
//! is a short summary for display; `error` carries the detail, which is a
//! list of field errors when form validation failed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::{DomainError, ValidationErrors};
use serde_json::{Value, json};
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// No usable session on the request.
    Unauthorized(String),
    /// The session lacks the required role.
    Forbidden(String),
    /// Order placement failed.
    Checkout(CheckoutError),
    /// Domain logic error.
    Domain(DomainError),
    /// Store error outside a domain call.
    Store(StoreError),
}

impl ApiError {
    /// Status code this error is rendered with.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Checkout(CheckoutError::IncompleteOrder(_)) => StatusCode::CONFLICT,
            ApiError::Checkout(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Checkout(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Domain(err) => domain_status(err),
            ApiError::Store(err) => store_status(err),
        }
    }

    fn message(&self, status: StatusCode) -> &'static str {
        if let ApiError::Checkout(_) = self {
            return "Failed to create order";
        }
        match status {
            StatusCode::BAD_REQUEST => "Invalid request",
            StatusCode::UNAUTHORIZED => "Authentication required",
            StatusCode::FORBIDDEN => "Not allowed",
            StatusCode::NOT_FOUND => "Not found",
            StatusCode::CONFLICT => "Conflict",
            _ => "Internal server error",
        }
    }

    fn detail(&self) -> Value {
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg) => Value::String(msg.clone()),
            ApiError::Checkout(CheckoutError::Validation(errors))
            | ApiError::Domain(DomainError::Validation(errors)) => validation_detail(errors),
            ApiError::Checkout(err) => Value::String(err.to_string()),
            ApiError::Domain(err) => Value::String(err.to_string()),
            ApiError::Store(err) => Value::String(err.to_string()),
        }
    }
}

fn validation_detail(errors: &ValidationErrors) -> Value {
    serde_json::to_value(errors).unwrap_or_else(|_| Value::String(errors.to_string()))
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_)
        | DomainError::InsufficientStock { .. }
        | DomainError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
        DomainError::InvalidTransition { .. } => StatusCode::CONFLICT,
        DomainError::ProductNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Store(e) => store_status(e),
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.detail();
        if status.is_server_error() {
            tracing::error!(error = %detail, "internal server error");
        } else {
            tracing::debug!(status = status.as_u16(), error = %detail, "request rejected");
        }

        let body = json!({ "message": self.message(status), "error": detail });
        (status, axum::Json(body)).into_response()
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
