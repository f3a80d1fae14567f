//! API Error Responses
//!
//! Every failure leaves the server as `{"error": ..., "code": ...}` with a
//! status code from its class. Internal details are logged, not returned.

use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use market_core::CoreError;
use market_payments::PaymentError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    fn status_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Payment(e) => payment_status(e),
            Self::Core(e) => core_status(e),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Payment(e) => e.user_message(),
            Self::Core(
                CoreError::Validation(msg)
                | CoreError::NotFound(msg)
                | CoreError::InvalidTransition(msg)
                | CoreError::Conflict(msg),
            ) => msg.clone(),
            Self::Core(_) | Self::Internal(_) => "Internal server error".into(),
            other => other.to_string(),
        }
    }
}

const fn payment_status(error: &PaymentError) -> (StatusCode, &'static str) {
    match error {
        PaymentError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        PaymentError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        PaymentError::Upstream { .. } => (StatusCode::BAD_REQUEST, "GATEWAY_REJECTED"),
        PaymentError::WebhookSignature(_) => (StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE"),
        PaymentError::Gateway(_) | PaymentError::NonJsonResponse { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "GATEWAY_ERROR")
        }
        PaymentError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
        PaymentError::Store(e) => core_status(e),
    }
}

const fn core_status(error: &CoreError) -> (StatusCode, &'static str) {
    match error {
        CoreError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        CoreError::InvalidTransition(_) => (StatusCode::BAD_REQUEST, "INVALID_TRANSITION"),
        CoreError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_code();

        if status.is_server_error() {
            let retryable = match &self {
                Self::Payment(e) => e.is_retryable(),
                Self::Core(e) => e.is_retryable(),
                _ => false,
            };
            tracing::error!(error = %self, code, retryable, "Request failed");
        } else {
            tracing::debug!(error = %self, code, "Request rejected");
        }

        // The gateway's own error body is passed through untouched
        if let Self::Payment(PaymentError::Upstream { body, .. }) = self {
            return (status, Json(json!({"error": body, "code": code}))).into_response();
        }

        let body = ErrorResponse {
            error: self.message(),
            code: code.into(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// JSON body extractor whose rejections use the API error shape
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Handler result
pub type ApiResult<T> = Result<Json<T>, ApiError>;
