//! Payment Error Types

use market_core::CoreError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Gateway transport or protocol error
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Gateway answered with a non-2xx JSON body
    #[error("Gateway rejected request ({status})")]
    Upstream {
        status: u16,
        body: serde_json::Value,
    },

    /// Gateway answered with something other than JSON
    #[error("Gateway returned non-JSON response: {status}")]
    NonJsonResponse { status: u16 },

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Request failed validation
    #[error("{0}")]
    Validation(String),

    /// Unknown product, link or reference
    #[error("{0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Store(#[from] CoreError),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Gateway(_) | Self::NonJsonResponse { .. } => true,
            Self::Store(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Gateway(_) | Self::NonJsonResponse { .. } => {
                "Payment processing failed. Please try again.".into()
            }
            Self::Upstream { .. } => "The payment provider rejected the request.".into(),
            Self::WebhookSignature(_) => "Invalid signature".into(),
            Self::Validation(msg) | Self::NotFound(msg) => msg.clone(),
            Self::Config(_) => "Service configuration error.".into(),
            Self::Store(_) => "An error occurred processing your request.".into(),
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        Self::Gateway(err.to_string())
    }
}
