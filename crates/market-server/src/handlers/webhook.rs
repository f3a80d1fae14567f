//! PayChangu webhook endpoint

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use market_payments::SIGNATURE_HEADER;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Verify and apply a gateway notification.
///
/// The raw body is needed for the signature, so it is read as bytes.
pub async fn paychangu_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<WebhookAck> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state.webhooks.process(&body, signature).await?;
    tracing::debug!(outcome = ?outcome, "Webhook acknowledged");

    Ok(Json(WebhookAck { received: true }))
}
