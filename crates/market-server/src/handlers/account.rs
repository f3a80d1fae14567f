//! Health and session endpoints

use axum::{Json, extract::State};
use market_core::User;
use serde::Serialize;

use crate::auth::CurrentUser;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub gateway_live: bool,
    pub webhook_configured: bool,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        gateway_live: state.gateway.is_live(),
        webhook_configured: state.webhooks.verifier().is_configured(),
    })
}

/// The signed-in user
pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
