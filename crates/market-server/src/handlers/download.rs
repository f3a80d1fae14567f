//! Signed download and trailer URLs

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Utc};
use market_core::{DownloadDenied, DownloadOutcome};
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::state::AppState;

/// Lifetime of a signed file URL
pub const SIGNED_URL_TTL_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
    pub product_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub download_url: String,
    pub remaining_downloads: u32,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailerRequest {
    pub product_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailerResponse {
    pub trailer_url: String,
    pub expires_in: i64,
}

/// Hand out a signed URL for a purchased file, counting it against the quota
pub async fn download(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<DownloadResponse> {
    let product_id = query
        .product_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Product ID is required"))?;

    let now = Utc::now();

    // Sign before the quota is touched so a signing error never costs a download
    let product = state
        .market
        .get_product(&product_id)
        .await?
        .ok_or_else(|| ApiError::forbidden(DownloadDenied::NotOwned.message()))?;
    let download_url = state
        .signer
        .sign(&product.file_url, SIGNED_URL_TTL_SECS, now)?;

    let grant = match state
        .market
        .consume_download(&user.id, &product_id, &state.download_policy, now)
        .await?
    {
        DownloadOutcome::Granted(grant) => grant,
        DownloadOutcome::Denied(reason) => {
            tracing::warn!(user = %user.id, product_id = %product_id, reason = ?reason, "Download denied");
            return Err(ApiError::forbidden(reason.message()));
        }
    };

    tracing::info!(
        order_id = %grant.order.id,
        download_count = grant.order.download_count,
        remaining = grant.remaining,
        "Download granted"
    );

    Ok(Json(DownloadResponse {
        download_url,
        remaining_downloads: grant.remaining,
        expires_at: grant.order.expires_at,
    }))
}

/// Public trailer preview for a LIVE product; counts as a view
pub async fn trailer(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<TrailerRequest>,
) -> ApiResult<TrailerResponse> {
    if request.kind.as_deref() != Some("trailer") {
        return Err(ApiError::bad_request("Invalid request type"));
    }
    let product_id = request.product_id.unwrap_or_default();

    let product = state
        .market
        .get_product(&product_id)
        .await?
        .filter(|p| p.is_live())
        .ok_or_else(|| ApiError::not_found("Product not found or not available"))?;
    let trailer_url = product
        .trailer_url
        .as_deref()
        .ok_or_else(|| ApiError::not_found("No trailer available for this product"))?;

    let signed = state
        .signer
        .sign(trailer_url, SIGNED_URL_TTL_SECS, Utc::now())?;
    state.market.record_view(&product.id).await?;

    Ok(Json(TrailerResponse {
        trailer_url: signed,
        expires_in: SIGNED_URL_TTL_SECS,
    }))
}
