//! Seller upload slots

use axum::{Json, extract::State};
use market_core::UploadRequest;
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::error::{ApiJson, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub upload_url: String,
    pub file_url: String,
    pub message: String,
}

/// Validate the file and hand out storage URLs for it
pub async fn upload(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<UploadRequest>,
) -> ApiResult<UploadResponse> {
    let seller = user.require_seller()?;
    let target = request.target(&state.storage_base_url, &seller.id)?;

    tracing::info!(
        seller = %seller.id,
        file_type = %request.file_type,
        size = request.file_size,
        teaser = request.is_teaser,
        "Upload slot issued"
    );

    Ok(Json(UploadResponse {
        upload_url: target.upload_url,
        file_url: target.file_url,
        message: "Upload URL generated successfully".into(),
    }))
}
