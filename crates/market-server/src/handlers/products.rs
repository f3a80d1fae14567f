//! Product listing, seller catalogue and admin review

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use market_core::{Analytics, Product, ProductFilter, ProductStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: Option<Decimal>,
    pub file_url: Option<String>,
    pub trailer_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SellerProduct {
    #[serde(flatten)]
    pub product: Product,
    pub analytics: Analytics,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

/// Public listing of LIVE products
pub async fn list_products(State(state): State<AppState>) -> ApiResult<Vec<Product>> {
    Ok(Json(state.market.list_products(&ProductFilter::live()).await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Product> {
    state
        .market
        .get_product(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Product not found"))
}

/// New products start PENDING until an admin reviews them
pub async fn create_product(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let seller = user.require_seller()?;

    let title = request
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("Title is required"))?;
    let price = request
        .price
        .filter(|p| *p > Decimal::ZERO)
        .ok_or_else(|| ApiError::bad_request("Price must be greater than zero"))?;
    let file_url = request
        .file_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("File URL is required"))?;

    let mut product = Product::new(&seller.id, title, price, file_url);
    product.description = request.description.trim().to_string();
    product.trailer_url = request.trailer_url.filter(|u| !u.trim().is_empty());
    state.market.save_product(&product).await?;

    tracing::info!(product_id = %product.id, seller = %seller.id, "Product submitted for review");
    Ok((StatusCode::CREATED, Json(product)))
}

/// The caller's products with their sales and view counters
pub async fn seller_products(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Vec<SellerProduct>> {
    let seller = user.require_seller()?;
    let products = state
        .market
        .list_products(&ProductFilter::by_seller(&seller.id))
        .await?;

    let mut listing = Vec::with_capacity(products.len());
    for product in products {
        let analytics = state.market.get_analytics(&product.id).await?;
        listing.push(SellerProduct { product, analytics });
    }
    Ok(Json(listing))
}

/// APPROVED → LIVE, by the owning seller
pub async fn publish_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Product> {
    let seller = user.require_seller()?;
    let product = state
        .market
        .get_product(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    if product.seller_id != seller.id {
        return Err(ApiError::forbidden("You can only publish your own products"));
    }

    let product = state.market.transition_product(&id, ProductStatus::Live).await?;
    tracing::info!(product_id = %product.id, "Product is live");
    Ok(Json(product))
}

/// Products in a review state, PENDING by default
pub async fn admin_products(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Vec<Product>> {
    user.require_admin()?;
    let status = match query.status.as_deref() {
        Some(raw) => raw
            .to_uppercase()
            .parse::<ProductStatus>()
            .map_err(|_| ApiError::bad_request(format!("Unknown product status: {raw}")))?,
        None => ProductStatus::Pending,
    };
    Ok(Json(
        state
            .market
            .list_products(&ProductFilter::with_status(status))
            .await?,
    ))
}

pub async fn approve_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Product> {
    let admin = user.require_admin()?;
    let product = state
        .market
        .transition_product(&id, ProductStatus::Approved)
        .await?;
    tracing::info!(product_id = %product.id, admin = %admin.id, "Product approved");
    Ok(Json(product))
}

pub async fn reject_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<RejectRequest>,
) -> ApiResult<Product> {
    let admin = user.require_admin()?;
    let product = state
        .market
        .transition_product(&id, ProductStatus::Rejected)
        .await?;
    tracing::info!(
        product_id = %product.id,
        admin = %admin.id,
        reason = request.reason.as_deref().unwrap_or("none given"),
        "Product rejected"
    );
    Ok(Json(product))
}
