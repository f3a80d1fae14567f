//! Checkout and the buyer's order history

use axum::{Json, extract::State};
use market_core::{Order, PaymentStatus};
use market_payments::CheckoutReceipt;
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub product_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub product_title: Option<String>,
    pub payment_status: Option<PaymentStatus>,
}

/// Start a purchase; the buyer is redirected to `paymentUrl`
pub async fn create_checkout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> ApiResult<CheckoutReceipt> {
    let product_id = request
        .product_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Product ID is required"))?;

    let receipt = state.checkout.start(&user, &product_id).await?;
    Ok(Json(receipt))
}

/// The caller's orders, newest first
pub async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<OrderSummary>> {
    let orders = state.market.list_orders_for_user(&user.id).await?;

    let mut summaries = Vec::with_capacity(orders.len());
    for order in orders {
        let product_title = state
            .market
            .get_product(&order.product_id)
            .await?
            .map(|p| p.title);
        let payment_status = state
            .market
            .get_payment_for_order(&order.id)
            .await?
            .map(|p| p.status);
        summaries.push(OrderSummary {
            order,
            product_title,
            payment_status,
        });
    }
    Ok(Json(summaries))
}
