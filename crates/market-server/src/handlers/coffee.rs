//! Coffee links and donations

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use market_core::{CoffeeLink, CoffeePayment, CoffeePaymentStatus};
use market_payments::{DonationCheckout, DonationRequest};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::state::AppState;

/// What the public donation page needs
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicCoffeeLink {
    pub coffee_link: String,
    pub title: String,
    pub description: String,
    pub creator_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub reference: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    pub reference: String,
    pub status: CoffeePaymentStatus,
    pub amount: Decimal,
    pub currency: String,
    pub donor_email: String,
    pub donor_name: Option<String>,
    pub donor_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CoffeePayment> for PaymentStatusResponse {
    fn from(payment: CoffeePayment) -> Self {
        Self {
            reference: payment.payment_reference,
            status: payment.status,
            amount: payment.amount,
            currency: payment.currency,
            donor_email: payment.donor_email,
            donor_name: payment.donor_name,
            donor_message: payment.donor_message,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
        }
    }
}

pub async fn get_link(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<CoffeeLink> {
    Ok(Json(state.donation_service.link_for_user(&user.id).await?))
}

/// Create the caller's link, or replace its slug
pub async fn generate_link(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<CoffeeLink> {
    Ok(Json(state.donation_service.generate_link(&user.id).await?))
}

pub async fn public_link(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<PublicCoffeeLink> {
    let link = state.donation_service.public_link(&slug).await?;
    let creator_name = state
        .market
        .get_user(&link.user_id)
        .await?
        .and_then(|u| u.name);

    Ok(Json(PublicCoffeeLink {
        coffee_link: link.coffee_link,
        title: link.title,
        description: link.description,
        creator_name,
    }))
}

/// The caller's most recent donations
pub async fn recent_payments(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<CoffeePayment>> {
    Ok(Json(state.donation_service.recent_payments(&user.id).await?))
}

/// Open a hosted checkout for a donation; no sign-in required
pub async fn create_payment(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DonationRequest>,
) -> ApiResult<DonationCheckout> {
    Ok(Json(state.donation_service.create_payment(request).await?))
}

pub async fn payment_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<PaymentStatusResponse> {
    let reference = query
        .reference
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ApiError::bad_request("Payment reference required"))?;

    let payment = state.donation_service.payment_status(&reference).await?;
    Ok(Json(payment.into()))
}
