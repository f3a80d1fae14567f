//! # market-payments
//!
//! PayChangu payment processing for the marketplace and the donation links.
//!
//! ## Hosted checkout
//!
//! **Flow:** Our site → PayChangu hosted page → back to our site, with the
//! outcome delivered separately to the webhook.
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌───────────────────┐
//! │  Our Site   │────▶│ PayChangu Hosted│────▶│ /dashboard/buyer  │
//! │ (checkout)  │     │  Checkout Page  │     │ /payment/success  │
//! └─────────────┘     └────────┬────────┘     └───────────────────┘
//!                              │ signed webhook
//!                              ▼
//!                     ┌─────────────────┐
//!                     │    /webhook     │──▶ order PAID / donation completed
//!                     └─────────────────┘
//! ```
//!
//! `tx_ref` ties the two halves together: an order id for purchases,
//! `coffee-<slug>-<millis>` for donations.
//!
//! Without `PAYCHANGU_SECRET_KEY` the [`TestModeGateway`] is used and no
//! request leaves the process.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use market_payments::{select_gateway, CheckoutService, DEFAULT_API_URL};
//!
//! let gateway = select_gateway(std::env::var("PAYCHANGU_SECRET_KEY").ok().as_deref(), DEFAULT_API_URL);
//! let checkout = CheckoutService::new(store, gateway, "https://market.example.com", &policy);
//!
//! let receipt = checkout.start(&buyer, &product_id).await?;
//! // Redirect the buyer to: receipt.payment_url
//! ```

mod checkout;
mod donation;
mod error;
mod gateway;
mod webhook;

pub use checkout::{CheckoutReceipt, CheckoutService, MARKET_CURRENCY};
pub use donation::{
    DEFAULT_DONATION_CURRENCY, DonationCheckout, DonationRequest, DonationService,
    RECENT_DONATIONS,
};
pub use error::{PaymentError, Result};
pub use gateway::{
    CheckoutSession, CheckoutSessionRequest, DEFAULT_API_URL, PayChanguClient, PaymentGateway,
    TEST_CHECKOUT_URL, TestModeGateway, select_gateway,
};
pub use webhook::{
    DONATION_REF_PREFIX, SIGNATURE_HEADER, WebhookData, WebhookEvent, WebhookHandler,
    WebhookOutcome, WebhookPayload, WebhookVerifier,
};
