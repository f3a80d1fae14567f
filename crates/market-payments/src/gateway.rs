//! PayChangu Hosted Checkout
//!
//! Both purchase flows redirect the buyer to the gateway's hosted checkout
//! page. The server never sees card or mobile-money details; the outcome
//! arrives later through the webhook.
//!
//! When no secret key is configured the [`TestModeGateway`] hands out test
//! checkout URLs instead of calling the gateway.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{PaymentError, Result};

/// Default gateway API base URL
pub const DEFAULT_API_URL: &str = "https://api.paychangu.com";

/// Base URL for test-mode checkout links
pub const TEST_CHECKOUT_URL: &str = "https://test-checkout.paychangu.com";

/// Request to create a hosted checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSessionRequest {
    pub amount: Decimal,
    pub currency: String,
    pub email: String,
    /// Our reference; echoed back as `data.reference` in the webhook
    pub tx_ref: String,
    pub callback_url: String,
    pub return_url: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub meta: Value,
}

/// Result of creating a checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// URL to redirect the payer to
    pub checkout_url: String,

    /// Gateway reference (falls back to our `tx_ref`)
    pub reference: String,

    /// True when no real gateway was called
    pub test_mode: bool,
}

/// Payment gateway abstraction (live PayChangu or test mode)
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session
    async fn create_checkout(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession>;

    /// Whether requests reach a real gateway
    fn is_live(&self) -> bool;

    /// Gateway name for logs
    fn name(&self) -> &str;
}

/// Pick the live gateway when a secret key is configured, test mode otherwise
pub fn select_gateway(secret_key: Option<&str>, api_url: &str) -> Arc<dyn PaymentGateway> {
    match secret_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => Arc::new(PayChanguClient::new(key, api_url)),
        None => {
            tracing::warn!("PAYCHANGU_SECRET_KEY not set, using test mode");
            Arc::new(TestModeGateway::default())
        }
    }
}

// ============================================================================
// Live gateway
// ============================================================================

#[derive(Serialize)]
struct Customization<'a> {
    title: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct PaymentBody<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: &'a str,
    email: &'a str,
    callback_url: &'a str,
    return_url: &'a str,
    tx_ref: &'a str,
    customization: Customization<'a>,
    meta: &'a Value,
}

impl<'a> From<&'a CheckoutSessionRequest> for PaymentBody<'a> {
    fn from(request: &'a CheckoutSessionRequest) -> Self {
        Self {
            amount: request.amount,
            currency: &request.currency,
            email: &request.email,
            callback_url: &request.callback_url,
            return_url: &request.return_url,
            tx_ref: &request.tx_ref,
            customization: Customization {
                title: &request.title,
                description: &request.description,
            },
            meta: &request.meta,
        }
    }
}

/// PayChangu REST client
pub struct PayChanguClient {
    http: reqwest::Client,
    secret_key: String,
    api_url: String,
}

impl PayChanguClient {
    pub fn new(secret_key: &str, api_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for PayChanguClient {
    async fn create_checkout(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession> {
        tracing::info!(
            tx_ref = %request.tx_ref,
            amount = %request.amount,
            currency = %request.currency,
            "Creating PayChangu payment"
        );

        let response = self
            .http
            .post(format!("{}/payment", self.api_url))
            .bearer_auth(&self.secret_key)
            .json(&PaymentBody::from(request))
            .send()
            .await?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));

        if !is_json {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                body = %text.chars().take(500).collect::<String>(),
                "Non-JSON response from PayChangu"
            );
            return Err(PaymentError::NonJsonResponse {
                status: status.as_u16(),
            });
        }

        let body: Value = response.json().await?;
        interpret_response(status, body, &request.tx_ref)
    }

    fn is_live(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "PayChangu"
    }
}

/// Turn a JSON gateway response into a session or an upstream error.
///
/// The checkout URL and reference are read from `data.*` first, then from
/// the top level.
fn interpret_response(status: StatusCode, body: Value, tx_ref: &str) -> Result<CheckoutSession> {
    if !status.is_success() {
        tracing::error!(status = status.as_u16(), body = %body, "PayChangu API error");
        return Err(PaymentError::Upstream {
            status: status.as_u16(),
            body,
        });
    }

    let field = |name: &str| {
        body.get("data")
            .and_then(|d| d.get(name))
            .or_else(|| body.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let checkout_url = field("checkout_url")
        .ok_or_else(|| PaymentError::Gateway("No checkout URL returned".into()))?;
    let reference = field("reference").unwrap_or_else(|| tx_ref.to_string());

    tracing::info!(reference = %reference, "PayChangu payment created");

    Ok(CheckoutSession {
        checkout_url,
        reference,
        test_mode: false,
    })
}

// ============================================================================
// Test mode
// ============================================================================

/// Gateway stand-in used when no secret key is configured
pub struct TestModeGateway {
    checkout_base: String,
}

impl Default for TestModeGateway {
    fn default() -> Self {
        Self::new(TEST_CHECKOUT_URL)
    }
}

impl TestModeGateway {
    pub fn new(checkout_base: &str) -> Self {
        Self {
            checkout_base: checkout_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for TestModeGateway {
    async fn create_checkout(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession> {
        tracing::debug!(tx_ref = %request.tx_ref, "Test-mode checkout");
        Ok(CheckoutSession {
            checkout_url: format!("{}/{}", self.checkout_base, request.tx_ref),
            reference: request.tx_ref.clone(),
            test_mode: true,
        })
    }

    fn is_live(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "test-mode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            amount: dec!(2500),
            currency: "MWK".into(),
            email: "fan@example.com".into(),
            tx_ref: "coffee-coffee-ab12cd34-1700000000000".into(),
            callback_url: "https://app.example.com/webhook".into(),
            return_url: "https://app.example.com/payment/success".into(),
            title: "Buy Me Coffee".into(),
            description: "Support the creator's work".into(),
            meta: json!({"coffee_link_id": "coffee-ab12cd34"}),
        }
    }

    #[test]
    fn test_payment_body_shape() {
        let request = request();
        let body = serde_json::to_value(PaymentBody::from(&request)).unwrap();
        assert_eq!(body["amount"], json!(2500.0));
        assert_eq!(body["tx_ref"], "coffee-coffee-ab12cd34-1700000000000");
        assert_eq!(body["customization"]["title"], "Buy Me Coffee");
        assert_eq!(body["meta"]["coffee_link_id"], "coffee-ab12cd34");
    }

    #[test]
    fn test_interpret_nested_response() {
        let body = json!({"data": {"checkout_url": "https://checkout/abc", "reference": "ref_1"}});
        let session = interpret_response(StatusCode::OK, body, "tx").unwrap();
        assert_eq!(session.checkout_url, "https://checkout/abc");
        assert_eq!(session.reference, "ref_1");
        assert!(!session.test_mode);
    }

    #[test]
    fn test_interpret_flat_response_falls_back_to_tx_ref() {
        let body = json!({"checkout_url": "https://checkout/flat"});
        let session = interpret_response(StatusCode::CREATED, body, "tx_9").unwrap();
        assert_eq!(session.checkout_url, "https://checkout/flat");
        assert_eq!(session.reference, "tx_9");
    }

    #[test]
    fn test_interpret_upstream_error_passes_body_through() {
        let body = json!({"message": "Invalid currency"});
        let err = interpret_response(StatusCode::UNPROCESSABLE_ENTITY, body.clone(), "tx").unwrap_err();
        match err {
            PaymentError::Upstream { status, body: upstream } => {
                assert_eq!(status, 422);
                assert_eq!(upstream, body);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_checkout_url() {
        let err = interpret_response(StatusCode::OK, json!({"data": {}}), "tx").unwrap_err();
        assert!(matches!(err, PaymentError::Gateway(_)));
    }

    #[tokio::test]
    async fn test_test_mode_gateway() {
        let gateway = TestModeGateway::default();
        let session = gateway.create_checkout(&request()).await.unwrap();
        assert!(session.test_mode);
        assert_eq!(
            session.checkout_url,
            "https://test-checkout.paychangu.com/coffee-coffee-ab12cd34-1700000000000"
        );
        assert!(!gateway.is_live());
    }

    #[test]
    fn test_select_gateway() {
        assert!(!select_gateway(None, DEFAULT_API_URL).is_live());
        assert!(!select_gateway(Some("  "), DEFAULT_API_URL).is_live());
        assert!(select_gateway(Some("sk_live"), DEFAULT_API_URL).is_live());
    }
}
