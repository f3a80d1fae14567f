//! PayChangu Webhook Handling
//!
//! Verifies the `x-paychangu-signature` header and applies payment outcomes
//! to orders and donations.
//!
//! References starting with `coffee-` belong to donations; everything else
//! is an order id. Settlement only moves records out of their pending state,
//! so a redelivered event is acknowledged without touching anything.

use chrono::Utc;
use hmac::{Hmac, Mac};
use market_core::{
    CoffeePayment, CoffeePaymentStatus, DonationOutcome, DonationStore, MarketStore,
    OrderStatus, SettleOutcome, Settlement,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC-SHA256 of the raw body
pub const SIGNATURE_HEADER: &str = "x-paychangu-signature";

/// Prefix of donation references (`coffee-<slug>-<millis>`)
pub const DONATION_REF_PREFIX: &str = "coffee-";

/// HMAC-SHA256 signature check over the raw request body
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Option<Vec<u8>>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl WebhookVerifier {
    /// An empty secret counts as unconfigured
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret: secret
                .filter(|s| !s.is_empty())
                .map(|s| s.as_bytes().to_vec()),
        }
    }

    pub const fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Reject when the secret is unset, the header is absent, or the
    /// signature does not match.
    pub fn verify(&self, payload: &[u8], signature: Option<&str>) -> Result<()> {
        let Some(secret) = self.secret.as_deref() else {
            return Err(PaymentError::WebhookSignature(
                "webhook secret not configured".into(),
            ));
        };
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PaymentError::WebhookSignature("missing signature".into()))?;
        let expected = hex::decode(signature)
            .map_err(|_| PaymentError::WebhookSignature("signature is not hex".into()))?;

        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| PaymentError::Config(e.to_string()))?;
        mac.update(payload);
        mac.verify_slice(&expected)
            .map_err(|_| PaymentError::WebhookSignature("signature mismatch".into()))
    }

    /// Hex signature for `payload`, as the gateway would send it
    pub fn sign(&self, payload: &[u8]) -> Option<String> {
        let secret = self.secret.as_deref()?;
        let mut mac = HmacSha256::new_from_slice(secret).ok()?;
        mac.update(payload);
        Some(hex::encode(mac.finalize().into_bytes()))
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Webhook body `{event, data}`
#[derive(Clone, Debug, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookData {
    pub reference: Option<String>,
    /// The gateway sends this as a string or a number
    pub transaction_id: Option<Value>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub customer: Option<WebhookCustomer>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub meta: Value,
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookCustomer {
    pub email: Option<String>,
}

impl WebhookData {
    pub fn transaction_id(&self) -> Option<String> {
        match self.transaction_id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn customer_email(&self) -> Option<&str> {
        self.customer
            .as_ref()
            .and_then(|c| c.email.as_deref())
            .filter(|e| !e.is_empty())
    }

    /// Looked up in `metadata`, then `meta`
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .or_else(|| self.meta.get(key))
            .and_then(Value::as_str)
    }
}

/// Event kinds we act on
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    PaymentSucceeded,
    PaymentFailed,
    Other(String),
}

impl WebhookEvent {
    pub fn parse(event: &str) -> Self {
        match event {
            "payment.success" | "charge.success" => Self::PaymentSucceeded,
            "payment.failed" | "charge.failed" => Self::PaymentFailed,
            other => Self::Other(other.to_string()),
        }
    }
}

/// What a verified webhook did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    OrderPaid { order_id: String },
    OrderCancelled { order_id: String },
    DonationCompleted { reference: String },
    DonationFailed { reference: String },
    /// The record had already left its pending state
    AlreadyProcessed { reference: String },
    UnknownReference { reference: String },
    Ignored { event: String },
    /// Verified but unusable body, logged and acknowledged
    Malformed { reason: String },
    /// Store error, logged and acknowledged
    StoreFailure { reference: String },
}

// ============================================================================
// Handler
// ============================================================================

/// Webhook handler
pub struct WebhookHandler {
    verifier: WebhookVerifier,
    market: Arc<dyn MarketStore>,
    donations: Arc<dyn DonationStore>,
}

impl WebhookHandler {
    pub fn new(
        verifier: WebhookVerifier,
        market: Arc<dyn MarketStore>,
        donations: Arc<dyn DonationStore>,
    ) -> Self {
        Self {
            verifier,
            market,
            donations,
        }
    }

    pub const fn verifier(&self) -> &WebhookVerifier {
        &self.verifier
    }

    /// Verify, parse and apply a raw webhook body.
    ///
    /// Only signature failures are errors. Once verified, every body is
    /// acknowledged with an outcome so the gateway stops redelivering it.
    pub async fn process(&self, body: &[u8], signature: Option<&str>) -> Result<WebhookOutcome> {
        if let Err(e) = self.verifier.verify(body, signature) {
            tracing::warn!(error = %e, "Rejected webhook");
            return Err(e);
        }

        match serde_json::from_slice::<WebhookPayload>(body) {
            Ok(payload) => self.handle(payload).await,
            Err(e) => {
                tracing::warn!(error = %e, "Verified webhook is not a valid payload");
                Ok(WebhookOutcome::Malformed {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Apply an already verified payload
    pub async fn handle(&self, payload: WebhookPayload) -> Result<WebhookOutcome> {
        let event = WebhookEvent::parse(&payload.event);
        tracing::info!(event = %payload.event, reference = ?payload.data.reference, "Processing PayChangu webhook");

        let succeeded = match event {
            WebhookEvent::PaymentSucceeded => true,
            WebhookEvent::PaymentFailed => false,
            WebhookEvent::Other(event) => {
                tracing::debug!(event = %event, "Unhandled webhook event");
                return Ok(WebhookOutcome::Ignored { event });
            }
        };

        let Some(reference) = payload.data.reference.clone().filter(|r| !r.is_empty()) else {
            tracing::warn!(event = %payload.event, "Webhook without data.reference");
            return Ok(WebhookOutcome::Malformed {
                reason: "data.reference is required".into(),
            });
        };

        let result = if reference.starts_with(DONATION_REF_PREFIX) {
            self.settle_donation(&reference, &payload.data, succeeded).await
        } else {
            self.settle_order(&reference, &payload.data, succeeded).await
        };

        Ok(result.unwrap_or_else(|e| {
            tracing::error!(reference = %reference, error = %e, "Webhook settlement failed");
            WebhookOutcome::StoreFailure { reference }
        }))
    }

    async fn settle_order(
        &self,
        order_id: &str,
        data: &WebhookData,
        succeeded: bool,
    ) -> Result<WebhookOutcome> {
        let settlement = if succeeded {
            Settlement::Paid {
                transaction_id: data.transaction_id(),
            }
        } else {
            Settlement::Failed
        };

        match self.market.settle_order(order_id, settlement).await? {
            SettleOutcome::Applied { order, payment } => {
                if let Some(amount) = data.amount {
                    if amount != payment.amount {
                        tracing::warn!(
                            order_id = %order.id,
                            expected = %payment.amount,
                            received = %amount,
                            "Webhook amount differs from order amount"
                        );
                    }
                }
                tracing::info!(
                    order_id = %order.id,
                    status = %order.status,
                    transaction_id = ?payment.transaction_id,
                    "Order settled"
                );
                Ok(match order.status {
                    OrderStatus::Paid => WebhookOutcome::OrderPaid { order_id: order.id },
                    _ => WebhookOutcome::OrderCancelled { order_id: order.id },
                })
            }
            SettleOutcome::AlreadySettled(status) => {
                tracing::info!(order_id = %order_id, status = %status, "Order already settled");
                Ok(WebhookOutcome::AlreadyProcessed {
                    reference: order_id.to_string(),
                })
            }
            SettleOutcome::NotFound => {
                tracing::warn!(reference = %order_id, "Order not found for webhook");
                Ok(WebhookOutcome::UnknownReference {
                    reference: order_id.to_string(),
                })
            }
        }
    }

    async fn settle_donation(
        &self,
        reference: &str,
        data: &WebhookData,
        succeeded: bool,
    ) -> Result<WebhookOutcome> {
        let status = if succeeded {
            CoffeePaymentStatus::Completed
        } else {
            CoffeePaymentStatus::Failed
        };

        match self
            .donations
            .settle_coffee_payment(reference, status, data.customer_email())
            .await?
        {
            DonationOutcome::Applied(payment) => {
                tracing::info!(
                    reference = %payment.payment_reference,
                    coffee_link = %payment.coffee_link_id,
                    status = %payment.status,
                    "Donation settled"
                );
                Ok(done(reference, succeeded))
            }
            DonationOutcome::AlreadySettled(status) => {
                tracing::info!(reference = %reference, status = %status, "Donation already settled");
                Ok(WebhookOutcome::AlreadyProcessed {
                    reference: reference.to_string(),
                })
            }
            DonationOutcome::NotFound => {
                // A success for a donation we never recorded still carries the link in metadata
                let link = data.meta_str("coffee_link_id").filter(|_| succeeded);
                let Some(link) = link else {
                    tracing::warn!(reference = %reference, "Donation not found for webhook");
                    return Ok(WebhookOutcome::UnknownReference {
                        reference: reference.to_string(),
                    });
                };

                let mut payment = CoffeePayment::pending(
                    reference,
                    link,
                    data.amount.unwrap_or_default(),
                    data.currency.as_deref().unwrap_or("MWK"),
                    data.customer_email().unwrap_or_default(),
                );
                payment.donor_message = data.meta_str("message").map(str::to_string);
                payment.status = CoffeePaymentStatus::Completed;
                payment.updated_at = Utc::now();
                self.donations.insert_coffee_payment(&payment).await?;

                tracing::info!(reference = %reference, coffee_link = %link, "Recorded donation from webhook");
                Ok(done(reference, true))
            }
        }
    }
}

fn done(reference: &str, succeeded: bool) -> WebhookOutcome {
    let reference = reference.to_string();
    if succeeded {
        WebhookOutcome::DonationCompleted { reference }
    } else {
        WebhookOutcome::DonationFailed { reference }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::{
        CoreError, MemoryStore, Order, Payment, PaymentStatus, Product, ProductStatus,
    };
    use rust_decimal_macros::dec;
    use serde_json::json;

    const SECRET: &str = "whsec_test";

    fn handler(store: &Arc<MemoryStore>) -> WebhookHandler {
        WebhookHandler::new(
            WebhookVerifier::new(Some(SECRET)),
            store.clone(),
            store.clone(),
        )
    }

    async fn pending_order(store: &MemoryStore) -> (Product, Order) {
        let mut product = Product::new("seller_1", "Beat pack", dec!(10), "https://files/beat.zip");
        product.status = ProductStatus::Live;
        store.save_product(&product).await.unwrap();

        let mut order = Order::new("buyer_1", &product.id, 30);
        order.id = "ord_1".into();
        let payment = Payment::for_order(&order, product.price, "USD");
        store.create_order(&order, &payment).await.unwrap();
        (product, order)
    }

    fn signed(body: &Value) -> (Vec<u8>, String) {
        let bytes = serde_json::to_vec(body).unwrap();
        let signature = WebhookVerifier::new(Some(SECRET)).sign(&bytes).unwrap();
        (bytes, signature)
    }

    #[test]
    fn test_verify_rejects_bad_signatures() {
        let verifier = WebhookVerifier::new(Some(SECRET));
        let body = br#"{"event":"payment.success"}"#;
        let good = verifier.sign(body).unwrap();

        assert!(verifier.verify(body, Some(&good)).is_ok());
        assert!(verifier.verify(body, None).is_err());
        assert!(verifier.verify(body, Some("")).is_err());
        assert!(verifier.verify(body, Some("not-hex")).is_err());
        assert!(verifier.verify(b"{}", Some(&good)).is_err());
    }

    #[test]
    fn test_unconfigured_secret_rejects_everything() {
        let verifier = WebhookVerifier::new(Some(""));
        assert!(!verifier.is_configured());
        let signature = WebhookVerifier::new(Some(SECRET)).sign(b"{}").unwrap();
        assert!(verifier.verify(b"{}", Some(&signature)).is_err());
    }

    #[test]
    fn test_event_parsing() {
        assert_eq!(WebhookEvent::parse("payment.success"), WebhookEvent::PaymentSucceeded);
        assert_eq!(WebhookEvent::parse("charge.success"), WebhookEvent::PaymentSucceeded);
        assert_eq!(WebhookEvent::parse("payment.failed"), WebhookEvent::PaymentFailed);
        assert_eq!(
            WebhookEvent::parse("refund.created"),
            WebhookEvent::Other("refund.created".into())
        );
    }

    #[tokio::test]
    async fn test_invalid_signature_mutates_nothing() {
        let store = Arc::new(MemoryStore::new());
        let (_, order) = pending_order(&store).await;
        let handler = handler(&store);

        let (body, _) = signed(&json!({"event": "payment.success", "data": {"reference": "ord_1"}}));
        let err = handler.process(&body, Some("deadbeef")).await.unwrap_err();
        assert!(matches!(err, PaymentError::WebhookSignature(_)));

        let err = handler.process(&body, None).await.unwrap_err();
        assert!(matches!(err, PaymentError::WebhookSignature(_)));

        let stored = store.get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_unknown_event_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        let (_, order) = pending_order(&store).await;

        let (body, sig) = signed(&json!({"event": "payout.created", "data": {"reference": "ord_1"}}));
        let outcome = handler(&store).process(&body, Some(&sig)).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored { event: "payout.created".into() });

        let stored = store.get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_success_marks_order_paid_once() {
        let store = Arc::new(MemoryStore::new());
        let (product, order) = pending_order(&store).await;
        let handler = handler(&store);

        let (body, sig) = signed(&json!({
            "event": "payment.success",
            "data": {"reference": "ord_1", "transaction_id": "tx_1", "amount": 10}
        }));

        let first = handler.process(&body, Some(&sig)).await.unwrap();
        assert_eq!(first, WebhookOutcome::OrderPaid { order_id: "ord_1".into() });

        let second = handler.process(&body, Some(&sig)).await.unwrap();
        assert_eq!(second, WebhookOutcome::AlreadyProcessed { reference: "ord_1".into() });

        let stored = store.get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);

        let payment = store.get_payment_for_order(&order.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.transaction_id.as_deref(), Some("tx_1"));

        let analytics = store.get_analytics(&product.id).await.unwrap();
        assert_eq!(analytics.sales_count, 1);
        assert_eq!(analytics.revenue, dec!(10));
    }

    #[tokio::test]
    async fn test_failure_cancels_order() {
        let store = Arc::new(MemoryStore::new());
        let (product, order) = pending_order(&store).await;

        let (body, sig) = signed(&json!({"event": "payment.failed", "data": {"reference": "ord_1"}}));
        let outcome = handler(&store).process(&body, Some(&sig)).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::OrderCancelled { order_id: "ord_1".into() });

        let stored = store.get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        let payment = store.get_payment_for_order(&order.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(store.get_analytics(&product.id).await.unwrap().sales_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_reference_is_acknowledged() {
        let store = Arc::new(MemoryStore::new());
        let (body, sig) = signed(&json!({"event": "payment.success", "data": {"reference": "ord_missing"}}));
        let outcome = handler(&store).process(&body, Some(&sig)).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::UnknownReference { reference: "ord_missing".into() });
    }

    #[tokio::test]
    async fn test_malformed_payloads_are_acknowledged() {
        let store = Arc::new(MemoryStore::new());
        let (_, order) = pending_order(&store).await;
        let handler = handler(&store);

        let body = b"not json".to_vec();
        let sig = handler.verifier().sign(&body).unwrap();
        let outcome = handler.process(&body, Some(&sig)).await.unwrap();
        assert!(matches!(outcome, WebhookOutcome::Malformed { .. }));

        let (body, sig) = signed(&json!({"event": "payment.success", "data": {"transaction_id": "tx_1"}}));
        let outcome = handler.process(&body, Some(&sig)).await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Malformed { reason: "data.reference is required".into() }
        );

        let (body, sig) = signed(&json!({"event": "payment.failed", "data": null}));
        let outcome = handler.process(&body, Some(&sig)).await.unwrap();
        assert!(matches!(outcome, WebhookOutcome::Malformed { .. }));

        // Unsigned garbage is still a signature failure
        let err = handler.process(b"not json", None).await.unwrap_err();
        assert!(matches!(err, PaymentError::WebhookSignature(_)));

        let stored = store.get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    /// Market store whose settlement always fails
    struct BrokenSettlement(Arc<MemoryStore>);

    #[async_trait::async_trait]
    impl MarketStore for BrokenSettlement {
        async fn save_user(&self, user: &market_core::User) -> market_core::Result<()> {
            self.0.save_user(user).await
        }
        async fn get_user(&self, id: &str) -> market_core::Result<Option<market_core::User>> {
            self.0.get_user(id).await
        }
        async fn get_user_by_email(
            &self,
            email: &str,
        ) -> market_core::Result<Option<market_core::User>> {
            self.0.get_user_by_email(email).await
        }
        async fn save_product(&self, product: &Product) -> market_core::Result<()> {
            self.0.save_product(product).await
        }
        async fn get_product(&self, id: &str) -> market_core::Result<Option<Product>> {
            self.0.get_product(id).await
        }
        async fn list_products(
            &self,
            filter: &market_core::ProductFilter,
        ) -> market_core::Result<Vec<Product>> {
            self.0.list_products(filter).await
        }
        async fn transition_product(
            &self,
            id: &str,
            next: ProductStatus,
        ) -> market_core::Result<Product> {
            self.0.transition_product(id, next).await
        }
        async fn create_order(&self, order: &Order, payment: &Payment) -> market_core::Result<()> {
            self.0.create_order(order, payment).await
        }
        async fn get_order(&self, id: &str) -> market_core::Result<Option<Order>> {
            self.0.get_order(id).await
        }
        async fn get_payment_for_order(
            &self,
            order_id: &str,
        ) -> market_core::Result<Option<Payment>> {
            self.0.get_payment_for_order(order_id).await
        }
        async fn find_paid_order(
            &self,
            user_id: &str,
            product_id: &str,
        ) -> market_core::Result<Option<Order>> {
            self.0.find_paid_order(user_id, product_id).await
        }
        async fn list_orders_for_user(&self, user_id: &str) -> market_core::Result<Vec<Order>> {
            self.0.list_orders_for_user(user_id).await
        }
        async fn settle_order(
            &self,
            _: &str,
            _: Settlement,
        ) -> market_core::Result<SettleOutcome> {
            Err(CoreError::Storage("connection reset".into()))
        }
        async fn consume_download(
            &self,
            user_id: &str,
            product_id: &str,
            policy: &market_core::DownloadPolicy,
            now: chrono::DateTime<Utc>,
        ) -> market_core::Result<market_core::DownloadOutcome> {
            self.0.consume_download(user_id, product_id, policy, now).await
        }
        async fn get_analytics(
            &self,
            product_id: &str,
        ) -> market_core::Result<market_core::Analytics> {
            self.0.get_analytics(product_id).await
        }
        async fn record_view(&self, product_id: &str) -> market_core::Result<()> {
            self.0.record_view(product_id).await
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_acknowledged() {
        let store = Arc::new(MemoryStore::new());
        let (_, order) = pending_order(&store).await;
        let handler = WebhookHandler::new(
            WebhookVerifier::new(Some(SECRET)),
            Arc::new(BrokenSettlement(store.clone())),
            store.clone(),
        );

        let (body, sig) = signed(&json!({"event": "payment.success", "data": {"reference": "ord_1"}}));
        let outcome = handler.process(&body, Some(&sig)).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::StoreFailure { reference: "ord_1".into() });

        let stored = store.get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_donation_completed() {
        let store = Arc::new(MemoryStore::new());
        let reference = "coffee-coffee-ab12cd34-1700000000000";
        let payment = CoffeePayment::pending(reference, "coffee-ab12cd34", dec!(2500), "MWK", "");
        store.insert_coffee_payment(&payment).await.unwrap();

        let (body, sig) = signed(&json!({
            "event": "payment.success",
            "data": {"reference": reference, "customer": {"email": "fan@example.com"}}
        }));
        let outcome = handler(&store).process(&body, Some(&sig)).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::DonationCompleted { reference: reference.into() });

        let stored = store.get_coffee_payment(reference).await.unwrap().unwrap();
        assert_eq!(stored.status, CoffeePaymentStatus::Completed);
        assert_eq!(stored.donor_email, "fan@example.com");
    }

    #[tokio::test]
    async fn test_donation_recorded_from_metadata() {
        let store = Arc::new(MemoryStore::new());
        let reference = "coffee-coffee-ffff0000-1700000000000";

        let (body, sig) = signed(&json!({
            "event": "charge.success",
            "data": {
                "reference": reference,
                "amount": 5000,
                "currency": "MWK",
                "customer": {"email": "fan@example.com"},
                "metadata": {"coffee_link_id": "coffee-ffff0000", "message": "Keep going"}
            }
        }));
        let outcome = handler(&store).process(&body, Some(&sig)).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::DonationCompleted { reference: reference.into() });

        let stored = store.get_coffee_payment(reference).await.unwrap().unwrap();
        assert_eq!(stored.coffee_link_id, "coffee-ffff0000");
        assert_eq!(stored.amount, dec!(5000));
        assert_eq!(stored.donor_message.as_deref(), Some("Keep going"));
        assert_eq!(stored.status, CoffeePaymentStatus::Completed);
    }

    #[tokio::test]
    async fn test_donation_failed_without_record_is_unknown() {
        let store = Arc::new(MemoryStore::new());
        let (body, sig) = signed(&json!({
            "event": "payment.failed",
            "data": {"reference": "coffee-coffee-00000000-1", "metadata": {"coffee_link_id": "coffee-00000000"}}
        }));
        let outcome = handler(&store).process(&body, Some(&sig)).await.unwrap();
        assert!(matches!(outcome, WebhookOutcome::UnknownReference { .. }));
        assert!(store.get_coffee_payment("coffee-coffee-00000000-1").await.unwrap().is_none());
    }
}
