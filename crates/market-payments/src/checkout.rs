//! Marketplace Checkout
//!
//! Creates the pending order and payment for a product, then hands the
//! buyer a hosted checkout URL whose `tx_ref` is the order id.

use market_core::{
    DownloadPolicy, MarketStore, Order, Payment, Settlement, User,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::error::{PaymentError, Result};
use crate::gateway::{CheckoutSessionRequest, PaymentGateway};

/// Marketplace prices are in US dollars
pub const MARKET_CURRENCY: &str = "USD";

/// Response to a successful checkout
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub order_id: String,
    pub payment_id: String,
    /// Redirect the buyer here
    pub payment_url: String,
    pub amount: Decimal,
    pub currency: String,
    pub test_mode: bool,
}

/// Checkout service
pub struct CheckoutService {
    market: Arc<dyn MarketStore>,
    gateway: Arc<dyn PaymentGateway>,
    app_url: String,
    expiry_days: i64,
}

impl CheckoutService {
    pub fn new(
        market: Arc<dyn MarketStore>,
        gateway: Arc<dyn PaymentGateway>,
        app_url: &str,
        policy: &DownloadPolicy,
    ) -> Self {
        Self {
            market,
            gateway,
            app_url: app_url.trim_end_matches('/').to_string(),
            expiry_days: policy.expiry_days,
        }
    }

    /// Start a purchase of `product_id` for `buyer`.
    ///
    /// If the gateway call fails the new order is cancelled before the
    /// error is returned.
    pub async fn start(&self, buyer: &User, product_id: &str) -> Result<CheckoutReceipt> {
        let product = self
            .market
            .get_product(product_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound("Product not found".into()))?;

        if !product.is_live() {
            return Err(PaymentError::Validation(
                "Product not available for purchase".into(),
            ));
        }

        if self
            .market
            .find_paid_order(&buyer.id, &product.id)
            .await?
            .is_some()
        {
            return Err(PaymentError::Validation("You already own this product".into()));
        }

        let order = Order::new(&buyer.id, &product.id, self.expiry_days);
        let payment = Payment::for_order(&order, product.price, MARKET_CURRENCY);
        self.market.create_order(&order, &payment).await?;

        tracing::info!(
            order_id = %order.id,
            product_id = %product.id,
            buyer = %buyer.id,
            amount = %product.price,
            "Created pending order"
        );

        let request = CheckoutSessionRequest {
            amount: product.price,
            currency: MARKET_CURRENCY.to_string(),
            email: buyer.email.clone(),
            tx_ref: order.id.clone(),
            callback_url: format!("{}/api/paychangu-webhook", self.app_url),
            return_url: format!("{}/dashboard/buyer", self.app_url),
            title: product.title.clone(),
            description: format!("Purchase of {}", product.title),
            meta: json!({
                "order_id": order.id,
                "product_id": product.id,
                "user_id": buyer.id,
            }),
        };

        let session = match self.gateway.create_checkout(&request).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "Gateway checkout failed, cancelling order");
                if let Err(cancel) = self.market.settle_order(&order.id, Settlement::Failed).await {
                    tracing::error!(order_id = %order.id, error = %cancel, "Failed to cancel order");
                }
                return Err(e);
            }
        };

        Ok(CheckoutReceipt {
            order_id: order.id,
            payment_id: payment.id,
            payment_url: session.checkout_url,
            amount: product.price,
            currency: MARKET_CURRENCY.to_string(),
            test_mode: session.test_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{CheckoutSession, TestModeGateway};
    use async_trait::async_trait;
    use market_core::{MemoryStore, OrderStatus, Product, ProductStatus, Role, SettleOutcome};
    use rust_decimal_macros::dec;

    struct FailingGateway;

    #[async_trait]
    impl PaymentGateway for FailingGateway {
        async fn create_checkout(&self, _: &CheckoutSessionRequest) -> Result<CheckoutSession> {
            Err(PaymentError::Upstream {
                status: 400,
                body: json!({"message": "Invalid currency"}),
            })
        }

        fn is_live(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    async fn setup(status: ProductStatus) -> (Arc<MemoryStore>, User, Product) {
        let store = Arc::new(MemoryStore::new());
        let buyer = User::new("buyer@example.com", Role::Buyer);
        store.save_user(&buyer).await.unwrap();
        let mut product = Product::new("seller_1", "Sample pack", dec!(12.50), "https://files/pack.zip");
        product.status = status;
        store.save_product(&product).await.unwrap();
        (store, buyer, product)
    }

    fn service(store: &Arc<MemoryStore>, gateway: Arc<dyn PaymentGateway>) -> CheckoutService {
        CheckoutService::new(
            store.clone(),
            gateway,
            "https://market.example.com/",
            &DownloadPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_checkout_creates_pending_order() {
        let (store, buyer, product) = setup(ProductStatus::Live).await;
        let receipt = service(&store, Arc::new(TestModeGateway::default()))
            .start(&buyer, &product.id)
            .await
            .unwrap();

        assert!(receipt.test_mode);
        assert_eq!(receipt.amount, dec!(12.50));
        assert_eq!(receipt.currency, "USD");
        assert!(receipt.payment_url.ends_with(&receipt.order_id));

        let order = store.get_order(&receipt.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.expires_at.is_some());
        let payment = store.get_payment_for_order(&order.id).await.unwrap().unwrap();
        assert_eq!(payment.id, receipt.payment_id);
    }

    #[tokio::test]
    async fn test_checkout_requires_live_product() {
        let (store, buyer, product) = setup(ProductStatus::Approved).await;
        let err = service(&store, Arc::new(TestModeGateway::default()))
            .start(&buyer, &product.id)
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Product not available for purchase");

        let err = service(&store, Arc::new(TestModeGateway::default()))
            .start(&buyer, "prd_missing")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_checkout_rejects_owned_product() {
        let (store, buyer, product) = setup(ProductStatus::Live).await;
        let checkout = service(&store, Arc::new(TestModeGateway::default()));
        let receipt = checkout.start(&buyer, &product.id).await.unwrap();
        let settled = store
            .settle_order(&receipt.order_id, Settlement::Paid { transaction_id: None })
            .await
            .unwrap();
        assert!(matches!(settled, SettleOutcome::Applied { .. }));

        let err = checkout.start(&buyer, &product.id).await.unwrap_err();
        assert_eq!(err.user_message(), "You already own this product");
    }

    #[tokio::test]
    async fn test_gateway_failure_cancels_order() {
        let (store, buyer, product) = setup(ProductStatus::Live).await;
        let err = service(&store, Arc::new(FailingGateway))
            .start(&buyer, &product.id)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Upstream { status: 400, .. }));

        let orders = store.list_orders_for_user(&buyer.id).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Cancelled);
    }
}
