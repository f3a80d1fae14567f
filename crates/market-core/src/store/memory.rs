//! In-memory store (for development and tests)
//!
//! All tables live behind one lock, so each trait method is atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{
    DonationOutcome, DonationStore, DownloadOutcome, MarketStore, ProductFilter, SettleOutcome,
    Settlement,
};
use crate::download::{DownloadDenied, DownloadGrant, DownloadPolicy};
use crate::error::{CoreError, Result};
use crate::model::{
    Analytics, CoffeeLink, CoffeePayment, CoffeePaymentStatus, Order, OrderStatus, Payment,
    PaymentStatus, Product, ProductStatus, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    products: HashMap<String, Product>,
    orders: HashMap<String, Order>,
    /// Keyed by order id
    payments: HashMap<String, Payment>,
    analytics: HashMap<String, Analytics>,
    coffee_links: HashMap<String, CoffeeLink>,
    coffee_payments: HashMap<String, CoffeePayment>,
}

/// In-memory implementation of both store traits
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn save_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        let email_taken = tables
            .users
            .values()
            .any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email));
        if email_taken {
            return Err(CoreError::Conflict(format!("email {} already registered", user.email)));
        }
        tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.products.insert(product.id.clone(), product.clone());
        Ok(())
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(id).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        let mut products: Vec<Product> = tables
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    async fn transition_product(&self, id: &str, next: ProductStatus) -> Result<Product> {
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .get_mut(id)
            .ok_or_else(|| CoreError::NotFound(format!("product {id}")))?;

        if !product.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition(format!(
                "product {id} is {} and cannot become {next}",
                product.status
            )));
        }
        product.status = next;
        Ok(product.clone())
    }

    async fn create_order(&self, order: &Order, payment: &Payment) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.orders.contains_key(&order.id) {
            return Err(CoreError::Conflict(format!("order {} already exists", order.id)));
        }
        tables.orders.insert(order.id.clone(), order.clone());
        tables.payments.insert(order.id.clone(), payment.clone());
        Ok(())
    }

    async fn get_order(&self, id: &str) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(id).cloned())
    }

    async fn get_payment_for_order(&self, order_id: &str) -> Result<Option<Payment>> {
        Ok(self.tables.read().await.payments.get(order_id).cloned())
    }

    async fn find_paid_order(&self, user_id: &str, product_id: &str) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(newest_paid_order(&tables, user_id, product_id).cloned())
    }

    async fn list_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn settle_order(&self, order_id: &str, settlement: Settlement) -> Result<SettleOutcome> {
        let mut tables = self.tables.write().await;
        let Tables {
            orders,
            payments,
            analytics,
            ..
        } = &mut *tables;

        let Some(order) = orders.get_mut(order_id) else {
            return Ok(SettleOutcome::NotFound);
        };
        if order.status != OrderStatus::Pending {
            return Ok(SettleOutcome::AlreadySettled(order.status));
        }
        let payment = payments
            .get_mut(order_id)
            .ok_or_else(|| CoreError::Storage(format!("order {order_id} has no payment row")))?;

        order.status = settlement.order_status();
        match settlement {
            Settlement::Paid { transaction_id } => {
                payment.status = PaymentStatus::Success;
                if transaction_id.is_some() {
                    payment.transaction_id = transaction_id;
                }
                analytics
                    .entry(order.product_id.clone())
                    .or_insert_with(|| Analytics::empty(order.product_id.clone()))
                    .record_sale(payment.amount);
            }
            Settlement::Failed => {
                payment.status = PaymentStatus::Failed;
            }
        }

        Ok(SettleOutcome::Applied {
            order: order.clone(),
            payment: payment.clone(),
        })
    }

    async fn consume_download(
        &self,
        user_id: &str,
        product_id: &str,
        policy: &DownloadPolicy,
        now: DateTime<Utc>,
    ) -> Result<DownloadOutcome> {
        let mut tables = self.tables.write().await;

        let Some(order_id) = newest_paid_order(&tables, user_id, product_id).map(|o| o.id.clone())
        else {
            return Ok(DownloadOutcome::Denied(DownloadDenied::NotOwned));
        };
        let product = tables
            .products
            .get(product_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("product {product_id}")))?;
        let order = tables
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| CoreError::Storage(format!("order {order_id} vanished")))?;

        if let Err(denied) = policy.check(order, now) {
            return Ok(DownloadOutcome::Denied(denied));
        }
        order.download_count += 1;

        Ok(DownloadOutcome::Granted(DownloadGrant {
            remaining: policy.remaining(order.download_count),
            order: order.clone(),
            product,
        }))
    }

    async fn get_analytics(&self, product_id: &str) -> Result<Analytics> {
        let tables = self.tables.read().await;
        Ok(tables
            .analytics
            .get(product_id)
            .cloned()
            .unwrap_or_else(|| Analytics::empty(product_id)))
    }

    async fn record_view(&self, product_id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .analytics
            .entry(product_id.to_string())
            .or_insert_with(|| Analytics::empty(product_id))
            .views += 1;
        Ok(())
    }
}

#[async_trait]
impl DonationStore for MemoryStore {
    async fn save_coffee_link(&self, link: &CoffeeLink) -> Result<()> {
        let mut tables = self.tables.write().await;
        let slug_taken = tables
            .coffee_links
            .values()
            .any(|l| l.id != link.id && l.coffee_link == link.coffee_link);
        if slug_taken {
            return Err(CoreError::Conflict(format!(
                "coffee link {} already taken",
                link.coffee_link
            )));
        }
        tables.coffee_links.insert(link.id.clone(), link.clone());
        Ok(())
    }

    async fn get_coffee_link_for_user(&self, user_id: &str) -> Result<Option<CoffeeLink>> {
        let tables = self.tables.read().await;
        Ok(tables
            .coffee_links
            .values()
            .find(|l| l.user_id == user_id)
            .cloned())
    }

    async fn get_coffee_link_by_slug(&self, slug: &str) -> Result<Option<CoffeeLink>> {
        let tables = self.tables.read().await;
        Ok(tables
            .coffee_links
            .values()
            .find(|l| l.coffee_link == slug)
            .cloned())
    }

    async fn insert_coffee_payment(&self, payment: &CoffeePayment) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.coffee_payments.contains_key(&payment.payment_reference) {
            return Err(CoreError::Conflict(format!(
                "payment reference {} already recorded",
                payment.payment_reference
            )));
        }
        tables
            .coffee_payments
            .insert(payment.payment_reference.clone(), payment.clone());
        Ok(())
    }

    async fn get_coffee_payment(&self, reference: &str) -> Result<Option<CoffeePayment>> {
        Ok(self.tables.read().await.coffee_payments.get(reference).cloned())
    }

    async fn settle_coffee_payment(
        &self,
        reference: &str,
        status: CoffeePaymentStatus,
        donor_email: Option<&str>,
    ) -> Result<DonationOutcome> {
        let mut tables = self.tables.write().await;
        let Some(payment) = tables.coffee_payments.get_mut(reference) else {
            return Ok(DonationOutcome::NotFound);
        };
        if payment.status != CoffeePaymentStatus::Pending {
            return Ok(DonationOutcome::AlreadySettled(payment.status));
        }

        payment.status = status;
        if let Some(email) = donor_email.filter(|_| payment.donor_email.is_empty()) {
            payment.donor_email = email.to_string();
        }
        payment.updated_at = Utc::now();
        Ok(DonationOutcome::Applied(payment.clone()))
    }

    async fn list_coffee_payments(
        &self,
        slugs: &[String],
        limit: usize,
    ) -> Result<Vec<CoffeePayment>> {
        let tables = self.tables.read().await;
        let mut payments: Vec<CoffeePayment> = tables
            .coffee_payments
            .values()
            .filter(|p| slugs.contains(&p.coffee_link_id))
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        payments.truncate(limit);
        Ok(payments)
    }
}

fn newest_paid_order<'a>(tables: &'a Tables, user_id: &str, product_id: &str) -> Option<&'a Order> {
    tables
        .orders
        .values()
        .filter(|o| o.user_id == user_id && o.product_id == product_id)
        .filter(|o| o.status == OrderStatus::Paid)
        .max_by_key(|o| o.created_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::MAX_DOWNLOADS;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    async fn seeded() -> (MemoryStore, User, Product, Order) {
        let store = MemoryStore::new();
        let buyer = User::new("buyer@example.com", crate::model::Role::Buyer);
        store.save_user(&buyer).await.unwrap();

        let mut product = Product::new("usr_seller", "Beat pack", dec!(10), "https://files/x.zip");
        product.status = ProductStatus::Live;
        store.save_product(&product).await.unwrap();

        let order = Order::new(&buyer.id, &product.id, 30);
        let payment = Payment::for_order(&order, product.price, "USD");
        store.create_order(&order, &payment).await.unwrap();
        (store, buyer, product, order)
    }

    #[tokio::test]
    async fn test_settle_paid_is_idempotent() {
        let (store, _, product, order) = seeded().await;

        let paid = Settlement::Paid {
            transaction_id: Some("tx_1".into()),
        };
        let first = store.settle_order(&order.id, paid.clone()).await.unwrap();
        assert!(matches!(first, SettleOutcome::Applied { .. }));

        let second = store.settle_order(&order.id, paid).await.unwrap();
        assert!(matches!(second, SettleOutcome::AlreadySettled(OrderStatus::Paid)));

        let payment = store.get_payment_for_order(&order.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.transaction_id.as_deref(), Some("tx_1"));

        let analytics = store.get_analytics(&product.id).await.unwrap();
        assert_eq!(analytics.sales_count, 1);
        assert_eq!(analytics.revenue, dec!(10));
    }

    #[tokio::test]
    async fn test_settle_failed_cancels() {
        let (store, _, product, order) = seeded().await;

        store.settle_order(&order.id, Settlement::Failed).await.unwrap();

        let order = store.get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        let payment = store.get_payment_for_order(&order.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(store.get_analytics(&product.id).await.unwrap().sales_count, 0);

        // A late success cannot revive a cancelled order
        let late = store
            .settle_order(&order.id, Settlement::Paid { transaction_id: None })
            .await
            .unwrap();
        assert!(matches!(late, SettleOutcome::AlreadySettled(OrderStatus::Cancelled)));
    }

    #[tokio::test]
    async fn test_settle_unknown_order() {
        let store = MemoryStore::new();
        let outcome = store.settle_order("ord_missing", Settlement::Failed).await.unwrap();
        assert!(matches!(outcome, SettleOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_download_ceiling() {
        let (store, buyer, product, order) = seeded().await;
        let policy = DownloadPolicy::default();

        let denied = store
            .consume_download(&buyer.id, &product.id, &policy, Utc::now())
            .await
            .unwrap();
        assert!(matches!(denied, DownloadOutcome::Denied(DownloadDenied::NotOwned)));

        store
            .settle_order(&order.id, Settlement::Paid { transaction_id: None })
            .await
            .unwrap();

        for expected_remaining in (0..MAX_DOWNLOADS).rev() {
            let outcome = store
                .consume_download(&buyer.id, &product.id, &policy, Utc::now())
                .await
                .unwrap();
            match outcome {
                DownloadOutcome::Granted(grant) => assert_eq!(grant.remaining, expected_remaining),
                DownloadOutcome::Denied(d) => panic!("unexpected denial: {d}"),
            }
        }

        let outcome = store
            .consume_download(&buyer.id, &product.id, &policy, Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, DownloadOutcome::Denied(DownloadDenied::LimitExceeded)));

        let order = store.get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(order.download_count, MAX_DOWNLOADS);
    }

    #[tokio::test]
    async fn test_download_expired() {
        let (store, buyer, product, order) = seeded().await;
        store
            .settle_order(&order.id, Settlement::Paid { transaction_id: None })
            .await
            .unwrap();

        let later = Utc::now() + Duration::days(31);
        let outcome = store
            .consume_download(&buyer.id, &product.id, &DownloadPolicy::default(), later)
            .await
            .unwrap();
        assert!(matches!(outcome, DownloadOutcome::Denied(DownloadDenied::Expired)));
    }

    #[tokio::test]
    async fn test_product_transitions() {
        let (store, _, _, _) = seeded().await;
        let product = Product::new("usr_seller", "Preset", dec!(5), "https://files/p.zip");
        store.save_product(&product).await.unwrap();

        let approved = store
            .transition_product(&product.id, ProductStatus::Approved)
            .await
            .unwrap();
        assert_eq!(approved.status, ProductStatus::Approved);

        let err = store
            .transition_product(&product.id, ProductStatus::Rejected)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition(_)));

        let live = store.list_products(&ProductFilter::live()).await.unwrap();
        assert_eq!(live.len(), 1);
    }

    #[tokio::test]
    async fn test_coffee_payment_settlement() {
        let store = MemoryStore::new();
        let link = CoffeeLink::new("usr_creator");
        store.save_coffee_link(&link).await.unwrap();

        let payment = CoffeePayment::pending("coffee-ref-1", &link.coffee_link, dec!(5), "MWK", "");
        store.insert_coffee_payment(&payment).await.unwrap();
        assert!(store.insert_coffee_payment(&payment).await.is_err());

        let outcome = store
            .settle_coffee_payment("coffee-ref-1", CoffeePaymentStatus::Completed, Some("fan@example.com"))
            .await
            .unwrap();
        let DonationOutcome::Applied(settled) = outcome else {
            panic!("expected applied");
        };
        assert_eq!(settled.donor_email, "fan@example.com");

        let again = store
            .settle_coffee_payment("coffee-ref-1", CoffeePaymentStatus::Failed, None)
            .await
            .unwrap();
        assert!(matches!(again, DonationOutcome::AlreadySettled(CoffeePaymentStatus::Completed)));

        let listed = store
            .list_coffee_payments(&[link.coffee_link.clone()], 10)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_slug_uniqueness() {
        let store = MemoryStore::new();
        let first = CoffeeLink::new("usr_a");
        store.save_coffee_link(&first).await.unwrap();

        let mut second = CoffeeLink::new("usr_b");
        second.coffee_link = first.coffee_link.clone();
        assert!(matches!(
            store.save_coffee_link(&second).await,
            Err(CoreError::Conflict(_))
        ));
    }
}
