//! Storage
//!
//! Two independent schemas sit behind two traits:
//!
//! - [`MarketStore`]: users, products, orders, payments, analytics
//! - [`DonationStore`]: coffee links and coffee payments
//!
//! The only link between them is the coffee-link slug string. Every
//! operation that touches several rows (checkout, settlement, download
//! accounting) is a single trait method so implementations can make it atomic.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::download::{DownloadDenied, DownloadGrant, DownloadPolicy};
use crate::error::Result;
use crate::model::{
    Analytics, CoffeeLink, CoffeePayment, CoffeePaymentStatus, Order, OrderStatus, Payment,
    Product, ProductStatus, User,
};

/// Product listing filter; `None` fields match everything
#[derive(Clone, Debug, Default)]
pub struct ProductFilter {
    pub status: Option<ProductStatus>,
    pub seller_id: Option<String>,
}

impl ProductFilter {
    pub fn live() -> Self {
        Self {
            status: Some(ProductStatus::Live),
            seller_id: None,
        }
    }

    pub fn by_seller(seller_id: impl Into<String>) -> Self {
        Self {
            status: None,
            seller_id: Some(seller_id.into()),
        }
    }

    pub fn with_status(status: ProductStatus) -> Self {
        Self {
            status: Some(status),
            seller_id: None,
        }
    }

    pub fn matches(&self, product: &Product) -> bool {
        self.status.is_none_or(|s| s == product.status)
            && self
                .seller_id
                .as_deref()
                .is_none_or(|id| id == product.seller_id)
    }
}

/// Gateway outcome to apply to a pending order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Settlement {
    /// Payment -> SUCCESS, order -> PAID, analytics += 1 sale
    Paid { transaction_id: Option<String> },
    /// Payment -> FAILED, order -> CANCELLED
    Failed,
}

impl Settlement {
    pub const fn order_status(&self) -> OrderStatus {
        match self {
            Self::Paid { .. } => OrderStatus::Paid,
            Self::Failed => OrderStatus::Cancelled,
        }
    }
}

/// Result of [`MarketStore::settle_order`]
#[derive(Clone, Debug)]
pub enum SettleOutcome {
    /// The order was PENDING and has been moved
    Applied { order: Order, payment: Payment },
    /// The order had already left PENDING; nothing was written
    AlreadySettled(OrderStatus),
    NotFound,
}

/// Result of [`MarketStore::consume_download`]
#[derive(Clone, Debug)]
pub enum DownloadOutcome {
    Granted(DownloadGrant),
    Denied(DownloadDenied),
}

/// Result of [`DonationStore::settle_coffee_payment`]
#[derive(Clone, Debug)]
pub enum DonationOutcome {
    Applied(CoffeePayment),
    AlreadySettled(CoffeePaymentStatus),
    NotFound,
}

/// Marketplace schema
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Insert or replace a user (matched by id)
    async fn save_user(&self, user: &User) -> Result<()>;

    async fn get_user(&self, id: &str) -> Result<Option<User>>;

    /// Case-insensitive lookup
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Insert or replace a product (matched by id)
    async fn save_product(&self, product: &Product) -> Result<()>;

    async fn get_product(&self, id: &str) -> Result<Option<Product>>;

    /// Newest first
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>>;

    /// Move a product along its review flow.
    ///
    /// Fails with `NotFound` for an unknown id and `InvalidTransition` when
    /// the current status does not allow `next`.
    async fn transition_product(&self, id: &str, next: ProductStatus) -> Result<Product>;

    /// Insert an order and its payment together
    async fn create_order(&self, order: &Order, payment: &Payment) -> Result<()>;

    async fn get_order(&self, id: &str) -> Result<Option<Order>>;

    async fn get_payment_for_order(&self, order_id: &str) -> Result<Option<Payment>>;

    async fn find_paid_order(&self, user_id: &str, product_id: &str) -> Result<Option<Order>>;

    /// Newest first
    async fn list_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>>;

    /// Apply a gateway outcome to a PENDING order, its payment and (on
    /// success) the product analytics, as one atomic step. Orders that are
    /// no longer PENDING are left untouched.
    async fn settle_order(&self, order_id: &str, settlement: Settlement) -> Result<SettleOutcome>;

    /// Check download access for the caller's newest PAID order of
    /// `product_id` and increment its counter in the same atomic step.
    async fn consume_download(
        &self,
        user_id: &str,
        product_id: &str,
        policy: &DownloadPolicy,
        now: DateTime<Utc>,
    ) -> Result<DownloadOutcome>;

    /// Zeroed counters when the product has no analytics row yet
    async fn get_analytics(&self, product_id: &str) -> Result<Analytics>;

    async fn record_view(&self, product_id: &str) -> Result<()>;
}

/// Donation schema
#[async_trait]
pub trait DonationStore: Send + Sync {
    /// Insert or replace a link (matched by id). Fails with `Conflict` when
    /// another link already uses the slug.
    async fn save_coffee_link(&self, link: &CoffeeLink) -> Result<()>;

    async fn get_coffee_link_for_user(&self, user_id: &str) -> Result<Option<CoffeeLink>>;

    async fn get_coffee_link_by_slug(&self, slug: &str) -> Result<Option<CoffeeLink>>;

    /// Fails with `Conflict` when the reference already exists
    async fn insert_coffee_payment(&self, payment: &CoffeePayment) -> Result<()>;

    async fn get_coffee_payment(&self, reference: &str) -> Result<Option<CoffeePayment>>;

    /// Move a pending donation to `status`, filling the donor email if it
    /// was blank. Donations no longer pending are left untouched.
    async fn settle_coffee_payment(
        &self,
        reference: &str,
        status: CoffeePaymentStatus,
        donor_email: Option<&str>,
    ) -> Result<DonationOutcome>;

    /// Newest first, at most `limit`
    async fn list_coffee_payments(&self, slugs: &[String], limit: usize)
    -> Result<Vec<CoffeePayment>>;
}
