//! Postgres store
//!
//! Multi-row operations run in one transaction; the order row is locked with
//! `FOR UPDATE` and every state change is guarded by `status = 'PENDING'`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;

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

const USER_COLUMNS: &str = "id, email, name, role, created_at";
const PRODUCT_COLUMNS: &str =
    "id, seller_id, title, description, price, status, file_url, trailer_url, created_at";
const ORDER_COLUMNS: &str =
    "id, user_id, product_id, status, expires_at, download_count, created_at";
const PAYMENT_COLUMNS: &str =
    "id, order_id, status, amount, currency, transaction_id, created_at";
const COFFEE_LINK_COLUMNS: &str =
    "id, user_id, coffee_link, title, description, is_active, created_at, updated_at";
const COFFEE_PAYMENT_COLUMNS: &str = "payment_reference, coffee_link_id, amount, currency, \
     donor_email, donor_name, donor_message, status, created_at, updated_at";

/// sqlx-backed implementation of both store traits
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and run the embedded migrations
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Postgres store ready");
        Ok(Self { pool })
    }

    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    name: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = CoreError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            email: row.email,
            name: row.name,
            role: row.role.parse()?,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: String,
    seller_id: String,
    title: String,
    description: String,
    price: Decimal,
    status: String,
    file_url: String,
    trailer_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = CoreError;

    fn try_from(row: ProductRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            seller_id: row.seller_id,
            title: row.title,
            description: row.description,
            price: row.price,
            status: row.status.parse()?,
            file_url: row.file_url,
            trailer_url: row.trailer_url,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    product_id: String,
    status: String,
    expires_at: Option<DateTime<Utc>>,
    download_count: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = CoreError;

    fn try_from(row: OrderRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            status: row.status.parse()?,
            expires_at: row.expires_at,
            download_count: u32::try_from(row.download_count)
                .map_err(|e| CoreError::Storage(format!("negative download count: {e}")))?,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    order_id: String,
    status: String,
    amount: Decimal,
    currency: String,
    transaction_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = CoreError;

    fn try_from(row: PaymentRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            status: row.status.parse()?,
            amount: row.amount,
            currency: row.currency,
            transaction_id: row.transaction_id,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct AnalyticsRow {
    product_id: String,
    sales_count: i64,
    revenue: Decimal,
    views: i64,
}

impl From<AnalyticsRow> for Analytics {
    fn from(row: AnalyticsRow) -> Self {
        Self {
            product_id: row.product_id,
            sales_count: row.sales_count.unsigned_abs(),
            revenue: row.revenue,
            views: row.views.unsigned_abs(),
        }
    }
}

#[derive(FromRow)]
struct CoffeeLinkRow {
    id: String,
    user_id: String,
    coffee_link: String,
    title: String,
    description: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CoffeeLinkRow> for CoffeeLink {
    fn from(row: CoffeeLinkRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            coffee_link: row.coffee_link,
            title: row.title,
            description: row.description,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CoffeePaymentRow {
    payment_reference: String,
    coffee_link_id: String,
    amount: Decimal,
    currency: String,
    donor_email: String,
    donor_name: Option<String>,
    donor_message: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CoffeePaymentRow> for CoffeePayment {
    type Error = CoreError;

    fn try_from(row: CoffeePaymentRow) -> Result<Self> {
        Ok(Self {
            payment_reference: row.payment_reference,
            coffee_link_id: row.coffee_link_id,
            amount: row.amount,
            currency: row.currency,
            donor_email: row.donor_email,
            donor_name: row.donor_name,
            donor_message: row.donor_message,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

// ============================================================================
// Marketplace
// ============================================================================

#[async_trait]
impl MarketStore for PgStore {
    async fn save_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, email, name, role, created_at) VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email, name = EXCLUDED.name, \
             role = EXCLUDED.role",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CoreError::Conflict(format!("email {} already registered", user.email))
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            "INSERT INTO products (id, seller_id, title, description, price, status, file_url, \
             trailer_url, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE SET title = EXCLUDED.title, \
             description = EXCLUDED.description, price = EXCLUDED.price, \
             status = EXCLUDED.status, file_url = EXCLUDED.file_url, \
             trailer_url = EXCLUDED.trailer_url",
        )
        .bind(&product.id)
        .bind(&product.seller_id)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.status.as_str())
        .bind(&product.file_url)
        .bind(&product.trailer_url)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE ($1::TEXT IS NULL OR status = $1) AND ($2::TEXT IS NULL OR seller_id = $2) \
             ORDER BY created_at DESC"
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(&filter.seller_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(TryInto::try_into)
        .collect()
    }

    async fn transition_product(&self, id: &str, next: ProductStatus) -> Result<Product> {
        let mut tx = self.pool.begin().await?;
        let current: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let mut product: Product = current
            .ok_or_else(|| CoreError::NotFound(format!("product {id}")))?
            .try_into()?;

        if !product.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition(format!(
                "product {id} is {} and cannot become {next}",
                product.status
            )));
        }

        sqlx::query("UPDATE products SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(next.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        product.status = next;
        Ok(product)
    }

    async fn create_order(&self, order: &Order, payment: &Payment) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO orders (id, user_id, product_id, status, expires_at, download_count, \
             created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(&order.product_id)
        .bind(order.status.as_str())
        .bind(order.expires_at)
        .bind(i32::try_from(order.download_count).unwrap_or(i32::MAX))
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO payments (id, order_id, status, amount, currency, transaction_id, \
             created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(payment.status.as_str())
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.transaction_id)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, id: &str) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn get_payment_for_order(&self, order_id: &str) -> Result<Option<Payment>> {
        sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    async fn find_paid_order(&self, user_id: &str, product_id: &str) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE user_id = $1 AND product_id = $2 AND status = 'PAID' \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    async fn list_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(TryInto::try_into)
        .collect()
    }

    async fn settle_order(&self, order_id: &str, settlement: Settlement) -> Result<SettleOutcome> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(locked) = locked else {
            return Ok(SettleOutcome::NotFound);
        };
        let current: Order = locked.try_into()?;
        if current.status != OrderStatus::Pending {
            return Ok(SettleOutcome::AlreadySettled(current.status));
        }

        let (payment_status, transaction_id) = match &settlement {
            Settlement::Paid { transaction_id } => (PaymentStatus::Success, transaction_id.clone()),
            Settlement::Failed => (PaymentStatus::Failed, None),
        };

        let payment: Payment = sqlx::query_as::<_, PaymentRow>(&format!(
            "UPDATE payments SET status = $2, transaction_id = COALESCE($3, transaction_id) \
             WHERE order_id = $1 AND status = 'PENDING' RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(order_id)
        .bind(payment_status.as_str())
        .bind(transaction_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CoreError::Storage(format!("order {order_id} has no pending payment")))?
        .try_into()?;

        let order: Order = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET status = $2 WHERE id = $1 AND status = 'PENDING' \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(settlement.order_status().as_str())
        .fetch_one(&mut *tx)
        .await?
        .try_into()?;

        if matches!(settlement, Settlement::Paid { .. }) {
            sqlx::query(
                "INSERT INTO analytics (product_id, sales_count, revenue, views) \
                 VALUES ($1, 1, $2, 0) ON CONFLICT (product_id) DO UPDATE SET \
                 sales_count = analytics.sales_count + 1, \
                 revenue = analytics.revenue + EXCLUDED.revenue",
            )
            .bind(&order.product_id)
            .bind(payment.amount)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(SettleOutcome::Applied { order, payment })
    }

    async fn consume_download(
        &self,
        user_id: &str,
        product_id: &str,
        policy: &DownloadPolicy,
        now: DateTime<Utc>,
    ) -> Result<DownloadOutcome> {
        let Some(current) = self.find_paid_order(user_id, product_id).await? else {
            return Ok(DownloadOutcome::Denied(DownloadDenied::NotOwned));
        };
        if let Err(denied) = policy.check(&current, now) {
            return Ok(DownloadOutcome::Denied(denied));
        }

        // Conditional increment: a concurrent download that consumed the last
        // slot makes this update match nothing.
        let updated: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders SET download_count = download_count + 1 \
             WHERE id = $1 AND status = 'PAID' AND download_count < $2 \
             AND (expires_at IS NULL OR expires_at >= $3) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(&current.id)
        .bind(i32::try_from(policy.max_downloads).unwrap_or(i32::MAX))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let Some(updated) = updated else {
            let denied = match self.get_order(&current.id).await? {
                Some(order) if order.is_expired(now) => DownloadDenied::Expired,
                Some(order) if order.status == OrderStatus::Paid => DownloadDenied::LimitExceeded,
                _ => DownloadDenied::NotOwned,
            };
            return Ok(DownloadOutcome::Denied(denied));
        };
        let order: Order = updated.try_into()?;

        let product = self
            .get_product(product_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("product {product_id}")))?;

        Ok(DownloadOutcome::Granted(DownloadGrant {
            remaining: policy.remaining(order.download_count),
            order,
            product,
        }))
    }

    async fn get_analytics(&self, product_id: &str) -> Result<Analytics> {
        let row: Option<AnalyticsRow> = sqlx::query_as(
            "SELECT product_id, sales_count, revenue, views FROM analytics WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map_or_else(|| Analytics::empty(product_id), Into::into))
    }

    async fn record_view(&self, product_id: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO analytics (product_id, sales_count, revenue, views) VALUES ($1, 0, 0, 1) \
             ON CONFLICT (product_id) DO UPDATE SET views = analytics.views + 1",
        )
        .bind(product_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ============================================================================
// Donations
// ============================================================================

#[async_trait]
impl DonationStore for PgStore {
    async fn save_coffee_link(&self, link: &CoffeeLink) -> Result<()> {
        sqlx::query(
            "INSERT INTO coffee_links (id, user_id, coffee_link, title, description, is_active, \
             created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET coffee_link = EXCLUDED.coffee_link, \
             title = EXCLUDED.title, description = EXCLUDED.description, \
             is_active = EXCLUDED.is_active, updated_at = EXCLUDED.updated_at",
        )
        .bind(&link.id)
        .bind(&link.user_id)
        .bind(&link.coffee_link)
        .bind(&link.title)
        .bind(&link.description)
        .bind(link.is_active)
        .bind(link.created_at)
        .bind(link.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CoreError::Conflict(format!("coffee link {} already taken", link.coffee_link))
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn get_coffee_link_for_user(&self, user_id: &str) -> Result<Option<CoffeeLink>> {
        let row: Option<CoffeeLinkRow> = sqlx::query_as(&format!(
            "SELECT {COFFEE_LINK_COLUMNS} FROM coffee_links WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn get_coffee_link_by_slug(&self, slug: &str) -> Result<Option<CoffeeLink>> {
        let row: Option<CoffeeLinkRow> = sqlx::query_as(&format!(
            "SELECT {COFFEE_LINK_COLUMNS} FROM coffee_links WHERE coffee_link = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn insert_coffee_payment(&self, payment: &CoffeePayment) -> Result<()> {
        sqlx::query(
            "INSERT INTO coffee_payments (payment_reference, coffee_link_id, amount, currency, \
             donor_email, donor_name, donor_message, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&payment.payment_reference)
        .bind(&payment.coffee_link_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.donor_email)
        .bind(&payment.donor_name)
        .bind(&payment.donor_message)
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CoreError::Conflict(format!(
                    "payment reference {} already recorded",
                    payment.payment_reference
                ))
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn get_coffee_payment(&self, reference: &str) -> Result<Option<CoffeePayment>> {
        sqlx::query_as::<_, CoffeePaymentRow>(&format!(
            "SELECT {COFFEE_PAYMENT_COLUMNS} FROM coffee_payments WHERE payment_reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    async fn settle_coffee_payment(
        &self,
        reference: &str,
        status: CoffeePaymentStatus,
        donor_email: Option<&str>,
    ) -> Result<DonationOutcome> {
        let updated: Option<CoffeePaymentRow> = sqlx::query_as(&format!(
            "UPDATE coffee_payments SET status = $2, \
             donor_email = CASE WHEN donor_email = '' THEN COALESCE($3, '') ELSE donor_email END, \
             updated_at = now() \
             WHERE payment_reference = $1 AND status = 'pending' \
             RETURNING {COFFEE_PAYMENT_COLUMNS}"
        ))
        .bind(reference)
        .bind(status.as_str())
        .bind(donor_email)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return Ok(DonationOutcome::Applied(row.try_into()?));
        }
        Ok(match self.get_coffee_payment(reference).await? {
            Some(existing) => DonationOutcome::AlreadySettled(existing.status),
            None => DonationOutcome::NotFound,
        })
    }

    async fn list_coffee_payments(
        &self,
        slugs: &[String],
        limit: usize,
    ) -> Result<Vec<CoffeePayment>> {
        sqlx::query_as::<_, CoffeePaymentRow>(&format!(
            "SELECT {COFFEE_PAYMENT_COLUMNS} FROM coffee_payments \
             WHERE coffee_link_id = ANY($1) ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(slugs.to_vec())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(TryInto::try_into)
        .collect()
    }
}
