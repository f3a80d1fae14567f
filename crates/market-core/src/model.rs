//! Domain Models
//!
//! Marketplace rows (users, products, orders, payments, analytics) and the
//! separate donation rows (coffee links, coffee payments).
//! Uses `rust_decimal` for all monetary values - never use f64 for money!

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Generate a prefixed identifier (e.g. `ord_3f2a...`)
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(CoreError::Validation(format!(
                        concat!("unknown ", stringify!($name), ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

// ============================================================================
// Users
// ============================================================================

/// Account role
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    Buyer,
    Seller,
    Admin,
}

string_enum!(Role {
    Buyer => "BUYER",
    Seller => "SELLER",
    Admin => "ADMIN",
});

impl Role {
    /// Sellers and admins may list and upload products
    pub const fn can_sell(self) -> bool {
        matches!(self, Self::Seller | Self::Admin)
    }
}

/// A registered user, resolved from the identity provider by email
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            id: new_id("usr"),
            email: email.into().to_lowercase(),
            name: None,
            role,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

// ============================================================================
// Products
// ============================================================================

/// Product review / publication status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Live,
}

string_enum!(ProductStatus {
    Pending => "PENDING",
    Approved => "APPROVED",
    Rejected => "REJECTED",
    Live => "LIVE",
});

impl ProductStatus {
    /// Review flow: PENDING -> APPROVED | REJECTED, APPROVED -> LIVE
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved | Self::Rejected) | (Self::Approved, Self::Live)
        )
    }
}

/// A digital product owned by a seller
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub seller_id: String,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub status: ProductStatus,
    pub file_url: String,
    pub trailer_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        seller_id: impl Into<String>,
        title: impl Into<String>,
        price: Decimal,
        file_url: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id("prd"),
            seller_id: seller_id.into(),
            title: title.into(),
            description: String::new(),
            price,
            status: ProductStatus::Pending,
            file_url: file_url.into(),
            trailer_url: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_live(&self) -> bool {
        self.status == ProductStatus::Live
    }
}

// ============================================================================
// Orders & payments
// ============================================================================

/// Order lifecycle. PAID and CANCELLED are terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Cancelled,
}

string_enum!(OrderStatus {
    Pending => "PENDING",
    Paid => "PAID",
    Cancelled => "CANCELLED",
});

impl OrderStatus {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!((self, next), (Self::Pending, Self::Paid | Self::Cancelled))
    }
}

/// A buyer's intent to acquire one product
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    pub status: OrderStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub download_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// New pending order whose downloads expire `expiry_days` from now
    pub fn new(user_id: impl Into<String>, product_id: impl Into<String>, expiry_days: i64) -> Self {
        let now = Utc::now();
        Self {
            id: new_id("ord"),
            user_id: user_id.into(),
            product_id: product_id.into(),
            status: OrderStatus::Pending,
            expires_at: Some(now + Duration::days(expiry_days)),
            download_count: 0,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires < now)
    }
}

/// Payment status, transitions together with the order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

string_enum!(PaymentStatus {
    Pending => "PENDING",
    Success => "SUCCESS",
    Failed => "FAILED",
});

/// The monetary record attached 1:1 to an order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub currency: String,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn for_order(order: &Order, amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            id: new_id("pay"),
            order_id: order.id.clone(),
            status: PaymentStatus::Pending,
            amount,
            currency: currency.into(),
            transaction_id: None,
            created_at: Utc::now(),
        }
    }
}

/// Per-product sales counters
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub product_id: String,
    pub sales_count: u64,
    pub revenue: Decimal,
    pub views: u64,
}

impl Analytics {
    pub fn empty(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            ..Self::default()
        }
    }

    pub fn record_sale(&mut self, amount: Decimal) {
        self.sales_count += 1;
        self.revenue += amount;
    }
}

// ============================================================================
// Donations
// ============================================================================

/// A creator's shareable donation slug
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoffeeLink {
    pub id: String,
    pub user_id: String,
    pub coffee_link: String,
    pub title: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CoffeeLink {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id("cfl"),
            user_id: user_id.into(),
            coffee_link: Self::generate_slug(),
            title: "My Coffee Link".into(),
            description: "Support my work".into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// `coffee-` followed by 8 lowercase alphanumerics
    pub fn generate_slug() -> String {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        format!("coffee-{}", &hex[..8])
    }

    /// Replace the slug, invalidating the previously shared URL
    pub fn regenerate(&mut self) {
        self.coffee_link = Self::generate_slug();
        self.updated_at = Utc::now();
    }
}

/// Donation status (stored lowercase)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoffeePaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

string_enum!(CoffeePaymentStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
});

/// A donation, keyed by the gateway reference
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoffeePayment {
    pub payment_reference: String,
    /// Slug of the receiving [`CoffeeLink`]
    pub coffee_link_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub donor_email: String,
    pub donor_name: Option<String>,
    pub donor_message: Option<String>,
    pub status: CoffeePaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CoffeePayment {
    pub fn pending(
        reference: impl Into<String>,
        coffee_link_id: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
        donor_email: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            payment_reference: reference.into(),
            coffee_link_id: coffee_link_id.into(),
            amount,
            currency: currency.into(),
            donor_email: donor_email.into(),
            donor_name: None,
            donor_message: None,
            status: CoffeePaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Paid.is_terminal());
    }

    #[test]
    fn test_product_review_flow() {
        assert!(ProductStatus::Pending.can_transition_to(ProductStatus::Approved));
        assert!(ProductStatus::Approved.can_transition_to(ProductStatus::Live));
        assert!(!ProductStatus::Pending.can_transition_to(ProductStatus::Live));
        assert!(!ProductStatus::Rejected.can_transition_to(ProductStatus::Approved));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!("PAID".parse::<OrderStatus>().unwrap(), OrderStatus::Paid);
        assert_eq!(CoffeePaymentStatus::Completed.as_str(), "completed");
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Success).unwrap(),
            "\"SUCCESS\""
        );
        assert!("paid".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_expiry() {
        let order = Order::new("usr_1", "prd_1", 30);
        assert!(!order.is_expired(Utc::now()));
        assert!(order.is_expired(Utc::now() + Duration::days(31)));
    }

    #[test]
    fn test_slug_shape() {
        let slug = CoffeeLink::generate_slug();
        assert_eq!(slug.len(), "coffee-".len() + 8);
        assert!(slug.starts_with("coffee-"));
        assert!(slug[7..].chars().all(|c| c.is_ascii_alphanumeric() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_analytics_record_sale() {
        let mut analytics = Analytics::empty("prd_1");
        analytics.record_sale(dec!(10));
        analytics.record_sale(dec!(2.50));
        assert_eq!(analytics.sales_count, 2);
        assert_eq!(analytics.revenue, dec!(12.50));
    }
}
