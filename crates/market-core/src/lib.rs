//! # market-core
//!
//! Domain models, storage and access rules for a digital-goods marketplace
//! with a "buy me a coffee" donation feature.
//!
//! ## Order lifecycle
//!
//! ```text
//!   checkout                webhook (verified)
//! ┌──────────┐  success  ┌────────┐
//! │ PENDING  │──────────▶│  PAID  │──▶ downloads (max 5, 30 days)
//! │          │  failure  ├────────┴──┐
//! │          │──────────▶│ CANCELLED │
//! └──────────┘           └───────────┘
//! ```
//!
//! Order, payment and analytics rows move together in one atomic store
//! operation, and only out of PENDING, so a redelivered webhook is a no-op.
//!
//! ## Storage
//!
//! - [`store::MemoryStore`] - single-lock in-memory tables (development, tests)
//! - `store::PgStore` - Postgres via sqlx (feature `postgres`)

pub mod download;
pub mod error;
pub mod model;
pub mod signing;
pub mod store;
pub mod upload;

pub use download::{DownloadDenied, DownloadGrant, DownloadPolicy, MAX_DOWNLOADS};
pub use error::{CoreError, Result};
pub use model::{
    Analytics, CoffeeLink, CoffeePayment, CoffeePaymentStatus, Order, OrderStatus, Payment,
    PaymentStatus, Product, ProductStatus, Role, User,
};
pub use signing::UrlSigner;
pub use store::{
    DonationOutcome, DonationStore, DownloadOutcome, MarketStore, MemoryStore, ProductFilter,
    SettleOutcome, Settlement,
};
pub use upload::{UploadRequest, UploadTarget};
