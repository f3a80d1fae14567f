//! Download Access Gate
//!
//! A buyer may fetch a product file only while a PAID order exists, the
//! order's download window is open and its download counter is under the
//! ceiling. The store applies [`DownloadPolicy::check`] and the counter
//! increment as one atomic step (see [`crate::store::MarketStore::consume_download`]).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Order, OrderStatus, Product};

/// Default download ceiling per order
pub const MAX_DOWNLOADS: u32 = 5;

/// Default download window after checkout
pub const DOWNLOAD_EXPIRY_DAYS: i64 = 30;

/// Why a download was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DownloadDenied {
    NotOwned,
    Expired,
    LimitExceeded,
}

impl DownloadDenied {
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotOwned => "You don't own this product or payment is not completed",
            Self::Expired => "Download link has expired",
            Self::LimitExceeded => "Download limit exceeded",
        }
    }
}

impl std::fmt::Display for DownloadDenied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Download limits
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DownloadPolicy {
    pub max_downloads: u32,
    pub expiry_days: i64,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            max_downloads: MAX_DOWNLOADS,
            expiry_days: DOWNLOAD_EXPIRY_DAYS,
        }
    }
}

impl DownloadPolicy {
    /// Check whether `order` may be downloaded at `now`.
    ///
    /// Expiry is checked before quota, so an expired order reports
    /// [`DownloadDenied::Expired`] even when it also ran out of downloads.
    pub fn check(&self, order: &Order, now: DateTime<Utc>) -> Result<(), DownloadDenied> {
        if order.status != OrderStatus::Paid {
            return Err(DownloadDenied::NotOwned);
        }
        if order.is_expired(now) {
            return Err(DownloadDenied::Expired);
        }
        if order.download_count >= self.max_downloads {
            return Err(DownloadDenied::LimitExceeded);
        }
        Ok(())
    }

    /// Downloads left after the counter reached `download_count`
    pub const fn remaining(&self, download_count: u32) -> u32 {
        self.max_downloads.saturating_sub(download_count)
    }
}

/// A granted download: the order after its counter was incremented
#[derive(Clone, Debug)]
pub struct DownloadGrant {
    pub order: Order,
    pub product: Product,
    pub remaining: u32,
}
