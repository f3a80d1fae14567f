//! Buy Me a Coffee
//!
//! Creators share a `coffee-xxxxxxxx` link; supporters donate through the
//! hosted checkout. Donations are tracked separately from marketplace
//! orders and are joined to the creator only through the link slug.

use chrono::Utc;
use market_core::{
    CoffeeLink, CoffeePayment, CoffeePaymentStatus, CoreError, DonationStore,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::error::{PaymentError, Result};
use crate::gateway::{CheckoutSessionRequest, PaymentGateway};

/// Currency used when the donor does not pick one
pub const DEFAULT_DONATION_CURRENCY: &str = "MWK";

/// Donations shown on the creator dashboard
pub const RECENT_DONATIONS: usize = 10;

const SLUG_ATTEMPTS: usize = 3;

/// Same-millisecond donations to one link bump the timestamp
const REFERENCE_ATTEMPTS: i64 = 5;

/// Donation form submission
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationRequest {
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
    pub coffee_link_id: Option<String>,
    pub creator_name: Option<String>,
    pub donor_name: Option<String>,
}

/// Where to send the donor next
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationCheckout {
    pub checkout_url: String,
    /// Key for `payment-status` lookups
    pub reference: String,
    pub test_mode: bool,
}

/// Donation service
pub struct DonationService {
    donations: Arc<dyn DonationStore>,
    gateway: Arc<dyn PaymentGateway>,
    app_url: String,
}

impl DonationService {
    pub fn new(
        donations: Arc<dyn DonationStore>,
        gateway: Arc<dyn PaymentGateway>,
        app_url: &str,
    ) -> Self {
        Self {
            donations,
            gateway,
            app_url: app_url.trim_end_matches('/').to_string(),
        }
    }

    /// Record a pending donation and open a hosted checkout for it
    pub async fn create_payment(&self, request: DonationRequest) -> Result<DonationCheckout> {
        let amount = request.amount.filter(|a| *a > Decimal::ZERO);
        let email = request
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());
        let (Some(amount), Some(email)) = (amount, email) else {
            return Err(PaymentError::Validation("Amount and email are required".into()));
        };
        let slug = request
            .coffee_link_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PaymentError::Validation("Coffee link is required".into()))?;

        let link = self
            .donations
            .get_coffee_link_by_slug(slug)
            .await?
            .filter(|l| l.is_active)
            .ok_or_else(|| PaymentError::NotFound("Coffee link not found".into()))?;

        let currency = request
            .currency
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_DONATION_CURRENCY)
            .to_uppercase();
        let mut payment = CoffeePayment::pending("", &link.coffee_link, amount, &currency, email);
        payment.donor_name = request.donor_name.clone().filter(|n| !n.is_empty());
        payment.donor_message = request.message.clone().filter(|m| !m.is_empty());
        let tx_ref = self
            .insert_pending(payment, Utc::now().timestamp_millis())
            .await?;

        tracing::info!(
            reference = %tx_ref,
            coffee_link = %link.coffee_link,
            amount = %amount,
            currency = %currency,
            "Creating donation payment"
        );

        let session_request = CheckoutSessionRequest {
            amount,
            currency,
            email: email.to_string(),
            tx_ref: tx_ref.clone(),
            callback_url: format!("{}/api/paychangu-webhook", self.app_url),
            return_url: format!("{}/payment/success?reference={tx_ref}", self.app_url),
            title: "Buy Me Coffee".into(),
            description: "Support the creator's work".into(),
            meta: json!({
                "coffee_link_id": link.coffee_link,
                "creator_name": request.creator_name,
                "donor_message": request.message,
                "type": "coffee_donation",
            }),
        };

        let session = match self.gateway.create_checkout(&session_request).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(reference = %tx_ref, error = %e, "Donation checkout failed");
                if let Err(mark) = self
                    .donations
                    .settle_coffee_payment(&tx_ref, CoffeePaymentStatus::Failed, None)
                    .await
                {
                    tracing::error!(reference = %tx_ref, error = %mark, "Failed to mark donation failed");
                }
                return Err(e);
            }
        };

        if session.reference != tx_ref {
            tracing::debug!(reference = %tx_ref, gateway_reference = %session.reference, "Gateway assigned its own reference");
        }

        Ok(DonationCheckout {
            checkout_url: session.checkout_url,
            reference: tx_ref,
            test_mode: session.test_mode,
        })
    }

    /// Insert under `coffee-<slug>-<millis>`, moving to the next
    /// millisecond when the reference is taken
    async fn insert_pending(&self, mut payment: CoffeePayment, millis: i64) -> Result<String> {
        for offset in 0..REFERENCE_ATTEMPTS {
            payment.payment_reference =
                format!("coffee-{}-{}", payment.coffee_link_id, millis + offset);
            match self.donations.insert_coffee_payment(&payment).await {
                Ok(()) => return Ok(payment.payment_reference),
                Err(CoreError::Conflict(_)) => {
                    tracing::debug!(reference = %payment.payment_reference, "Donation reference taken");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(PaymentError::Store(CoreError::Conflict(
            "Could not allocate a donation reference".into(),
        )))
    }

    pub async fn payment_status(&self, reference: &str) -> Result<CoffeePayment> {
        self.donations
            .get_coffee_payment(reference)
            .await?
            .ok_or_else(|| PaymentError::NotFound("Payment not found".into()))
    }

    /// Create the creator's link, or give the existing one a fresh slug
    pub async fn generate_link(&self, user_id: &str) -> Result<CoffeeLink> {
        let mut link = match self.donations.get_coffee_link_for_user(user_id).await? {
            Some(mut existing) => {
                existing.regenerate();
                existing
            }
            None => CoffeeLink::new(user_id),
        };

        for attempt in 1..=SLUG_ATTEMPTS {
            match self.donations.save_coffee_link(&link).await {
                Ok(()) => {
                    tracing::info!(user_id = %user_id, slug = %link.coffee_link, "Coffee link generated");
                    return Ok(link);
                }
                Err(CoreError::Conflict(_)) if attempt < SLUG_ATTEMPTS => link.regenerate(),
                Err(e) => return Err(e.into()),
            }
        }
        Err(PaymentError::Store(CoreError::Conflict(
            "could not allocate a unique coffee link".into(),
        )))
    }

    pub async fn link_for_user(&self, user_id: &str) -> Result<CoffeeLink> {
        self.donations
            .get_coffee_link_for_user(user_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound("Coffee link not found".into()))
    }

    /// Active link by slug, for the public donation page
    pub async fn public_link(&self, slug: &str) -> Result<CoffeeLink> {
        self.donations
            .get_coffee_link_by_slug(slug)
            .await?
            .filter(|l| l.is_active)
            .ok_or_else(|| PaymentError::NotFound("Coffee link not found".into()))
    }

    /// The creator's newest donations; empty without a link
    pub async fn recent_payments(&self, user_id: &str) -> Result<Vec<CoffeePayment>> {
        let Some(link) = self.donations.get_coffee_link_for_user(user_id).await? else {
            return Ok(Vec::new());
        };
        Ok(self
            .donations
            .list_coffee_payments(&[link.coffee_link], RECENT_DONATIONS)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::TestModeGateway;
    use market_core::MemoryStore;
    use rust_decimal_macros::dec;

    fn service(store: &Arc<MemoryStore>) -> DonationService {
        DonationService::new(
            store.clone(),
            Arc::new(TestModeGateway::default()),
            "http://localhost:3000",
        )
    }

    fn request(slug: &str) -> DonationRequest {
        DonationRequest {
            amount: Some(dec!(1000)),
            email: Some("fan@example.com".into()),
            message: Some("Thanks!".into()),
            coffee_link_id: Some(slug.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_generate_and_regenerate_link() {
        let store = Arc::new(MemoryStore::new());
        let donations = service(&store);

        let first = donations.generate_link("user_1").await.unwrap();
        assert!(first.coffee_link.starts_with("coffee-"));
        assert_eq!(first.coffee_link.len(), "coffee-".len() + 8);

        let second = donations.generate_link("user_1").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_ne!(first.coffee_link, second.coffee_link);

        assert!(donations.public_link(&first.coffee_link).await.is_err());
        assert_eq!(donations.public_link(&second.coffee_link).await.unwrap().id, first.id);
    }

    #[tokio::test]
    async fn test_create_payment_records_pending_donation() {
        let store = Arc::new(MemoryStore::new());
        let donations = service(&store);
        let link = donations.generate_link("creator_1").await.unwrap();

        let checkout = donations.create_payment(request(&link.coffee_link)).await.unwrap();
        assert!(checkout.test_mode);
        assert!(checkout.reference.starts_with(&format!("coffee-{}-", link.coffee_link)));
        assert!(checkout.checkout_url.ends_with(&checkout.reference));

        let payment = donations.payment_status(&checkout.reference).await.unwrap();
        assert_eq!(payment.status, CoffeePaymentStatus::Pending);
        assert_eq!(payment.currency, "MWK");
        assert_eq!(payment.amount, dec!(1000));
        assert_eq!(payment.donor_message.as_deref(), Some("Thanks!"));

        let recent = donations.recent_payments("creator_1").await.unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    async fn test_same_millisecond_donations_get_distinct_references() {
        let store = Arc::new(MemoryStore::new());
        let donations = service(&store);
        let pending = |email: &str| {
            CoffeePayment::pending("", "coffee-abcd1234", dec!(500), "MWK", email)
        };

        let first = donations
            .insert_pending(pending("a@example.com"), 1_700_000_000_000)
            .await
            .unwrap();
        let second = donations
            .insert_pending(pending("b@example.com"), 1_700_000_000_000)
            .await
            .unwrap();
        assert_eq!(first, "coffee-abcd1234-1700000000000");
        assert_eq!(second, "coffee-abcd1234-1700000000001");

        let stored = donations.payment_status(&second).await.unwrap();
        assert_eq!(stored.donor_email, "b@example.com");
    }

    #[tokio::test]
    async fn test_create_payment_validation() {
        let store = Arc::new(MemoryStore::new());
        let donations = service(&store);

        let missing_email = DonationRequest {
            email: Some("  ".into()),
            ..request("coffee-aaaaaaaa")
        };
        let err = donations.create_payment(missing_email).await.unwrap_err();
        assert_eq!(err.user_message(), "Amount and email are required");

        let zero = DonationRequest {
            amount: Some(Decimal::ZERO),
            ..request("coffee-aaaaaaaa")
        };
        assert!(matches!(
            donations.create_payment(zero).await.unwrap_err(),
            PaymentError::Validation(_)
        ));

        let no_link = DonationRequest {
            coffee_link_id: None,
            ..request("")
        };
        assert!(matches!(
            donations.create_payment(no_link).await.unwrap_err(),
            PaymentError::Validation(_)
        ));

        let unknown = donations.create_payment(request("coffee-zzzzzzzz")).await.unwrap_err();
        assert!(matches!(unknown, PaymentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_reference_and_empty_history() {
        let store = Arc::new(MemoryStore::new());
        let donations = service(&store);
        assert!(matches!(
            donations.payment_status("coffee-nope").await.unwrap_err(),
            PaymentError::NotFound(_)
        ));
        assert!(donations.recent_payments("nobody").await.unwrap().is_empty());
        assert!(donations.link_for_user("nobody").await.is_err());
    }
}
