//! Application State

use std::sync::Arc;

use market_core::{DonationStore, DownloadPolicy, MarketStore, UrlSigner, User};
use market_payments::{
    CheckoutService, DonationService, PaymentGateway, WebhookHandler, WebhookVerifier,
    select_gateway,
};

use crate::auth::{IdentityChain, IdentityProvider, StaticSessions, SupabaseIdentity};
use crate::config::{Config, DevSession};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Users, products, orders, payments, analytics
    pub market: Arc<dyn MarketStore>,

    /// Session token resolution
    pub identity: Arc<dyn IdentityProvider>,

    /// Live PayChangu or test mode
    pub gateway: Arc<dyn PaymentGateway>,

    pub checkout: Arc<CheckoutService>,
    pub donation_service: Arc<DonationService>,
    pub webhooks: Arc<WebhookHandler>,

    /// Signs download and trailer URLs
    pub signer: Arc<UrlSigner>,

    pub download_policy: DownloadPolicy,
    pub storage_base_url: Arc<str>,
}

impl AppState {
    /// Wire services over the given stores and identity provider
    pub fn new(
        config: &Config,
        market: Arc<dyn MarketStore>,
        donations: Arc<dyn DonationStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let gateway = select_gateway(
            config.paychangu_secret_key.as_deref(),
            &config.paychangu_api_url,
        );
        Self::with_gateway(config, market, donations, identity, gateway)
    }

    pub fn with_gateway(
        config: &Config,
        market: Arc<dyn MarketStore>,
        donations: Arc<dyn DonationStore>,
        identity: Arc<dyn IdentityProvider>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let signer = config
            .download_signing_secret
            .as_deref()
            .map_or_else(UrlSigner::ephemeral, UrlSigner::new);
        let verifier = WebhookVerifier::new(config.webhook_secret.as_deref());

        Self {
            checkout: Arc::new(CheckoutService::new(
                market.clone(),
                gateway.clone(),
                &config.app_url,
                &config.download_policy,
            )),
            donation_service: Arc::new(DonationService::new(
                donations.clone(),
                gateway.clone(),
                &config.app_url,
            )),
            webhooks: Arc::new(WebhookHandler::new(verifier, market.clone(), donations)),
            signer: Arc::new(signer),
            download_policy: config.download_policy,
            storage_base_url: Arc::from(config.storage_base_url.as_str()),
            market,
            identity,
            gateway,
        }
    }
}

/// Dev sessions first, then Supabase when configured
pub fn identity_from_config(config: &Config) -> Arc<dyn IdentityProvider> {
    let mut providers: Vec<Arc<dyn IdentityProvider>> = Vec::new();
    if !config.dev_sessions.is_empty() {
        providers.push(Arc::new(StaticSessions::new(&config.dev_sessions)));
    }
    if let Some(supabase) = &config.supabase {
        providers.push(Arc::new(SupabaseIdentity::new(supabase.clone())));
    }
    let chain = IdentityChain::new(providers);
    tracing::info!(providers = ?chain.names(), "Identity providers configured");
    Arc::new(chain)
}

/// Make sure every dev session has a user row with the configured role
pub async fn seed_dev_users(
    market: &dyn MarketStore,
    sessions: &[DevSession],
) -> market_core::Result<()> {
    for session in sessions {
        let user = match market.get_user_by_email(&session.email).await? {
            Some(existing) if existing.role == session.role => continue,
            Some(mut existing) => {
                existing.role = session.role;
                existing
            }
            None => User::new(&session.email, session.role),
        };
        market.save_user(&user).await?;
        tracing::info!(email = %user.email, role = %user.role, "Seeded dev user");
    }
    Ok(())
}
