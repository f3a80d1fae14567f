//! Session Identity
//!
//! A request carries a session token as `Authorization: Bearer <token>` or
//! as a `session` cookie. An [`IdentityProvider`] turns the token into an
//! email, which is then matched to a user row.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{
        HeaderMap,
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};
use market_core::{Role, User};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{DevSession, SupabaseConfig};
use crate::error::ApiError;
use crate::state::AppState;

const SESSION_COOKIE: &str = "session";

/// Resolves a session token to the signed-in email
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` for unknown or expired tokens
    async fn resolve(&self, token: &str) -> Result<Option<String>, ApiError>;

    fn name(&self) -> &str;
}

/// Fixed tokens for local development
pub struct StaticSessions {
    sessions: HashMap<String, String>,
}

impl StaticSessions {
    pub fn new(sessions: &[DevSession]) -> Self {
        Self {
            sessions: sessions
                .iter()
                .map(|s| (s.token.clone(), s.email.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticSessions {
    async fn resolve(&self, token: &str) -> Result<Option<String>, ApiError> {
        Ok(self.sessions.get(token).cloned())
    }

    fn name(&self) -> &str {
        "dev-sessions"
    }
}

/// Supabase Auth (`GET /auth/v1/user`)
pub struct SupabaseIdentity {
    http: reqwest::Client,
    config: SupabaseConfig,
}

#[derive(Deserialize)]
struct SupabaseUser {
    email: Option<String>,
}

impl SupabaseIdentity {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentity {
    async fn resolve(&self, token: &str) -> Result<Option<String>, ApiError> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.config.url))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::Internal(format!("identity provider unreachable: {e}")))?;

        if !response.status().is_success() {
            tracing::debug!(status = response.status().as_u16(), "Session rejected by Supabase");
            return Ok(None);
        }

        let user: SupabaseUser = response
            .json()
            .await
            .map_err(|e| ApiError::Internal(format!("invalid identity response: {e}")))?;
        Ok(user.email.filter(|e| !e.is_empty()))
    }

    fn name(&self) -> &str {
        "supabase"
    }
}

/// Tries each provider in order
pub struct IdentityChain {
    providers: Vec<Arc<dyn IdentityProvider>>,
}

impl IdentityChain {
    pub fn new(providers: Vec<Arc<dyn IdentityProvider>>) -> Self {
        Self { providers }
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

#[async_trait]
impl IdentityProvider for IdentityChain {
    async fn resolve(&self, token: &str) -> Result<Option<String>, ApiError> {
        for provider in &self.providers {
            if let Some(email) = provider.resolve(token).await? {
                return Ok(Some(email));
            }
        }
        Ok(None)
    }

    fn name(&self) -> &str {
        "chain"
    }
}

/// Bearer token first, then the `session` cookie
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// The signed-in user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let email = state
            .identity
            .resolve(&token)
            .await?
            .ok_or(ApiError::Unauthorized)?;
        let user = state
            .market
            .get_user_by_email(&email)
            .await?
            .ok_or_else(|| {
                tracing::debug!(email = %email, "Session has no matching user");
                ApiError::Unauthorized
            })?;
        Ok(Self(user))
    }
}

impl CurrentUser {
    /// SELLER or ADMIN
    pub fn require_seller(&self) -> Result<&User, ApiError> {
        if self.0.role.can_sell() {
            Ok(&self.0)
        } else {
            Err(ApiError::forbidden("Seller access required"))
        }
    }

    pub fn require_admin(&self) -> Result<&User, ApiError> {
        if self.0.role == Role::Admin {
            Ok(&self.0)
        } else {
            Err(ApiError::forbidden("Admin access required"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; session=cookie_tok"));
        assert_eq!(session_token(&headers).as_deref(), Some("cookie_tok"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer bearer_tok"));
        assert_eq!(session_token(&headers).as_deref(), Some("bearer_tok"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(session_token(&headers).as_deref(), Some("cookie_tok"));
    }

    #[tokio::test]
    async fn test_identity_chain() {
        let first: Arc<dyn IdentityProvider> = Arc::new(StaticSessions::new(&[DevSession {
            token: "a".into(),
            email: "a@example.com".into(),
            role: Role::Buyer,
        }]));
        let second: Arc<dyn IdentityProvider> = Arc::new(StaticSessions::new(&[DevSession {
            token: "b".into(),
            email: "b@example.com".into(),
            role: Role::Seller,
        }]));
        let chain = IdentityChain::new(vec![first, second]);

        assert_eq!(chain.resolve("a").await.unwrap().as_deref(), Some("a@example.com"));
        assert_eq!(chain.resolve("b").await.unwrap().as_deref(), Some("b@example.com"));
        assert_eq!(chain.resolve("c").await.unwrap(), None);
    }

    #[test]
    fn test_role_guards() {
        let buyer = CurrentUser(User::new("b@example.com", Role::Buyer));
        let seller = CurrentUser(User::new("s@example.com", Role::Seller));
        let admin = CurrentUser(User::new("a@example.com", Role::Admin));

        assert!(buyer.require_seller().is_err());
        assert!(seller.require_seller().is_ok());
        assert!(admin.require_seller().is_ok());
        assert!(seller.require_admin().is_err());
        assert!(admin.require_admin().is_ok());
    }
}
