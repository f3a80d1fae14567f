//! Server Configuration
//!
//! Everything comes from environment variables (after `.env` is loaded).
//! Parsing goes through a key lookup so tests can feed their own values.

use market_core::{DownloadPolicy, Role};
use market_payments::DEFAULT_API_URL;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Hosted identity provider
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

/// Fixed token → user mapping for local development
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DevSession {
    pub token: String,
    pub email: String,
    pub role: Role,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    /// Public base URL, used for gateway callback and return URLs
    pub app_url: String,
    /// `None` selects the test-mode gateway
    pub paychangu_secret_key: Option<String>,
    pub paychangu_api_url: String,
    /// `None` rejects every webhook
    pub webhook_secret: Option<String>,
    /// `None` signs download URLs with a random per-process key
    pub download_signing_secret: Option<String>,
    pub download_policy: DownloadPolicy,
    pub storage_base_url: String,
    pub database_url: Option<String>,
    pub supabase: Option<SupabaseConfig>,
    pub dev_sessions: Vec<DevSession>,
    pub static_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or_default = |key: &str, default: &str| {
            var(key).unwrap_or_else(|| {
                tracing::debug!("{key} not set, using default: {default}");
                default.to_string()
            })
        };

        let defaults = DownloadPolicy::default();
        let download_policy = DownloadPolicy {
            max_downloads: parse(&var, "MAX_DOWNLOADS", defaults.max_downloads)?,
            expiry_days: parse(&var, "DOWNLOAD_EXPIRY_DAYS", defaults.expiry_days)?,
        };

        let supabase = match (var("SUPABASE_URL"), var("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => Some(SupabaseConfig {
                url: url.trim_end_matches('/').to_string(),
                anon_key,
            }),
            _ => None,
        };

        let dev_sessions = match var("DEV_SESSIONS") {
            Some(raw) => parse_dev_sessions(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            bind_addr: or_default("BIND_ADDR", "0.0.0.0:3000"),
            app_url: or_default("APP_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            paychangu_secret_key: var("PAYCHANGU_SECRET_KEY"),
            paychangu_api_url: or_default("PAYCHANGU_API_URL", DEFAULT_API_URL),
            webhook_secret: var("PAYCHANGU_WEBHOOK_SECRET"),
            download_signing_secret: var("DOWNLOAD_SIGNING_SECRET"),
            download_policy,
            storage_base_url: or_default("STORAGE_BASE_URL", "https://placeholder-storage.com"),
            database_url: var("DATABASE_URL"),
            supabase,
            dev_sessions,
            static_dir: or_default("STATIC_DIR", "static"),
        })
    }
}

fn parse<T>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

/// `token=email[:ROLE]` entries separated by commas; role defaults to BUYER
fn parse_dev_sessions(raw: &str) -> Result<Vec<DevSession>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let invalid = |reason: &str| ConfigError::Invalid {
                key: "DEV_SESSIONS",
                value: entry.to_string(),
                reason: reason.to_string(),
            };
            let (token, identity) = entry
                .split_once('=')
                .ok_or_else(|| invalid("expected token=email"))?;
            let (email, role) = match identity.split_once(':') {
                Some((email, role)) => (
                    email,
                    role.parse::<Role>().map_err(|_| invalid("unknown role"))?,
                ),
                None => (identity, Role::Buyer),
            };
            if token.is_empty() || email.is_empty() {
                return Err(invalid("token and email are required"));
            }
            Ok(DevSession {
                token: token.to_string(),
                email: email.to_lowercase(),
                role,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.paychangu_api_url, "https://api.paychangu.com");
        assert_eq!(config.download_policy.max_downloads, 5);
        assert_eq!(config.download_policy.expiry_days, 30);
        assert!(config.paychangu_secret_key.is_none());
        assert!(config.webhook_secret.is_none());
        assert!(config.supabase.is_none());
        assert!(config.dev_sessions.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("APP_URL", "https://market.example.com/"),
            ("PAYCHANGU_SECRET_KEY", "sk_live_1"),
            ("PAYCHANGU_WEBHOOK_SECRET", "   "),
            ("MAX_DOWNLOADS", "3"),
            ("SUPABASE_URL", "https://abc.supabase.co/"),
            ("SUPABASE_ANON_KEY", "anon"),
        ])
        .unwrap();
        assert_eq!(config.app_url, "https://market.example.com");
        assert_eq!(config.paychangu_secret_key.as_deref(), Some("sk_live_1"));
        assert!(config.webhook_secret.is_none());
        assert_eq!(config.download_policy.max_downloads, 3);
        assert_eq!(config.supabase.unwrap().url, "https://abc.supabase.co");
    }

    #[test]
    fn test_invalid_number() {
        let err = config(&[("MAX_DOWNLOADS", "five")]).unwrap_err();
        assert!(err.to_string().contains("MAX_DOWNLOADS"));
    }

    #[test]
    fn test_dev_sessions() {
        let config = config(&[(
            "DEV_SESSIONS",
            "tok_b=Buyer@Example.com, tok_s=seller@example.com:SELLER,tok_a=admin@example.com:ADMIN",
        )])
        .unwrap();
        assert_eq!(
            config.dev_sessions[0],
            DevSession {
                token: "tok_b".into(),
                email: "buyer@example.com".into(),
                role: Role::Buyer,
            }
        );
        assert_eq!(config.dev_sessions[1].role, Role::Seller);
        assert_eq!(config.dev_sessions[2].role, Role::Admin);

        assert!(parse_dev_sessions("no-equals-sign").is_err());
        assert!(parse_dev_sessions("tok=a@b.c:WIZARD").is_err());
    }
}
