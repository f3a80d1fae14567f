//! Signed Download URLs
//!
//! Appends `expires` and `signature` query parameters to a file URL. The
//! signature is HMAC-SHA256 over `"<url>:<expires>"`, hex encoded.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{CoreError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies time-limited file URLs
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Signer with a random per-process key; URLs do not survive a restart
    pub fn ephemeral() -> Self {
        let key = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        Self::new(key)
    }

    fn mac(&self, file_url: &str, expires: i64) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| CoreError::Config(format!("invalid signing key: {e}")))?;
        mac.update(file_url.as_bytes());
        mac.update(b":");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    /// Sign `file_url` so it stays valid for `ttl_secs` after `now`
    pub fn sign(&self, file_url: &str, ttl_secs: i64, now: DateTime<Utc>) -> Result<String> {
        let expires = now.timestamp() + ttl_secs;
        let signature = hex::encode(self.mac(file_url, expires)?.finalize().into_bytes());
        let separator = if file_url.contains('?') { '&' } else { '?' };
        Ok(format!(
            "{file_url}{separator}expires={expires}&signature={signature}"
        ))
    }

    /// Verify a URL produced by [`UrlSigner::sign`]
    pub fn verify(&self, signed_url: &str, now: DateTime<Utc>) -> bool {
        let Some((base, signature)) = signed_url.rsplit_once("&signature=") else {
            return false;
        };
        let Some((file_url, expires)) = base
            .rsplit_once("?expires=")
            .or_else(|| base.rsplit_once("&expires="))
        else {
            return false;
        };
        let Ok(expires) = expires.parse::<i64>() else {
            return false;
        };
        if expires < now.timestamp() {
            return false;
        }
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };

        self.mac(file_url, expires)
            .is_ok_and(|mac| mac.verify_slice(&expected).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_sign_and_verify() {
        let signer = UrlSigner::new("download-secret");
        let now = Utc::now();
        let url = signer
            .sign("https://files.example.com/ebook.pdf", 3600, now)
            .unwrap();

        assert!(url.starts_with("https://files.example.com/ebook.pdf?expires="));
        assert!(signer.verify(&url, now));
    }

    #[test]
    fn test_existing_query_string() {
        let signer = UrlSigner::new("download-secret");
        let now = Utc::now();
        let url = signer
            .sign("https://files.example.com/get?id=7", 60, now)
            .unwrap();

        assert!(url.contains("?id=7&expires="));
        assert!(signer.verify(&url, now));
    }

    #[test]
    fn test_tampered_url_rejected() {
        let signer = UrlSigner::new("download-secret");
        let now = Utc::now();
        let url = signer.sign("https://files.example.com/a.zip", 3600, now).unwrap();
        let tampered = url.replace("a.zip", "b.zip");

        assert!(!signer.verify(&tampered, now));
        assert!(!UrlSigner::new("other-secret").verify(&url, now));
    }

    #[test]
    fn test_expired_url_rejected() {
        let signer = UrlSigner::new("download-secret");
        let now = Utc::now();
        let url = signer.sign("https://files.example.com/a.zip", 60, now).unwrap();

        assert!(!signer.verify(&url, now + Duration::seconds(61)));
    }
}
