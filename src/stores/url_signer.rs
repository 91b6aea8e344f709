//! HMAC-SHA256 signing for time-limited blob read URLs.
//!
//! A signed URL has the shape
//! `{base}/blobs/{key}?expires={unix_secs}&signature={hex}` where the
//! signature covers `"{key}\n{expires}"`. Anyone holding the URL may read the
//! object until it expires; no further authorization is applied.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct UrlSigner {
    mac: HmacSha256,
    public_base_url: String,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(
        signing_key: &[u8],
        public_base_url: impl Into<String>,
    ) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(signing_key)?,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Issue a URL for `key` that expires `ttl` from now.
    pub fn sign(&self, key: &str, ttl: Duration) -> String {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = Utc::now().timestamp().saturating_add(ttl_secs);
        self.sign_until(key, expires)
    }

    pub fn sign_until(&self, key: &str, expires: i64) -> String {
        format!(
            "{}/blobs/{}?expires={}&signature={}",
            self.public_base_url,
            key,
            expires,
            self.signature(key, expires)
        )
    }

    /// Constant-time check of `signature`, rejecting anything past `expires`.
    pub fn verify(&self, key: &str, expires: i64, signature: &str) -> bool {
        if expires < Utc::now().timestamp() {
            return false;
        }
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(signing_input(key, expires).as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    fn signature(&self, key: &str, expires: i64) -> String {
        let mut mac = self.mac.clone();
        mac.update(signing_input(key, expires).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

fn signing_input(key: &str, expires: i64) -> String {
    format!("{}\n{}", key, expires)
}
