use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use haven::auth::Role;

type HmacSha256 = Hmac<Sha256>;

const KEY_DIGEST_DOMAIN: &[u8] = b"haven-admin-bootstrap";

fn key_digest(value: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(KEY_DIGEST_DOMAIN).ok()?;
    mac.update(value.as_bytes());
    Some(mac)
}

/// Holds the bootstrap key that lets an operator mint the first tokens
pub struct AdminBootstrap {
    key: String,
}

#[derive(Debug, Deserialize)]
pub struct IssueTokenRequest {
    pub bootstrap_key: String,
    pub subject_id: String,
    pub role: Role,
}

impl AdminBootstrap {
    pub fn new(key: impl Into<String>) -> Self {
        AdminBootstrap { key: key.into() }
    }

    /// Constant-time check over fixed-length HMAC digests of both keys.
    /// An empty configured key never verifies.
    pub fn verify(&self, presented: &str) -> bool {
        let ok = !self.key.is_empty()
            && match (key_digest(&self.key), key_digest(presented)) {
                (Some(expected), Some(given)) => given.verify_slice(&expected.finalize().into_bytes()).is_ok(),
                _ => false,
            };
        if !ok {
            tracing::warn!("Rejected bootstrap key");
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_only_the_configured_key() {
        let admin = AdminBootstrap::new("bootstrap-key");
        assert!(admin.verify("bootstrap-key"));
        assert!(!admin.verify("bootstrap-kez"));
        assert!(!admin.verify("short"));
        assert!(!admin.verify("bootstrap-key-and-more"));
        assert!(!admin.verify(""));
        assert!(!AdminBootstrap::new("").verify(""));
    }
}
