// Payment references, checkout collaborator and webhook signatures
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL_SAFE, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use url::Url;

use crate::error::HavenError;
use crate::logger::{linfo, LoggerHandle};
use crate::model::PaymentStatus;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook body signature.
pub const SIGNATURE_HEADER: &str = "X-Haven-Signature";

/// The two payment ledgers: the one-time emergency fee of an incident and
/// the per-session fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PaymentRef {
    /// Keyed by the emergency payment record id.
    Emergency(String),
    /// Keyed by the session id.
    Session(String),
}

impl PaymentRef {
    pub fn ledger(&self) -> &'static str {
        match self {
            PaymentRef::Emergency(_) => "emergency",
            PaymentRef::Session(_) => "session",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            PaymentRef::Emergency(id) | PaymentRef::Session(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub reference: PaymentRef,
    pub amount_cents: i64,
    pub currency: String,
}

/// External payment processor: turns a payable reference into a redirect URL.
/// Completion is reported later through the webhook.
pub trait PaymentProcessor: Send + Sync {
    fn checkout_url(&self, request: &CheckoutRequest) -> Result<String, HavenError>;
}

/// Hosted checkout page addressed by signed query parameters.
pub struct HostedCheckout {
    base_url: Url,
    signer: WebhookSigner,
    logger: LoggerHandle,
}

impl HostedCheckout {
    pub fn new(base_url: &str, secret: &str, logger: LoggerHandle) -> Result<Self, HavenError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| HavenError::validation(format!("invalid checkout base url: {}", e)))?;
        Ok(HostedCheckout {
            base_url,
            signer: WebhookSigner::new(secret),
            logger,
        })
    }
}

impl PaymentProcessor for HostedCheckout {
    fn checkout_url(&self, request: &CheckoutRequest) -> Result<String, HavenError> {
        let mut url = self.base_url.clone();
        let payload = format!(
            "{}:{}:{}:{}",
            request.reference.ledger(),
            request.reference.id(),
            request.amount_cents,
            request.currency
        );
        url.query_pairs_mut()
            .append_pair("ledger", request.reference.ledger())
            .append_pair("ref", request.reference.id())
            .append_pair("amount", &request.amount_cents.to_string())
            .append_pair("currency", &request.currency)
            .append_pair("sig", &self.signer.sign(payload.as_bytes())?);

        linfo!(
            self.logger,
            "Checkout prepared for {} {}",
            request.reference.ledger(),
            request.reference.id()
        );
        Ok(url.to_string())
    }
}

/// Event delivered by the processor when a checkout settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub reference: PaymentRef,
    pub status: PaymentStatus,
}

/// HMAC-SHA256 over raw bodies, base64url encoded
#[derive(Clone)]
pub struct WebhookSigner {
    secret: Vec<u8>,
}

impl WebhookSigner {
    pub fn new(secret: &str) -> Self {
        WebhookSigner {
            secret: secret.as_bytes().to_vec(),
        }
    }

    fn mac(&self) -> Result<HmacSha256, HavenError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| HavenError::transient("failed to initialise HMAC"))
    }

    pub fn sign(&self, body: &[u8]) -> Result<String, HavenError> {
        let mut mac = self.mac()?;
        mac.update(body);
        Ok(BASE64_URL_SAFE.encode(mac.finalize().into_bytes()))
    }

    pub fn verify(&self, body: &[u8], signature: &str) -> Result<(), HavenError> {
        let expected = BASE64_URL_SAFE
            .decode(signature.trim())
            .map_err(|_| HavenError::Unauthorized("malformed webhook signature".to_string()))?;
        let mut mac = self.mac()?;
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| HavenError::Unauthorized("webhook signature mismatch".to_string()))
    }

    /// Verify and decode a webhook body in one step.
    pub fn open(&self, body: &[u8], signature: &str) -> Result<WebhookEvent, HavenError> {
        self.verify(body, signature)?;
        Ok(serde_json::from_slice(body)?)
    }
}
