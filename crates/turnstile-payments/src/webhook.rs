//! # Webhook Authentication
//!
//! Gateway notifications arrive unauthenticated over the public internet.
//! Two checks stand between a request body and any state change:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Signature   x-paystack-signature == hex(HMAC-SHA512(secret, body))  │
//! │                 missing / wrong → UnverifiedWebhook (401), no writes    │
//! │                                                                         │
//! │  2. Re-verify   the reconciler asks the gateway for the charge status  │
//! │                 instead of trusting `data.status` in the body          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The signature is computed over the raw bytes, so it must be checked
//! before the body is parsed.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;

use crate::error::{PaymentError, PaymentResult};

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// The only event that can complete an order.
pub const CHARGE_SUCCESS: &str = "charge.success";

/// Checks webhook signatures against the shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        WebhookVerifier {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> PaymentResult<HmacSha512> {
        HmacSha512::new_from_slice(&self.secret)
            .map_err(|e| PaymentError::Internal(format!("Invalid webhook key: {e}")))
    }

    /// Hex signature for `body`, as the gateway would send it.
    pub fn sign(&self, body: &[u8]) -> PaymentResult<String> {
        let mut mac = self.mac()?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Verifies `signature` over `body` in constant time.
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> PaymentResult<()> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PaymentError::UnverifiedWebhook("missing signature header".into()))?;

        let expected = hex::decode(signature)
            .map_err(|_| PaymentError::UnverifiedWebhook("signature is not hex".into()))?;

        let mut mac = self.mac()?;
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| PaymentError::UnverifiedWebhook("signature mismatch".into()))
    }
}

// =============================================================================
// Payload
// =============================================================================

/// A gateway notification. Only the reference is used; everything else is
/// re-read from the gateway.
///
/// Subscription, transfer and dispute events carry other `data` shapes, so
/// the reference is optional and only required for `charge.success`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookData {
    #[serde(default)]
    pub reference: Option<String>,
}

impl WebhookEvent {
    pub fn parse(body: &[u8]) -> PaymentResult<Self> {
        let event: WebhookEvent =
            serde_json::from_slice(body).map_err(|e| PaymentError::MalformedWebhook(e.to_string()))?;

        if event.is_charge_success() && event.reference().is_none() {
            return Err(PaymentError::MalformedWebhook("charge.success without a reference".into()));
        }
        Ok(event)
    }

    #[inline]
    pub fn is_charge_success(&self) -> bool {
        self.event == CHARGE_SUCCESS
    }

    /// The trimmed reference, if the event carries a non-empty one.
    pub fn reference(&self) -> Option<&str> {
        self.data
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"event":"charge.success","data":{"reference":"o-1","amount":36108,"status":"success"}}"#;

    #[test]
    fn test_sign_then_verify() {
        let verifier = WebhookVerifier::new("sk_test_secret");
        let signature = verifier.sign(BODY).unwrap();
        assert_eq!(signature.len(), 128);
        assert!(verifier.verify(BODY, Some(&signature)).is_ok());
    }

    #[test]
    fn test_rejects_tampered_body() {
        let verifier = WebhookVerifier::new("sk_test_secret");
        let signature = verifier.sign(BODY).unwrap();
        let tampered = br#"{"event":"charge.success","data":{"reference":"o-2"}}"#;
        assert!(matches!(
            verifier.verify(tampered, Some(&signature)),
            Err(PaymentError::UnverifiedWebhook(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_secret_and_missing_header() {
        let signature = WebhookVerifier::new("other").sign(BODY).unwrap();
        let verifier = WebhookVerifier::new("sk_test_secret");
        assert!(verifier.verify(BODY, Some(&signature)).is_err());
        assert!(verifier.verify(BODY, None).is_err());
        assert!(verifier.verify(BODY, Some("zz-not-hex")).is_err());
    }

    #[test]
    fn test_parse_event() {
        let event = WebhookEvent::parse(BODY).unwrap();
        assert!(event.is_charge_success());
        assert_eq!(event.reference(), Some("o-1"));

        let transfer = WebhookEvent::parse(br#"{"event":"transfer.success","data":{"reference":"t-1"}}"#).unwrap();
        assert!(!transfer.is_charge_success());

        assert!(WebhookEvent::parse(b"not json").is_err());
        assert!(WebhookEvent::parse(br#"{"event":"charge.success","data":{"reference":" "}}"#).is_err());
        assert!(WebhookEvent::parse(br#"{"event":"charge.success","data":{}}"#).is_err());
    }

    #[test]
    fn test_non_charge_event_needs_no_reference() {
        let event =
            WebhookEvent::parse(br#"{"event":"subscription.create","data":{"subscription_code":"SUB_1"}}"#)
                .unwrap();
        assert!(!event.is_charge_success());
        assert_eq!(event.reference(), None);

        let bare = WebhookEvent::parse(br#"{"event":"customeridentification.success"}"#).unwrap();
        assert_eq!(bare.reference(), None);
    }
}
