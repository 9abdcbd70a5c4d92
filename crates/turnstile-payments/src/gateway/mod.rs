//! # Payment Gateway Adapter
//!
//! The seam between Turnstile and the hosted payment provider.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       PaymentGateway                                    │
//! │                                                                         │
//! │  initialize_session(order) ──► hosted checkout URL                     │
//! │        (book)                   buyer pays out-of-band                  │
//! │                                                                         │
//! │  verify_charge(reference)  ──► { status, amount }                      │
//! │        (webhook, sweep)         the only source trusted for "paid"     │
//! │                                                                         │
//! │  refund(reference, amount) ──► refund accepted                         │
//! │        (admin refund)                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The order id is the gateway reference, so every call is keyed by the
//! same idempotency key the reconciler uses.
//!
//! ## Implementations
//! - [`HttpGateway`] - Paystack-compatible HTTPS client with bounded retries
//! - [`MockGateway`] - scriptable in-process gateway for tests and local runs

mod http;
mod mock;

pub use http::HttpGateway;
pub use mock::{MockGateway, MOCK_SIGNING_SECRET};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::{GatewayProvider, GatewaySettings};
use crate::error::{GatewayError, GatewayResult, PaymentResult};

// =============================================================================
// Requests & Responses
// =============================================================================

/// A request to open a hosted checkout for one order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRequest {
    /// Order id; the gateway echoes it back on every notification.
    pub reference: String,
    /// Amount in minor units.
    pub amount_cents: i64,
    pub currency: String,
    pub email: String,
    pub metadata: serde_json::Value,
}

/// An opened hosted checkout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Session {
    pub reference: String,
    pub authorization_url: String,
    #[serde(default)]
    pub access_code: Option<String>,
}

/// Status of a charge as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Success,
    Failed,
    /// The buyer opened checkout and left without paying.
    Abandoned,
    /// Anything still in flight (`ongoing`, `processing`, `queued`, ...).
    #[serde(other)]
    Pending,
}

/// A charge as verified with the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charge {
    pub reference: String,
    pub status: ChargeStatus,
    pub amount_cents: i64,
    pub currency: String,
}

/// A refund accepted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refund {
    pub reference: String,
    pub amount_cents: i64,
}

// =============================================================================
// Gateway Trait
// =============================================================================

/// Hosted payment provider.
///
/// Implementations must be cheap to share; callers hold an
/// `Arc<dyn PaymentGateway>`.
#[async_trait]
pub trait PaymentGateway: Send + Sync + std::fmt::Debug {
    /// Opens a hosted checkout for `request.reference`.
    async fn initialize_session(&self, request: &SessionRequest) -> GatewayResult<Session>;

    /// Asks the gateway for the authoritative status of a charge.
    async fn verify_charge(&self, reference: &str) -> GatewayResult<Charge>;

    /// Refunds `amount_cents` of the charge made under `reference`.
    async fn refund(&self, reference: &str, amount_cents: i64) -> GatewayResult<Refund>;
}

/// Builds the gateway selected in the configuration.
pub fn from_settings(settings: &GatewaySettings) -> PaymentResult<Arc<dyn PaymentGateway>> {
    match settings.provider {
        GatewayProvider::Http => Ok(Arc::new(HttpGateway::new(settings)?)),
        GatewayProvider::Mock => Ok(Arc::new(MockGateway::auto_approve())),
    }
}

/// Runs one gateway operation under a hard deadline.
///
/// A gateway that never answers must not hold a request handler or a sweep
/// forever; on expiry the caller leaves the order pending.
pub(crate) async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = GatewayResult<T>>,
) -> GatewayResult<T> {
    match timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout(limit.as_secs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_status_from_gateway_strings() {
        let parse = |s: &str| serde_json::from_str::<ChargeStatus>(&format!("\"{s}\"")).unwrap();
        assert_eq!(parse("success"), ChargeStatus::Success);
        assert_eq!(parse("failed"), ChargeStatus::Failed);
        assert_eq!(parse("abandoned"), ChargeStatus::Abandoned);
        assert_eq!(parse("ongoing"), ChargeStatus::Pending);
        assert_eq!(parse("queued"), ChargeStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let never = std::future::pending::<GatewayResult<()>>();
        let result = bounded(Duration::from_secs(3), never).await;
        assert!(matches!(result, Err(GatewayError::Timeout(3))));
    }

    #[test]
    fn test_from_settings_defaults_to_mock() {
        let gateway = from_settings(&GatewaySettings::default()).unwrap();
        assert!(format!("{gateway:?}").contains("MockGateway"));
    }
}
