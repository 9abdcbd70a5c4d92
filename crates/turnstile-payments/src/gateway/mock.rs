//! In-process gateway for development and tests.
//!
//! Sessions are kept in memory. Tests script the outcome of each charge with
//! [`MockGateway::settle`] and can take the gateway offline to exercise the
//! `GatewayUnavailable` paths.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::info;

use super::{Charge, ChargeStatus, PaymentGateway, Refund, Session, SessionRequest};
use crate::error::{GatewayError, GatewayResult};

/// Webhook secret used with the mock provider when none is configured.
pub const MOCK_SIGNING_SECRET: &str = "mock-webhook-secret";

#[derive(Debug, Default)]
struct MockState {
    charges: HashMap<String, Charge>,
    refunds: Vec<Refund>,
    offline: bool,
    verify_calls: usize,
    refund_delay: Option<Duration>,
}

/// Scriptable payment gateway.
#[derive(Debug)]
pub struct MockGateway {
    state: Mutex<MockState>,
    auto_approve: bool,
}

impl MockGateway {
    /// Sessions start pending until a test settles them.
    pub fn new() -> Self {
        MockGateway {
            state: Mutex::new(MockState::default()),
            auto_approve: false,
        }
    }

    /// Every opened session is immediately paid in full.
    pub fn auto_approve() -> Self {
        MockGateway {
            state: Mutex::new(MockState::default()),
            auto_approve: true,
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sets the outcome of the charge under `reference`.
    pub fn settle(&self, reference: &str, status: ChargeStatus) {
        if let Some(charge) = self.state().charges.get_mut(reference) {
            charge.status = status;
        }
    }

    /// Overrides the amount the gateway reports as charged.
    pub fn set_charged_amount(&self, reference: &str, amount_cents: i64) {
        if let Some(charge) = self.state().charges.get_mut(reference) {
            charge.amount_cents = amount_cents;
        }
    }

    /// Records a charge that was never opened through this gateway.
    pub fn insert_charge(&self, charge: Charge) {
        self.state().charges.insert(charge.reference.clone(), charge);
    }

    /// While offline every call fails with a retryable error.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Makes every refund call wait `delay` before it is processed.
    pub fn set_refund_delay(&self, delay: Duration) {
        self.state().refund_delay = Some(delay);
    }

    pub fn refunds(&self) -> Vec<Refund> {
        self.state().refunds.clone()
    }

    pub fn verify_calls(&self) -> usize {
        self.state().verify_calls
    }

    pub fn has_session(&self, reference: &str) -> bool {
        self.state().charges.contains_key(reference)
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn initialize_session(&self, request: &SessionRequest) -> GatewayResult<Session> {
        let mut state = self.state();
        if state.offline {
            return Err(GatewayError::Unreachable("mock gateway offline".into()));
        }

        let status = if self.auto_approve {
            ChargeStatus::Success
        } else {
            ChargeStatus::Pending
        };
        state.charges.insert(
            request.reference.clone(),
            Charge {
                reference: request.reference.clone(),
                status,
                amount_cents: request.amount_cents,
                currency: request.currency.clone(),
            },
        );

        info!(reference = %request.reference, amount = request.amount_cents, "Mock checkout opened");

        Ok(Session {
            reference: request.reference.clone(),
            authorization_url: format!("https://checkout.mock.test/{}", request.reference),
            access_code: Some(format!("mock_{}", request.reference)),
        })
    }

    async fn verify_charge(&self, reference: &str) -> GatewayResult<Charge> {
        let mut state = self.state();
        state.verify_calls += 1;
        if state.offline {
            return Err(GatewayError::Timeout(0));
        }

        state
            .charges
            .get(reference)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownReference(reference.to_string()))
    }

    async fn refund(&self, reference: &str, amount_cents: i64) -> GatewayResult<Refund> {
        let delay = self.state().refund_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.offline {
            return Err(GatewayError::Unreachable("mock gateway offline".into()));
        }

        match state.charges.get(reference) {
            Some(charge) if charge.status == ChargeStatus::Success => {}
            Some(_) => {
                return Err(GatewayError::Rejected {
                    status: 400,
                    message: "Transaction was not successful".into(),
                })
            }
            None => return Err(GatewayError::UnknownReference(reference.to_string())),
        }

        let refund = Refund {
            reference: reference.to_string(),
            amount_cents,
        };
        state.refunds.push(refund.clone());
        info!(reference = %reference, amount = amount_cents, "Mock refund processed");
        Ok(refund)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(reference: &str) -> SessionRequest {
        SessionRequest {
            reference: reference.to_string(),
            amount_cents: 36_108,
            currency: "INR".to_string(),
            email: "buyer@example.com".to_string(),
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn test_sessions_start_pending() {
        let gateway = MockGateway::new();
        let session = gateway.initialize_session(&request("o-1")).await.unwrap();
        assert!(session.authorization_url.ends_with("/o-1"));

        let charge = gateway.verify_charge("o-1").await.unwrap();
        assert_eq!(charge.status, ChargeStatus::Pending);
        assert_eq!(charge.amount_cents, 36_108);

        gateway.settle("o-1", ChargeStatus::Success);
        assert_eq!(gateway.verify_charge("o-1").await.unwrap().status, ChargeStatus::Success);
    }

    #[tokio::test]
    async fn test_auto_approve() {
        let gateway = MockGateway::auto_approve();
        gateway.initialize_session(&request("o-1")).await.unwrap();
        assert_eq!(gateway.verify_charge("o-1").await.unwrap().status, ChargeStatus::Success);
    }

    #[tokio::test]
    async fn test_unknown_reference_and_offline() {
        let gateway = MockGateway::new();
        assert!(matches!(
            gateway.verify_charge("missing").await,
            Err(GatewayError::UnknownReference(_))
        ));

        gateway.set_offline(true);
        let err = gateway.initialize_session(&request("o-2")).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(gateway.verify_calls(), 1);
    }

    #[tokio::test]
    async fn test_refund_requires_successful_charge() {
        let gateway = MockGateway::new();
        gateway.initialize_session(&request("o-1")).await.unwrap();
        assert!(gateway.refund("o-1", 100).await.is_err());

        gateway.settle("o-1", ChargeStatus::Success);
        gateway.refund("o-1", 36_108).await.unwrap();
        assert_eq!(gateway.refunds().len(), 1);
    }
}
