//! Shared application state.

use std::sync::Arc;

use turnstile_db::Database;
use turnstile_payments::config::PaymentsConfig;
use turnstile_payments::{Checkout, PaymentGateway, Reconciler, WebhookVerifier};

use crate::auth::JwtManager;

/// Handed to every handler through `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub checkout: Checkout,
    pub reconciler: Reconciler,
    pub verifier: WebhookVerifier,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    /// Wires checkout and reconciliation to one gateway and one database.
    pub fn new(
        db: Database,
        gateway: Arc<dyn PaymentGateway>,
        payments: &PaymentsConfig,
        verifier: WebhookVerifier,
        jwt: JwtManager,
    ) -> Self {
        let call_timeout = payments.gateway.call_timeout();
        AppState {
            checkout: Checkout::new(db.clone(), gateway.clone(), call_timeout),
            reconciler: Reconciler::new(db.clone(), gateway, call_timeout, payments.reconciler.clone()),
            db,
            verifier,
            jwt: Arc::new(jwt),
        }
    }
}
