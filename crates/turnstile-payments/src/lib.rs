//! # turnstile-payments: Gateway Adapter and Reconciliation
//!
//! Owns every conversation with the payment gateway and the flow that turns
//! a verified charge into a completed order.
//!
//! ## Payment Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Turnstile Payment Flow                            │
//! │                                                                         │
//! │   Buyer                  Turnstile                        Gateway       │
//! │     │   quote / book        │                                │          │
//! │     │──────────────────────►│  Checkout                      │          │
//! │     │                       │  order = pending ──initialize─►│          │
//! │     │◄── payment URL ───────│                                │          │
//! │     │                                                        │          │
//! │     │───────────────── pays on hosted page ─────────────────►│          │
//! │                             │                                │          │
//! │                             │◄──── webhook (signed) ─────────│          │
//! │                             │  WebhookVerifier               │          │
//! │                             │  Reconciler ──── verify ──────►│          │
//! │                             │  Ledger: completed + sold +    │          │
//! │                             │          booking + attendee    │          │
//! │                             │                                │          │
//! │                             │  sweeper (every N minutes) ───►│          │
//! │                             │  re-verifies stale pending     │          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`gateway`] - `PaymentGateway` trait, HTTPS client and mock
//! - [`webhook`] - Signature verification and payload parsing
//! - [`checkout`] - Quote and booking orchestration
//! - [`reconciler`] - Webhook reconciliation, refunds, pending sweep
//! - [`config`] - `payments.toml` + environment configuration
//! - [`error`] - Payment error types

pub mod checkout;
pub mod config;
pub mod error;
pub mod gateway;
pub mod reconciler;
pub mod webhook;

pub use checkout::{BookingReceipt, Buyer, Checkout};
pub use config::{GatewayProvider, PaymentsConfig};
pub use error::{GatewayError, GatewayResult, PaymentError, PaymentResult};
pub use gateway::{Charge, ChargeStatus, HttpGateway, MockGateway, PaymentGateway};
pub use reconciler::{Reconciler, Reconciliation, RefundOutcome, ResolveOutcome, SweepReport};
pub use webhook::{WebhookEvent, WebhookVerifier, SIGNATURE_HEADER};
