//! # Checkout
//!
//! Quote and booking orchestration.
//!
//! ## Booking Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  book(buyer, event, selections, email)                                  │
//! │                                                                         │
//! │   1. validate email, load event + ticket types                          │
//! │   2. pricing::quote        same computation as the quote endpoint       │
//! │   3. buyer account exists  in the store for its kind                    │
//! │   4. INSERT order          status = pending, prices frozen, totals      │
//! │                            checked against the line items               │
//! │   5. gateway session       bounded by call_timeout                      │
//! │        ├─ ok    → store payment URL, return receipt                     │
//! │        └─ error → GatewayUnavailable, order stays pending               │
//! │                                                                         │
//! │   Nothing is reserved here. Inventory moves only when the reconciler    │
//! │   confirms a verified charge.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use turnstile_core::pricing::{self, Quote, Selection};
use turnstile_core::validation::validate_email;
use turnstile_core::{AccountKind, Order, TicketType};
use turnstile_db::Database;

use crate::error::{PaymentError, PaymentResult};
use crate::gateway::{bounded, PaymentGateway, SessionRequest};

/// The authenticated account placing an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buyer {
    pub id: String,
    pub kind: AccountKind,
}

impl Buyer {
    pub fn new(id: impl Into<String>, kind: AccountKind) -> Self {
        Buyer { id: id.into(), kind }
    }
}

/// A pending order with its hosted checkout URL.
#[derive(Debug, Clone)]
pub struct BookingReceipt {
    pub order: Order,
    pub payment_url: String,
}

/// Prices carts and opens hosted checkouts.
#[derive(Debug, Clone)]
pub struct Checkout {
    db: Database,
    gateway: Arc<dyn PaymentGateway>,
    call_timeout: Duration,
}

impl Checkout {
    pub fn new(db: Database, gateway: Arc<dyn PaymentGateway>, call_timeout: Duration) -> Self {
        Checkout {
            db,
            gateway,
            call_timeout,
        }
    }

    /// The event's ticket types, cheapest first.
    pub async fn ticket_types(&self, event_id: &str) -> PaymentResult<Vec<TicketType>> {
        if self.db.events().get_by_id(event_id).await?.is_none() {
            return Err(PaymentError::not_found("Event", event_id));
        }
        Ok(self.db.inventory().list_for_event(event_id).await?)
    }

    /// Prices `selections` without reserving anything.
    pub async fn quote(&self, event_id: &str, selections: &[Selection]) -> PaymentResult<Quote> {
        let ticket_types = self.ticket_types(event_id).await?;
        let quote = pricing::quote(event_id, &ticket_types, selections, Utc::now())?;
        debug!(event_id = %event_id, total = quote.total_cents, "Quote computed");
        Ok(quote)
    }

    /// Creates a pending order and opens a hosted checkout for it.
    pub async fn book(
        &self,
        buyer: &Buyer,
        event_id: &str,
        selections: &[Selection],
        buyer_email: &str,
    ) -> PaymentResult<BookingReceipt> {
        validate_email(buyer_email)?;

        let quote = self.quote(event_id, selections).await?;

        if !self.db.accounts().exists(buyer.kind, &buyer.id).await? {
            return Err(PaymentError::not_found("Account", &buyer.id));
        }

        let mut order = Order::from_quote(&buyer.id, buyer.kind, buyer_email, &quote, Utc::now());
        order.check_totals()?;
        self.db.orders().insert(&order).await?;
        info!(
            order_id = %order.id,
            event_id = %event_id,
            buyer_kind = %buyer.kind,
            total = order.total_cents,
            "Order created"
        );

        let request = SessionRequest {
            reference: order.gateway_reference.clone(),
            amount_cents: order.total_cents,
            currency: order.currency.clone(),
            email: order.buyer_email.clone(),
            metadata: json!({
                "orderId": order.id,
                "eventId": order.event_id,
                "buyerId": order.buyer_id,
                "buyerKind": order.buyer_account_kind,
                "tickets": order.line_items,
            }),
        };

        let session = match bounded(self.call_timeout, self.gateway.initialize_session(&request)).await {
            Ok(session) => session,
            Err(err) => {
                warn!(order_id = %order.id, error = %err, "Checkout session failed; order left pending");
                return Err(PaymentError::GatewayUnavailable(err));
            }
        };

        self.db
            .orders()
            .set_payment_url(&order.id, &session.authorization_url)
            .await?;
        order.payment_url = Some(session.authorization_url.clone());

        Ok(BookingReceipt {
            order,
            payment_url: session.authorization_url,
        })
    }
}
