//! # Order State Machine
//!
//! The order is the source of truth for payment state. Inventory counters and
//! booking entries are projections applied when it completes.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. CREATE                                                              │
//! │     └── Order::from_quote() → Order { status: Pending }                 │
//! │         prices and names frozen, total computed once                   │
//! │                                                                         │
//! │  2. CONFIRM (webhook / sweep, after gateway verification)              │
//! │     └── Pending → Completed   (Completed → Completed is a no-op)        │
//! │                                                                         │
//! │  3. FAIL                                                                │
//! │     └── Pending → Failed                                                │
//! │                                                                         │
//! │  4. REFUND (admin)                                                      │
//! │     └── Completed → Refunded  (inventory released, booking cancelled)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! In storage every transition is a compare-and-set on the status column; the
//! rules here decide which compare-and-sets may be attempted at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::Quote;
use crate::types::{AccountKind, BookingEntry, BookingStatus, LineItem, OrderStatus};

// =============================================================================
// Transitions
// =============================================================================

impl OrderStatus {
    /// Whether `self → next` is an edge of the state machine.
    ///
    /// Only `pending → completed`, `pending → failed` and
    /// `completed → refunded` are legal.
    pub const fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Completed)
                | (OrderStatus::Pending, OrderStatus::Failed)
                | (OrderStatus::Completed, OrderStatus::Refunded)
        )
    }
}

/// Outcome of [`Order::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The status changed from the contained value.
    Applied { from: OrderStatus },
    /// The order was already in the requested status.
    NoOp,
}

// =============================================================================
// Order
// =============================================================================

/// A single purchase attempt for one event.
///
/// `gateway_reference` equals `id`: the order id is the idempotency key shared
/// with the gateway and the webhook reconciler.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub buyer_id: String,
    pub buyer_account_kind: AccountKind,
    pub buyer_email: String,
    pub event_id: String,
    pub line_items: Vec<LineItem>,
    pub currency: String,
    pub subtotal_cents: i64,
    pub booking_fee_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub gateway_reference: String,
    /// Hosted checkout page returned by the gateway.
    pub payment_url: Option<String>,
    /// Set when a paid order could not be applied and needs an operator.
    pub review_reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub refunded_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Creates a pending order from a quote, freezing its prices.
    pub fn from_quote(
        buyer_id: impl Into<String>,
        buyer_account_kind: AccountKind,
        buyer_email: impl Into<String>,
        quote: &Quote,
        now: DateTime<Utc>,
    ) -> Self {
        let id = Uuid::new_v4().to_string();

        Order {
            gateway_reference: id.clone(),
            id,
            buyer_id: buyer_id.into(),
            buyer_account_kind,
            buyer_email: buyer_email.into().trim().to_string(),
            event_id: quote.event_id.clone(),
            line_items: quote.line_items(),
            currency: quote.currency.clone(),
            subtotal_cents: quote.subtotal_cents,
            booking_fee_cents: quote.booking_fee_cents,
            tax_cents: quote.gst_cents,
            total_cents: quote.total_cents,
            status: OrderStatus::Pending,
            payment_url: None,
            review_reason: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            refunded_at: None,
        }
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Applies a status change in memory.
    ///
    /// Requesting the current status is a no-op, which is what makes a
    /// duplicate confirmation harmless.
    pub fn transition(&mut self, next: OrderStatus, now: DateTime<Utc>) -> CoreResult<Transition> {
        if self.status == next {
            return Ok(Transition::NoOp);
        }

        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                order_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }

        let from = self.status;
        self.status = next;
        self.updated_at = now;
        match next {
            OrderStatus::Completed => {
                self.completed_at = Some(now);
                self.review_reason = None;
            }
            OrderStatus::Refunded => self.refunded_at = Some(now),
            OrderStatus::Pending | OrderStatus::Failed => {}
        }

        Ok(Transition::Applied { from })
    }

    /// Checks `total = subtotal + booking_fee + tax` and that the line items
    /// add up to the subtotal.
    pub fn check_totals(&self) -> CoreResult<()> {
        let lines = Money::checked_sum(self.line_items.iter().map(|item| item.line_total()));
        let parts = Money::checked_sum(
            [self.subtotal_cents, self.booking_fee_cents, self.tax_cents]
                .into_iter()
                .map(Money::from_cents),
        );
        let consistent = lines == Some(Money::from_cents(self.subtotal_cents))
            && parts == Some(self.total());

        if consistent {
            Ok(())
        } else {
            Err(CoreError::TotalsMismatch {
                order_id: self.id.clone(),
            })
        }
    }

    /// Builds the booking entry recorded in the buyer's account on completion.
    pub fn booking_entry(&self, booked_at: DateTime<Utc>) -> BookingEntry {
        BookingEntry {
            order_id: self.id.clone(),
            event_id: self.event_id.clone(),
            line_items: self.line_items.clone(),
            total_amount_cents: self.total_cents,
            currency: self.currency.clone(),
            booking_date: booked_at,
            status: BookingStatus::Confirmed,
        }
    }

    /// Whether the given account placed this order.
    pub fn is_owned_by(&self, account_id: &str, kind: AccountKind) -> bool {
        self.buyer_id == account_id && self.buyer_account_kind == kind
    }

    #[inline]
    pub fn needs_review(&self) -> bool {
        self.review_reason.is_some()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
