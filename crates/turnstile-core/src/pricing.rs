//! # Pricing Engine
//!
//! Turns a list of ticket selections into a priced quote.
//!
//! ## Computation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subtotal    = Σ price[i] × quantity[i]                                 │
//! │  booking fee = subtotal × 2%                  (BOOKING_FEE_BPS = 200)   │
//! │  gst         = (subtotal + booking fee) × 18% (GST_BPS = 1800)          │
//! │  total       = subtotal + booking fee + gst                             │
//! │                                                                         │
//! │  2 × VIP @ 150.00                                                       │
//! │    subtotal 300.00 → fee 6.00 → gst 55.08 → total 361.08                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The quote endpoint and the booking endpoint both call [`quote`], so the
//! price shown to the buyer is the price written into the order snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, Rate};
use crate::types::{LineItem, TicketType};
use crate::validation::validate_selections;
use crate::{BOOKING_FEE_BPS, GST_BPS};

// =============================================================================
// Input
// =============================================================================

/// A buyer's request for `quantity` tickets of one ticket type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub ticket_type_id: String,
    pub quantity: i64,
}

impl Selection {
    pub fn new(ticket_type_id: impl Into<String>, quantity: i64) -> Self {
        Selection {
            ticket_type_id: ticket_type_id.into(),
            quantity,
        }
    }
}

// =============================================================================
// Output
// =============================================================================

/// Per-ticket-type breakdown of a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QuoteLine {
    pub ticket_type_id: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

/// A priced cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub event_id: String,
    pub currency: String,
    pub lines: Vec<QuoteLine>,
    pub subtotal_cents: i64,
    pub booking_fee_cents: i64,
    pub gst_cents: i64,
    pub total_cents: i64,
}

impl Quote {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Freezes the quote into order line items.
    pub fn line_items(&self) -> Vec<LineItem> {
        self.lines
            .iter()
            .map(|line| LineItem {
                ticket_type_id: line.ticket_type_id.clone(),
                name: line.name.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                line_total_cents: line.subtotal_cents,
            })
            .collect()
    }

    /// Total number of tickets across all lines.
    pub fn ticket_count(&self) -> i64 {
        self.lines.iter().map(|line| line.quantity).sum()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Returns `(booking_fee, gst, total)` for a subtotal.
///
/// Each component is rounded half up on its own, and the total is the exact
/// sum of the rounded parts, so `total = subtotal + fee + gst` always holds.
///
/// ## Errors
/// `AmountOverflow` if any component leaves the i64 range.
pub fn fee_breakdown(subtotal: Money) -> CoreResult<(Money, Money, Money)> {
    let booking_fee = subtotal
        .apply_rate(Rate::from_bps(BOOKING_FEE_BPS))
        .ok_or(CoreError::AmountOverflow)?;
    let taxable = subtotal.checked_add(booking_fee).ok_or(CoreError::AmountOverflow)?;
    let gst = taxable
        .apply_rate(Rate::from_bps(GST_BPS))
        .ok_or(CoreError::AmountOverflow)?;
    let total = taxable.checked_add(gst).ok_or(CoreError::AmountOverflow)?;
    Ok((booking_fee, gst, total))
}

/// Prices `selections` against the event's current ticket types.
///
/// ## Errors
/// - `Validation` for empty carts, zero/negative/oversized quantities, repeated ids
/// - `UnknownTicketType` when a selection does not belong to `event_id`
/// - `SaleWindowClosed` when a ticket type is not on sale at `now`
/// - `InsufficientAvailability` when `available - sold < quantity`
/// - `CurrencyMismatch` when the selected ticket types disagree on currency
/// - `AmountOverflow` when a line, the subtotal or the total leaves the i64 range
///
/// Availability is only read here; nothing is reserved.
pub fn quote(
    event_id: &str,
    ticket_types: &[TicketType],
    selections: &[Selection],
    now: DateTime<Utc>,
) -> CoreResult<Quote> {
    validate_selections(selections)?;

    let mut currency: Option<&str> = None;
    let mut lines = Vec::with_capacity(selections.len());

    for selection in selections {
        let ticket = ticket_types
            .iter()
            .find(|t| t.id == selection.ticket_type_id && t.event_id == event_id)
            .ok_or_else(|| CoreError::UnknownTicketType(selection.ticket_type_id.clone()))?;

        if !ticket.is_on_sale(now) {
            return Err(CoreError::SaleWindowClosed {
                ticket_type_id: ticket.id.clone(),
                name: ticket.name.clone(),
            });
        }

        if !ticket.check_availability(selection.quantity) {
            return Err(CoreError::InsufficientAvailability {
                ticket_type_id: ticket.id.clone(),
                name: ticket.name.clone(),
                remaining: ticket.remaining(),
                requested: selection.quantity,
            });
        }

        match currency {
            None => currency = Some(&ticket.currency),
            Some(expected) if expected != ticket.currency => {
                return Err(CoreError::CurrencyMismatch {
                    expected: expected.to_string(),
                    found: ticket.currency.clone(),
                });
            }
            Some(_) => {}
        }

        let line_total = ticket
            .price()
            .checked_mul(selection.quantity)
            .ok_or(CoreError::AmountOverflow)?;

        lines.push(QuoteLine {
            ticket_type_id: ticket.id.clone(),
            name: ticket.name.clone(),
            quantity: selection.quantity,
            unit_price_cents: ticket.price_cents,
            subtotal_cents: line_total.cents(),
        });
    }

    let subtotal = Money::checked_sum(lines.iter().map(|line| Money::from_cents(line.subtotal_cents)))
        .ok_or(CoreError::AmountOverflow)?;
    let (booking_fee, gst, total) = fee_breakdown(subtotal)?;

    Ok(Quote {
        event_id: event_id.to_string(),
        currency: currency.unwrap_or_default().to_string(),
        lines,
        subtotal_cents: subtotal.cents(),
        booking_fee_cents: booking_fee.cents(),
        gst_cents: gst.cents(),
        total_cents: total.cents(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
