//! # Domain Types
//!
//! Core domain types used throughout Turnstile.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Event       │   │   TicketType    │   │    LineItem     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │──►│  event_id (FK)  │──►│  ticket_type_id │       │
//! │  │  title          │   │  price_cents    │   │  quantity       │       │
//! │  │  venue          │   │  available/sold │   │  unit price     │       │
//! │  └─────────────────┘   └─────────────────┘   │  (frozen)       │       │
//! │                                               └─────────────────┘       │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  OrderStatus    │   │  AccountKind    │   │  BookingEntry   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Pending        │   │  Sponsor        │   │  order_id       │       │
//! │  │  Completed      │   │  Curator        │   │  line_items     │       │
//! │  │  Failed         │   │  Guest          │   │  total          │       │
//! │  │  Refunded       │   │  VenueOwner     │   │  status         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Event
// =============================================================================

/// An event that sells tickets.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub venue: Option<String>,
    #[ts(as = "String")]
    pub starts_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Ticket Type
// =============================================================================

/// A priced category of admission to an event, with finite capacity.
///
/// ## Counter Invariant
/// `0 <= sold <= available` at all times. `sold` only moves through the
/// inventory ledger: up on a confirmed payment, down on a refund.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TicketType {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Event this ticket type belongs to.
    pub event_id: String,

    /// Display name ("VIP", "General Admission").
    pub name: String,

    pub description: Option<String>,

    /// Perks listed on the ticket page.
    pub benefits: Vec<String>,

    /// Price in the smallest currency unit.
    pub price_cents: i64,

    /// ISO 4217 currency code.
    pub currency: String,

    /// Capacity.
    pub available: i64,

    /// Tickets sold on confirmed payments.
    pub sold: i64,

    #[ts(as = "Option<String>")]
    pub sale_start: Option<DateTime<Utc>>,

    #[ts(as = "Option<String>")]
    pub sale_end: Option<DateTime<Utc>>,
}

impl TicketType {
    /// Returns the price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Tickets that can still be sold.
    #[inline]
    pub fn remaining(&self) -> i64 {
        (self.available - self.sold).max(0)
    }

    /// Read-only availability check: `available - sold >= quantity`.
    ///
    /// This is advisory. The authoritative check happens in the same SQL
    /// statement that increments `sold`.
    pub fn check_availability(&self, quantity: i64) -> bool {
        self.remaining() >= quantity
    }

    /// Whether the ticket type is inside its sale window at `now`.
    ///
    /// A missing bound leaves that side of the window open.
    pub fn is_on_sale(&self, now: DateTime<Utc>) -> bool {
        let started = self.sale_start.map_or(true, |start| now >= start);
        let not_ended = self.sale_end.map_or(true, |end| now <= end);
        started && not_ended
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One ticket type within an order.
///
/// Uses the snapshot pattern: name and unit price are frozen when the order is
/// created, so a later price change on the ticket type never alters what the
/// buyer is charged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub ticket_type_id: String,
    /// Ticket type name at time of order (frozen).
    pub name: String,
    pub quantity: i64,
    /// Unit price at time of order (frozen).
    pub unit_price_cents: i64,
    /// unit_price × quantity.
    pub line_total_cents: i64,
}

impl LineItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Payment lifecycle state of an order.
///
/// ```text
///             ┌───────────┐   refund   ┌──────────┐
///        ┌───►│ completed │───────────►│ refunded │
///        │    └───────────┘            └──────────┘
/// ┌──────┴──┐
/// │ pending │
/// └──────┬──┘
///        │    ┌───────────┐
///        └───►│  failed   │
///             └───────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, waiting for the gateway to confirm payment.
    Pending,
    /// Paid and applied to inventory and the buyer's booking ledger.
    Completed,
    /// The gateway reported the charge as failed or abandoned.
    Failed,
    /// Paid, then refunded; inventory and booking effects reversed.
    Refunded,
}

impl OrderStatus {
    /// Returns the lowercase name used in storage and JSON.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Returns true when no further transition is possible.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Failed | OrderStatus::Refunded)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Account Kind
// =============================================================================

/// The four disjoint kinds of buyer account.
///
/// Stored on every order so the buyer's account is found with one lookup
/// instead of probing each account store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum AccountKind {
    Sponsor,
    Curator,
    Guest,
    VenueOwner,
}

impl AccountKind {
    /// All kinds, in a stable order.
    pub const ALL: [AccountKind; 4] = [
        AccountKind::Sponsor,
        AccountKind::Curator,
        AccountKind::Guest,
        AccountKind::VenueOwner,
    ];

    /// Returns the name used in JSON and tokens.
    pub const fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Sponsor => "sponsor",
            AccountKind::Curator => "curator",
            AccountKind::Guest => "guest",
            AccountKind::VenueOwner => "venueOwner",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sponsor" => Ok(AccountKind::Sponsor),
            "curator" => Ok(AccountKind::Curator),
            "guest" => Ok(AccountKind::Guest),
            "venueOwner" | "venue_owner" => Ok(AccountKind::VenueOwner),
            _ => Err(ValidationError::NotAllowed {
                field: "account kind".to_string(),
                allowed: AccountKind::ALL.iter().map(|k| k.to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Role
// =============================================================================

/// Role carried in a bearer token.
///
/// Buyers act as one of the account kinds; admins operate refunds and the
/// manual review queue but never buy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Sponsor,
    Curator,
    Guest,
    VenueOwner,
    Admin,
}

impl Role {
    /// The account kind this role buys as, if any.
    pub const fn account_kind(&self) -> Option<AccountKind> {
        match self {
            Role::Sponsor => Some(AccountKind::Sponsor),
            Role::Curator => Some(AccountKind::Curator),
            Role::Guest => Some(AccountKind::Guest),
            Role::VenueOwner => Some(AccountKind::VenueOwner),
            Role::Admin => None,
        }
    }

    #[inline]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl From<AccountKind> for Role {
    fn from(kind: AccountKind) -> Self {
        match kind {
            AccountKind::Sponsor => Role::Sponsor,
            AccountKind::Curator => Role::Curator,
            AccountKind::Guest => Role::Guest,
            AccountKind::VenueOwner => Role::VenueOwner,
        }
    }
}

// =============================================================================
// Booking Entry
// =============================================================================

/// Status of an entry in an account's booking ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created when the order completed.
    Confirmed,
    /// The order was refunded; the entry is kept for history.
    Cancelled,
}

impl BookingStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

/// A confirmed booking recorded in the buyer's account.
///
/// A denormalized projection of a completed order: it is created exactly
/// once, when the order completes, and cancelled when the order is refunded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BookingEntry {
    pub order_id: String,
    pub event_id: String,
    pub line_items: Vec<LineItem>,
    pub total_amount_cents: i64,
    pub currency: String,
    #[ts(as = "String")]
    pub booking_date: DateTime<Utc>,
    pub status: BookingStatus,
}

impl BookingEntry {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    /// Total number of tickets in the booking.
    pub fn ticket_count(&self) -> i64 {
        self.line_items.iter().map(|item| item.quantity).sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn vip(available: i64, sold: i64) -> TicketType {
        TicketType {
            id: "tt-vip".to_string(),
            event_id: "ev-1".to_string(),
            name: "VIP".to_string(),
            description: None,
            benefits: vec!["Lounge access".to_string()],
            price_cents: 15_000,
            currency: "INR".to_string(),
            available,
            sold,
            sale_start: None,
            sale_end: None,
        }
    }

    #[test]
    fn test_remaining_and_availability() {
        let ticket = vip(100, 97);
        assert_eq!(ticket.remaining(), 3);
        assert!(ticket.check_availability(3));
        assert!(!ticket.check_availability(4));
    }

    #[test]
    fn test_sale_window() {
        let now = Utc::now();
        let mut ticket = vip(10, 0);
        assert!(ticket.is_on_sale(now));

        ticket.sale_start = Some(now + Duration::hours(1));
        assert!(!ticket.is_on_sale(now));

        ticket.sale_start = Some(now - Duration::hours(2));
        ticket.sale_end = Some(now - Duration::hours(1));
        assert!(!ticket.is_on_sale(now));
    }

    #[test]
    fn test_account_kind_parsing() {
        assert_eq!("venueOwner".parse::<AccountKind>().unwrap(), AccountKind::VenueOwner);
        assert_eq!("venue_owner".parse::<AccountKind>().unwrap(), AccountKind::VenueOwner);
        assert_eq!("guest".parse::<AccountKind>().unwrap(), AccountKind::Guest);
        assert!("organizer".parse::<AccountKind>().is_err());
    }

    #[test]
    fn test_account_kind_json_matches_token_names() {
        let json = serde_json::to_string(&AccountKind::VenueOwner).unwrap();
        assert_eq!(json, "\"venueOwner\"");
    }

    #[test]
    fn test_role_account_kind() {
        assert_eq!(Role::Curator.account_kind(), Some(AccountKind::Curator));
        assert_eq!(Role::Admin.account_kind(), None);
        assert_eq!(Role::from(AccountKind::Sponsor), Role::Sponsor);
    }

    #[test]
    fn test_order_status_terminal() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }
}
