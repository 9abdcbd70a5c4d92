//! # turnstile-core: Pure Business Logic for Turnstile
//!
//! Everything the ticketing flow decides without touching a database or the
//! network lives here: what a cart of tickets costs, which order transitions
//! are legal, and how a confirmed booking is recorded against an account.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Turnstile Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/api (axum)                              │   │
//! │  │    quote ──► book ──► (hosted checkout) ──► webhook            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          turnstile-payments (checkout, reconciler)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ turnstile-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐          │   │
//! │  │   │ pricing │  │  order  │  │ account │  │  money  │          │   │
//! │  │   │  Quote  │  │  state  │  │  trait  │  │  Money  │          │   │
//! │  │   │ fee+GST │  │ machine │  │ 4 kinds │  │  Rate   │          │   │
//! │  │   └─────────┘  └─────────┘  └─────────┘  └─────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                turnstile-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Events, ticket types, statuses, booking entries
//! - [`money`] - Integer money and basis-point rates
//! - [`pricing`] - The quote computation shared by quoting and booking
//! - [`order`] - Order snapshot and its status state machine
//! - [`account`] - The `Account` capability and its four implementations
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use turnstile_core::money::Money;
//! use turnstile_core::pricing::{fee_breakdown};
//!
//! // 2 × VIP at 150.00
//! let subtotal = Money::from_cents(15_000).checked_mul(2).unwrap();
//! let (fee, gst, total) = fee_breakdown(subtotal).unwrap();
//!
//! assert_eq!(fee.cents(), 600);
//! assert_eq!(gst.cents(), 5_508);
//! assert_eq!(total.cents(), 36_108);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod account;
pub mod error;
pub mod money;
pub mod order;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use account::{Account, Curator, Guest, Sponsor, VenueOwner};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Rate};
pub use order::{Order, Transition};
pub use pricing::{Quote, QuoteLine, Selection};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Booking fee charged on the subtotal, in basis points (2%).
pub const BOOKING_FEE_BPS: u32 = 200;

/// GST charged on subtotal plus booking fee, in basis points (18%).
pub const GST_BPS: u32 = 1_800;

/// Maximum number of distinct ticket types in one order.
pub const MAX_LINE_ITEMS: usize = 20;

/// Highest ticket price accepted by the store, in minor units (10,000,000.00).
pub const MAX_PRICE_CENTS: i64 = 1_000_000_000;

/// Maximum quantity of a single ticket type in one order.
///
/// ## Business Reason
/// Bulk purchases above this go through the organizer, not checkout.
pub const MAX_TICKETS_PER_LINE: i64 = 50;
