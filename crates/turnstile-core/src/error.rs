//! # Error Types
//!
//! Domain-specific error types for turnstile-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  turnstile-core errors (this file)                                     │
//! │  ├── CoreError        - Pricing, availability, state machine           │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  turnstile-db        └── DbError                                       │
//! │  turnstile-payments  └── PaymentError, GatewayError                    │
//! │  apps/api            └── ApiError (what the client sees)               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → PaymentError → ApiError → JSON    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A selection names a ticket type the event does not sell.
    ///
    /// ## When This Occurs
    /// - Stale client cart after the organizer removed a ticket type
    /// - Ticket type id belonging to a different event
    #[error("Unknown ticket type: {0}")]
    UnknownTicketType(String),

    /// Not enough tickets left to satisfy the selection.
    ///
    /// ## User Workflow
    /// ```text
    /// Quote (VIP × 5)
    ///      │
    ///      ▼
    /// Check: available 100, sold 97 → remaining 3
    ///      │
    ///      ▼
    /// InsufficientAvailability { name: "VIP", remaining: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Client shows: "Only 3 tickets available for VIP"
    /// ```
    #[error("Only {remaining} tickets available for {name}")]
    InsufficientAvailability {
        ticket_type_id: String,
        name: String,
        remaining: i64,
        requested: i64,
    },

    /// The ticket type is not on sale right now.
    #[error("Tickets for {name} are not on sale at this time")]
    SaleWindowClosed { ticket_type_id: String, name: String },

    /// Ticket types of one event disagree on currency.
    #[error("Ticket types mix currencies: {expected} and {found}")]
    CurrencyMismatch { expected: String, found: String },

    /// The requested status change is not an edge of the order state machine.
    ///
    /// ## When This Occurs
    /// - Refunding a pending or failed order
    /// - Failing an order that already completed
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// A line total, subtotal or fee does not fit in the money range.
    #[error("Order amount exceeds the supported range")]
    AmountOverflow,

    /// The stored totals no longer add up.
    #[error("Order {order_id} totals are inconsistent")]
    TotalsMismatch { order_id: String },

    /// The account already holds a booking for this order.
    #[error("Booking for order {0} already recorded")]
    DuplicateBooking(String),

    /// The account holds no booking for this order.
    #[error("No booking recorded for order {0}")]
    BookingNotFound(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any pricing or persistence work starts.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// The same value appears twice where it must be unique.
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_message_names_ticket() {
        let err = CoreError::InsufficientAvailability {
            ticket_type_id: "tt-1".to_string(),
            name: "VIP".to_string(),
            remaining: 3,
            requested: 5,
        };
        assert_eq!(err.to_string(), "Only 3 tickets available for VIP");
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = CoreError::InvalidTransition {
            order_id: "o-1".to_string(),
            from: OrderStatus::Pending,
            to: OrderStatus::Refunded,
        };
        assert_eq!(err.to_string(), "Order o-1 cannot move from pending to refunded");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
