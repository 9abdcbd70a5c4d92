//! # Payment Error Types
//!
//! Errors raised while talking to the gateway and reconciling its results.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Payment Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Gateway      │  │       Webhook           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Gateway-       │  │  UnverifiedWebhook      │ │
//! │  │  InvalidUrl     │  │  Unavailable    │  │  MalformedWebhook       │ │
//! │  │  ConfigLoad...  │  │  (GatewayError) │  │  UnknownOrder           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Manual review  │  │    Checkout     │  │      Wrapped            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Oversell...    │  │  NotFound       │  │  Domain (CoreError)     │ │
//! │  │  AmountMismatch │  │  NotRefundable  │  │  Database (DbError)     │ │
//! │  │  AccountMissing │  │  RefundIn...    │  │                         │ │
//! │  │  LedgerDrift    │  │  NotInReview    │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use turnstile_core::{AccountKind, CoreError, OrderStatus};
use turnstile_db::DbError;

/// Result type alias for payment operations.
pub type PaymentResult<T> = Result<T, PaymentError>;

/// Result type alias for a single gateway call.
pub type GatewayResult<T> = Result<T, GatewayError>;

// =============================================================================
// Gateway Errors
// =============================================================================

/// Failure of one call to the payment gateway.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The request never produced a response (DNS, TCP, TLS).
    #[error("Gateway unreachable: {0}")]
    Unreachable(String),

    /// No response within the request timeout.
    #[error("Gateway timed out after {0} seconds")]
    Timeout(u64),

    /// The gateway rejected our secret key.
    #[error("Gateway rejected credentials")]
    Unauthorized,

    /// Too many requests; try again later.
    #[error("Gateway rate limited the request")]
    RateLimited,

    /// The gateway has no transaction with this reference.
    #[error("Gateway has no transaction {0}")]
    UnknownReference(String),

    /// The gateway answered with an error of its own.
    #[error("Gateway returned {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The response body could not be understood.
    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Returns true if repeating the same request may succeed.
    ///
    /// ## Retryable Errors
    /// - Network failures and timeouts
    /// - Rate limiting
    /// - 5xx responses
    ///
    /// ## Non-Retryable Errors
    /// - Bad credentials
    /// - Unknown reference
    /// - 4xx rejections and unparseable bodies
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Unreachable(_) | GatewayError::Timeout(_) | GatewayError::RateLimited => true,
            GatewayError::Rejected { status, .. } => *status >= 500,
            GatewayError::Unauthorized
            | GatewayError::UnknownReference(_)
            | GatewayError::InvalidResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(0)
        } else if err.is_decode() {
            GatewayError::InvalidResponse(err.to_string())
        } else {
            GatewayError::Unreachable(err.to_string())
        }
    }
}

// =============================================================================
// Payment Errors
// =============================================================================

/// Payment error type covering checkout, reconciliation and configuration.
#[derive(Debug, Error)]
pub enum PaymentError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid payments configuration.
    #[error("Invalid payments configuration: {0}")]
    InvalidConfig(String),

    /// A configured URL does not parse or uses the wrong scheme.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The config file could not be read or parsed.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Gateway Errors
    // =========================================================================
    /// The gateway could not be reached in time. The order is left pending.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(#[from] GatewayError),

    // =========================================================================
    // Webhook Errors
    // =========================================================================
    /// Missing or invalid webhook signature. No state was changed.
    #[error("Webhook signature rejected: {0}")]
    UnverifiedWebhook(String),

    /// The webhook body is not a gateway event.
    #[error("Malformed webhook payload: {0}")]
    MalformedWebhook(String),

    /// The webhook references an order this system never created.
    #[error("No order for gateway reference {0}")]
    UnknownOrder(String),

    // =========================================================================
    // Manual Review
    // =========================================================================
    // A paid order that cannot be applied stays pending and is flagged.
    /// A line item no longer fits in capacity at confirmation time.
    #[error("Order {order_id} would oversell ticket type {ticket_type_id}")]
    OversellDetected {
        order_id: String,
        ticket_type_id: String,
    },

    /// The verified charge does not match the order total.
    #[error("Order {order_id} expected {expected} {currency} but the gateway charged {charged}")]
    AmountMismatch {
        order_id: String,
        expected: i64,
        charged: i64,
        currency: String,
    },

    /// The buyer's account no longer exists.
    #[error("Order {order_id} belongs to missing {kind} account {buyer_id}")]
    AccountMissing {
        order_id: String,
        kind: AccountKind,
        buyer_id: String,
    },

    /// A refund would drive a sold counter below zero.
    #[error("Order {order_id} cannot release ticket type {ticket_type_id}")]
    LedgerDrift {
        order_id: String,
        ticket_type_id: String,
    },

    // =========================================================================
    // Checkout Errors
    // =========================================================================
    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Only completed orders can be refunded.
    #[error("Payment cannot be refunded from {status} status")]
    NotRefundable { order_id: String, status: OrderStatus },

    /// Another refund request holds the claim on this order.
    #[error("A refund for order {order_id} is already in progress")]
    RefundInProgress { order_id: String },

    /// Only pending or failed orders flagged for review can be resolved.
    #[error("Order {order_id} is not awaiting review")]
    NotInReview { order_id: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// Pricing, validation or state machine error.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Storage error.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        PaymentError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns true if the operation can be retried later unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::GatewayUnavailable(_) | PaymentError::RefundInProgress { .. } => true,
            PaymentError::Database(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Returns true if the order was flagged for an operator.
    pub fn needs_review(&self) -> bool {
        matches!(
            self,
            PaymentError::OversellDetected { .. }
                | PaymentError::AmountMismatch { .. }
                | PaymentError::AccountMissing { .. }
                | PaymentError::LedgerDrift { .. }
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PaymentError::InvalidConfig(_) | PaymentError::InvalidUrl(_) | PaymentError::ConfigLoadFailed(_)
        )
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<url::ParseError> for PaymentError {
    fn from(err: url::ParseError) -> Self {
        PaymentError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for PaymentError {
    fn from(err: std::io::Error) -> Self {
        PaymentError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for PaymentError {
    fn from(err: toml::de::Error) -> Self {
        PaymentError::ConfigLoadFailed(err.to_string())
    }
}

impl From<turnstile_core::ValidationError> for PaymentError {
    fn from(err: turnstile_core::ValidationError) -> Self {
        PaymentError::Domain(CoreError::Validation(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_retryable() {
        assert!(GatewayError::Unreachable("connection reset".into()).is_retryable());
        assert!(GatewayError::Timeout(10).is_retryable());
        assert!(GatewayError::RateLimited.is_retryable());
        assert!(GatewayError::Rejected { status: 502, message: "bad gateway".into() }.is_retryable());

        assert!(!GatewayError::Unauthorized.is_retryable());
        assert!(!GatewayError::UnknownReference("ref".into()).is_retryable());
        assert!(!GatewayError::Rejected { status: 400, message: "bad amount".into() }.is_retryable());
    }

    #[test]
    fn test_payment_error_categories() {
        assert!(PaymentError::GatewayUnavailable(GatewayError::Timeout(5)).is_retryable());
        assert!(!PaymentError::UnknownOrder("ref".into()).is_retryable());

        let oversell = PaymentError::OversellDetected {
            order_id: "o-1".into(),
            ticket_type_id: "vip".into(),
        };
        assert!(oversell.needs_review());
        assert!(!oversell.is_retryable());

        assert!(PaymentError::InvalidConfig("batch_size".into()).is_config_error());

        let busy = PaymentError::RefundInProgress { order_id: "o-1".into() };
        assert!(busy.is_retryable());
        assert!(!busy.needs_review());
    }

    #[test]
    fn test_not_refundable_message() {
        let err = PaymentError::NotRefundable {
            order_id: "o-1".into(),
            status: OrderStatus::Pending,
        };
        assert_eq!(err.to_string(), "Payment cannot be refunded from pending status");
    }
}
