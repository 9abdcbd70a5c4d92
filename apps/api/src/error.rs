//! Error types for the HTTP API.
//!
//! Every handler returns `Result<_, ApiError>`. Domain, storage and payment
//! errors convert into an `ApiError` carrying the HTTP status and a stable
//! machine-readable code; the body is always `{"code": ..., "message": ...}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use turnstile_core::{CoreError, ValidationError};
use turnstile_db::DbError;
use turnstile_payments::PaymentError;

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// An error rendered as a JSON response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "GATEWAY_UNAVAILABLE", message)
    }

    /// Logs `detail` and returns a 500 that does not leak it.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        error!(error = %detail, "Internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "An internal error occurred",
        )
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn code(&self) -> &'static str {
        self.code
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(inner) => inner.into(),
            CoreError::UnknownTicketType(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "UNKNOWN_TICKET_TYPE", err.to_string())
            }
            CoreError::InsufficientAvailability { .. } => {
                ApiError::conflict("INSUFFICIENT_AVAILABILITY", err.to_string())
            }
            CoreError::SaleWindowClosed { .. } => ApiError::conflict("SALE_CLOSED", err.to_string()),
            CoreError::CurrencyMismatch { .. } => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "CURRENCY_MISMATCH", err.to_string())
            }
            CoreError::InvalidTransition { .. } => ApiError::conflict("INVALID_TRANSITION", err.to_string()),
            CoreError::AmountOverflow => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "AMOUNT_TOO_LARGE", err.to_string())
            }
            CoreError::TotalsMismatch { .. }
            | CoreError::DuplicateBooking(_)
            | CoreError::BookingNotFound(_) => ApiError::internal(err),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } => ApiError::not_found(err.to_string()),
            DbError::UniqueViolation { .. } => ApiError::conflict("DUPLICATE", err.to_string()),
            other => ApiError::internal(other),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Domain(inner) => inner.into(),
            PaymentError::Database(inner) => inner.into(),
            PaymentError::NotFound { .. } => ApiError::not_found(err.to_string()),
            PaymentError::GatewayUnavailable(_) => {
                ApiError::unavailable("Payment gateway is unavailable, please retry")
            }
            PaymentError::UnverifiedWebhook(_) => ApiError::unauthorized(err.to_string()),
            PaymentError::MalformedWebhook(_) => ApiError::bad_request(err.to_string()),
            PaymentError::UnknownOrder(_) => ApiError::not_found(err.to_string()),
            PaymentError::NotRefundable { .. } => ApiError::conflict("NOT_REFUNDABLE", err.to_string()),
            PaymentError::RefundInProgress { .. } => ApiError::conflict("REFUND_IN_PROGRESS", err.to_string()),
            PaymentError::NotInReview { .. } => ApiError::conflict("NOT_IN_REVIEW", err.to_string()),
            PaymentError::OversellDetected { .. }
            | PaymentError::AmountMismatch { .. }
            | PaymentError::AccountMissing { .. }
            | PaymentError::LedgerDrift { .. } => ApiError::conflict("NEEDS_REVIEW", err.to_string()),
            PaymentError::InvalidConfig(_)
            | PaymentError::InvalidUrl(_)
            | PaymentError::ConfigLoadFailed(_)
            | PaymentError::Internal(_) => ApiError::internal(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_core::OrderStatus;
    use turnstile_payments::GatewayError;

    #[test]
    fn test_availability_is_conflict() {
        let err: ApiError = PaymentError::Domain(CoreError::InsufficientAvailability {
            ticket_type_id: "tt-vip".to_string(),
            name: "VIP".to_string(),
            remaining: 3,
            requested: 4,
        })
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.message(), "Only 3 tickets available for VIP");
    }

    #[test]
    fn test_validation_is_unprocessable() {
        let err: ApiError = CoreError::Validation(ValidationError::Required {
            field: "email".to_string(),
        })
        .into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_amount_overflow_is_unprocessable() {
        let err: ApiError = PaymentError::Domain(CoreError::AmountOverflow).into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "AMOUNT_TOO_LARGE");
    }

    #[test]
    fn test_gateway_outage_is_503() {
        let err: ApiError = PaymentError::GatewayUnavailable(GatewayError::Timeout(10)).into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_not_refundable_message() {
        let err: ApiError = PaymentError::NotRefundable {
            order_id: "o-1".to_string(),
            status: OrderStatus::Pending,
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.message(), "Payment cannot be refunded from pending status");
    }

    #[test]
    fn test_refund_races_are_conflicts() {
        let err: ApiError = PaymentError::RefundInProgress {
            order_id: "o-1".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "REFUND_IN_PROGRESS");

        let err: ApiError = PaymentError::NotInReview {
            order_id: "o-1".to_string(),
        }
        .into();
        assert_eq!(err.code(), "NOT_IN_REVIEW");
    }

    #[test]
    fn test_internal_hides_detail() {
        let err: ApiError = DbError::QueryFailed("no such table: orders".to_string()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message().contains("orders"));
    }
}
