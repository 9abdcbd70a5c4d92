//! # Validation Module
//!
//! Input validation for the checkout flow.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractors (axum Json)                                  │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Quantities, prices, duplicate ids, emails                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── CHECK (sold >= 0 AND sold <= available)                           │
//! │  └── UNIQUE booking per order, foreign keys                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::pricing::Selection;
use crate::{MAX_LINE_ITEMS, MAX_PRICE_CENTS, MAX_TICKETS_PER_LINE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a ticket quantity.
///
/// ## Rules
/// - Must be positive (> 0); zero-quantity lines are rejected
/// - Must not exceed `MAX_TICKETS_PER_LINE`
///
/// ## Example
/// ```rust
/// use turnstile_core::validation::validate_quantity;
///
/// assert!(validate_quantity(2).is_ok());
/// assert!(validate_quantity(0).is_err());
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_TICKETS_PER_LINE {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_TICKETS_PER_LINE,
        });
    }

    Ok(())
}

/// Validates a price in the smallest currency unit. Zero is allowed (free entry).
///
/// Capped at `MAX_PRICE_CENTS`, so a full cart stays far inside i64.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a ticket type capacity.
pub fn validate_capacity(available: i64) -> ValidationResult<()> {
    if available < 0 {
        return Err(ValidationError::OutOfRange {
            field: "available".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates a cart of selections.
///
/// ## Rules
/// - At least one and at most `MAX_LINE_ITEMS` selections
/// - Every quantity passes [`validate_quantity`]
/// - A ticket type id appears at most once
pub fn validate_selections(selections: &[Selection]) -> ValidationResult<()> {
    if selections.is_empty() {
        return Err(ValidationError::Required {
            field: "lineItems".to_string(),
        });
    }

    if selections.len() > MAX_LINE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "lineItems".to_string(),
            min: 1,
            max: MAX_LINE_ITEMS as i64,
        });
    }

    let mut seen = HashSet::with_capacity(selections.len());
    for selection in selections {
        if selection.ticket_type_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "ticketTypeId".to_string(),
            });
        }
        validate_quantity(selection.quantity)?;
        if !seen.insert(selection.ticket_type_id.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "ticketTypeId".to_string(),
                value: selection.ticket_type_id.clone(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a buyer email address.
///
/// ## Rules
/// - Non-empty, at most 254 characters
/// - Exactly one `@` with a non-empty local part and a dotted domain
///
/// The gateway performs its own deliverability checks; this only catches
/// obvious typos before an order is created.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "buyerEmail".to_string(),
        });
    }

    if email.len() > 254 {
        return Err(ValidationError::TooLong {
            field: "buyerEmail".to_string(),
            max: 254,
        });
    }

    let invalid = || ValidationError::InvalidFormat {
        field: "buyerEmail".to_string(),
        reason: "must look like name@example.com".to_string(),
    };

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || email.contains(char::is_whitespace)
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err(invalid());
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_TICKETS_PER_LINE).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_TICKETS_PER_LINE + 1).is_err());
    }

    #[test]
    fn test_validate_selections() {
        assert!(validate_selections(&[Selection::new("vip", 2)]).is_ok());
        assert!(validate_selections(&[]).is_err());
        assert!(validate_selections(&[Selection::new("", 1)]).is_err());

        let repeated = [Selection::new("vip", 1), Selection::new("vip", 1)];
        assert!(matches!(
            validate_selections(&repeated),
            Err(ValidationError::Duplicate { .. })
        ));

        let too_many: Vec<Selection> = (0..=MAX_LINE_ITEMS)
            .map(|i| Selection::new(format!("tt-{i}"), 1))
            .collect();
        assert!(validate_selections(&too_many).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("buyer@example.com").is_ok());
        assert!(validate_email("  buyer@mail.example.in ").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("buyer").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("buyer@localhost").is_err());
        assert!(validate_email("a b@example.com").is_err());
        assert!(validate_email("a@b@example.com").is_err());
    }

    #[test]
    fn test_validate_price_and_capacity() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(-1).is_err());
        assert!(validate_price_cents(MAX_PRICE_CENTS).is_ok());
        assert!(validate_price_cents(MAX_PRICE_CENTS + 1).is_err());
        assert!(validate_price_cents(i64::MAX / 20).is_err());
        assert!(validate_capacity(0).is_ok());
        assert!(validate_capacity(-5).is_err());
    }
}
