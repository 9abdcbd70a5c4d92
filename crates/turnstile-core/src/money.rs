//! # Money Module
//!
//! Provides the `Money` type for monetary values and `Rate` for percentage
//! surcharges expressed in basis points.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    306.00 × 0.18 = 55.080000000000005  ❌                               │
//! │                                                                         │
//! │  OUR SOLUTION: integer minor units, rates in basis points               │
//! │    30600 × 1800 / 10000 = 5508 (55.08)  ✓                               │
//! │                                                                         │
//! │  The amount charged by the gateway is the same integer we stored.      │
//! │  Every operation is checked: overflow is None, never a wrap.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use turnstile_core::money::{Money, Rate};
//!
//! let price = Money::from_cents(15_000); // 150.00
//! let subtotal = price.checked_mul(2).unwrap();
//! let fee = subtotal.apply_rate(Rate::from_bps(200)).unwrap();
//! assert_eq!(fee.cents(), 600);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents, paise, kobo).
///
/// The currency itself is carried next to the amount (on the ticket type and
/// the order); an event sells in exactly one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from the smallest currency unit.
    ///
    /// ## Example
    /// ```rust
    /// use turnstile_core::money::Money;
    ///
    /// let price = Money::from_cents(36_108);
    /// assert_eq!(price.to_string(), "361.08");
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in the smallest currency unit.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Applies a basis-point rate, rounding half up.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`, widened to i128 for the
    /// intermediate product. `None` if the result does not fit in i64.
    ///
    /// ## Example
    /// ```rust
    /// use turnstile_core::money::{Money, Rate};
    ///
    /// // 306.00 at 18% = 55.08
    /// let gst = Money::from_cents(30_600).apply_rate(Rate::from_bps(1_800));
    /// assert_eq!(gst.map(|m| m.cents()), Some(5_508));
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Option<Money> {
        let cents = (i128::from(self.0) * i128::from(rate.bps()) + 5_000) / 10_000;
        i64::try_from(cents).ok().map(Money)
    }

    /// Multiplies money by a quantity. `None` on overflow.
    #[inline]
    pub const fn checked_mul(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts. `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Sums amounts, stopping at the first overflow.
    ///
    /// ```rust
    /// use turnstile_core::money::Money;
    ///
    /// let parts = [Money::from_cents(i64::MAX), Money::from_cents(1)];
    /// assert_eq!(Money::checked_sum(parts), None);
    /// ```
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }
}

/// Renders as a plain decimal (`361.08`); the currency code is shown by the caller.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

// =============================================================================
// Rate
// =============================================================================

/// A percentage rate in basis points (1 bps = 0.01%).
///
/// 200 bps = 2% booking fee, 1800 bps = 18% GST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
