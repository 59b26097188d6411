//! # Money Module
//!
//! The `Money` type carries every price, cost, sales and loss figure in the
//! reconciliation engine.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SUMMING HUNDREDS OF ROWS A DAY                                         │
//! │                                                                         │
//! │  With floats, every row adds a little representation error:             │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │  and a month of rows drifts away from the two-decimal display.          │
//! │                                                                         │
//! │  With integer cents the fold is exact:                                  │
//! │    Σ (units × price_cents) is the figure the till would print.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::Money;
//!
//! let price = Money::from_cents(350);        // 3.50
//! let revenue = price.times(12);             // 42.00
//! let cost = Money::from_cents(200).times(12);
//! assert_eq!((revenue - cost).cents(), 1800);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

/// Most decimals [`Money::format_with`] prints; `10^19` is the largest power
/// of ten a `u64` holds.
pub const MAX_FORMAT_DECIMALS: u8 = 19;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount in the smallest currency unit (cents).
///
/// Signed: negative values appear when units sold is negative (a stock
/// correction day), which turns revenue and cost negative together.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from an optional cents column, treating a missing
    /// value as zero.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_optional_cents(Some(250)).cents(), 250);
    /// assert!(Money::from_optional_cents(None).is_zero());
    /// ```
    #[inline]
    pub const fn from_optional_cents(cents: Option<i64>) -> Self {
        match cents {
            Some(c) => Money(c),
            None => Money(0),
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a unit count.
    ///
    /// Saturates instead of overflowing so a corrupt row cannot panic a
    /// report.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(299).times(3).cents(), 897);
    /// assert_eq!(Money::from_cents(299).times(-2).cents(), -598);
    /// ```
    #[inline]
    pub const fn times(&self, units: i64) -> Self {
        Money(self.0.saturating_mul(units))
    }

    /// Formats the amount with a currency symbol and a fixed number of
    /// decimals (e.g. `"$12.34"`, `"-€0.50"`). More than
    /// [`MAX_FORMAT_DECIMALS`] decimals are clamped.
    pub fn format_with(&self, symbol: &str, decimals: u8) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        if decimals == 0 {
            return format!("{sign}{symbol}{abs}");
        }
        let decimals = decimals.min(MAX_FORMAT_DECIMALS);
        let divisor = 10_u64.pow(u32::from(decimals));
        format!(
            "{sign}{symbol}{}.{:0width$}",
            abs / divisor,
            abs % divisor,
            width = decimals as usize
        )
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Two-decimal rendering for logs and tests.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_with("", 2))
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(self.0.saturating_neg())
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
