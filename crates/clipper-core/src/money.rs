//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                  │
//! │                                                              │
//! │  In floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                │
//! │                                                              │
//! │  OUR SOLUTION: Integer Minor Units                           │
//! │    Every amount is an i64 in the currency's smallest unit.   │
//! │    Rounding happens exactly once, explicitly, per discount.  │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use clipper_core::money::Money;
//!
//! let list_price = Money::from_minor(30_000);
//!
//! // 10% off, rounded half-up
//! let discount = list_price.percent_of(10);
//! assert_eq!(discount.minor(), 3_000);
//!
//! // Line totals never go negative
//! let net = (list_price - Money::from_minor(40_000)).floor_zero();
//! assert!(net.is_zero());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: intermediate results may dip negative before the
///   explicit `floor_zero` at the end of pricing
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Derives**: full serde support; transparent sqlx column mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use clipper_core::money::Money;
    ///
    /// let price = Money::from_minor(15_000);
    /// assert_eq!(price.minor(), 15_000);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Computes `rate` percent of this amount, rounded half-up.
    ///
    /// ## Implementation
    /// Integer math: `(amount * rate + 50) / 100`. The `+50` provides the
    /// half-up rounding (50/100 = 0.5). i128 widening prevents overflow on
    /// large amounts.
    ///
    /// ## Example
    /// ```rust
    /// use clipper_core::money::Money;
    ///
    /// let price = Money::from_minor(20_000);
    /// assert_eq!(price.percent_of(10).minor(), 2_000);
    ///
    /// // 12,345 at 10% = 1,234.5 → rounds up to 1,235
    /// assert_eq!(Money::from_minor(12_345).percent_of(10).minor(), 1_235);
    /// ```
    pub fn percent_of(&self, rate: i64) -> Money {
        let amount = (self.0 as i128 * rate as i128 + 50) / 100;
        Money::from_minor(amount as i64)
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use clipper_core::money::Money;
    ///
    /// let unit_price = Money::from_minor(5_000);
    /// assert_eq!(unit_price.multiply_quantity(3).minor(), 15_000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Floors the value at zero.
    ///
    /// Over-applied prepaid usage or discounts must never show as negative
    /// revenue on a line.
    ///
    /// ## Example
    /// ```rust
    /// use clipper_core::money::Money;
    ///
    /// assert_eq!(Money::from_minor(-500).floor_zero().minor(), 0);
    /// assert_eq!(Money::from_minor(500).floor_zero().minor(), 500);
    /// ```
    #[inline]
    pub const fn floor_zero(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly display of the raw minor amount.
///
/// ## Note
/// Currency formatting is the embedding layer's job; the core stays
/// currency-agnostic.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by i64 (for quantity calculations).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor() {
        let money = Money::from_minor(30_000);
        assert_eq!(money.minor(), 30_000);
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1_000);
        let b = Money::from_minor(500);

        assert_eq!((a + b).minor(), 1_500);
        assert_eq!((a - b).minor(), 500);
        assert_eq!((a * 3).minor(), 3_000);
    }

    #[test]
    fn test_percent_of_exact() {
        let price = Money::from_minor(20_000);
        assert_eq!(price.percent_of(10).minor(), 2_000);
        assert_eq!(price.percent_of(0).minor(), 0);
        assert_eq!(price.percent_of(100).minor(), 20_000);
    }

    #[test]
    fn test_percent_of_rounds_half_up() {
        // 12,345 * 10% = 1,234.5 → 1,235
        assert_eq!(Money::from_minor(12_345).percent_of(10).minor(), 1_235);
        // 333 * 50% = 166.5 → 167
        assert_eq!(Money::from_minor(333).percent_of(50).minor(), 167);
        // 334 * 50% = 167.0 → 167
        assert_eq!(Money::from_minor(334).percent_of(50).minor(), 167);
    }

    #[test]
    fn test_floor_zero() {
        assert_eq!(Money::from_minor(-500).floor_zero().minor(), 0);
        assert_eq!(Money::from_minor(0).floor_zero().minor(), 0);
        assert_eq!(Money::from_minor(500).floor_zero().minor(), 500);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let negative = Money::from_minor(-100);
        assert!(negative.is_negative());
        assert_eq!(negative.abs().minor(), 100);
    }

    #[test]
    fn test_sum() {
        let total: Money = [3_000, 1_500, 500]
            .into_iter()
            .map(Money::from_minor)
            .sum();
        assert_eq!(total.minor(), 5_000);
    }

    #[test]
    fn test_display_is_raw_minor_units() {
        assert_eq!(format!("{}", Money::from_minor(1_099)), "1099");
        assert_eq!(format!("{}", Money::from_minor(-550)), "-550");
    }
}
