//! # Money Module
//!
//! Provides the `Money` type for handling rupee amounts safely.
//!
//! ## Why Integer Paise?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Courier quotes arrive as JSON numbers:                                 │
//! │    47.1 * 3 = 141.29999999999998  ❌ WRONG!                             │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Paise                                            │
//! │    4710 paise * 3 = 14130 paise                                         │
//! │    Floats are converted ONCE at the courier boundary (see `fee`)        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use fulfil_core::money::Money;
//!
//! let price = Money::from_paise(49_900); // ₹499.00
//! let line = price * 2_i64;              // ₹998.00
//! let total = line + Money::from_rupees(50);
//! assert_eq!(total.paise(), 104_800);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::Rate;

/// Paise per rupee.
pub const PAISE_PER_RUPEE: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in paise (the smallest INR unit).
///
/// ## Design Decisions
/// - **i64 (signed)**: differences such as `grand_total - paid` may go negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - Serialized as a bare integer of paise
///
/// ## Where Money Flows
/// ```text
/// CartLine.unit_price ──► line total ──► OrderTotals.sub_total
///                                              │
///           GST (Rate) ──► cgst/sgst ──────────┤
///           Coupon ──────► discount ───────────┤
///           Courier ─────► shipping_fee ───────┴──► grand_total
///
/// ReturnRequest ──► refund_amount + gst_reversal_amount
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from paise.
    ///
    /// ## Example
    /// ```rust
    /// use fulfil_core::money::Money;
    ///
    /// let fee = Money::from_paise(5_000);
    /// assert_eq!(fee.rupees(), 50);
    /// ```
    #[inline]
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    /// Creates a Money value from whole rupees.
    #[inline]
    pub const fn from_rupees(rupees: i64) -> Self {
        Money(rupees * PAISE_PER_RUPEE)
    }

    /// Returns the value in paise.
    #[inline]
    pub const fn paise(&self) -> i64 {
        self.0
    }

    /// Returns the whole-rupee portion (truncated toward zero).
    #[inline]
    pub const fn rupees(&self) -> i64 {
        self.0 / PAISE_PER_RUPEE
    }

    /// Returns the paise portion (always 0-99).
    #[inline]
    pub const fn paise_part(&self) -> i64 {
        (self.0 % PAISE_PER_RUPEE).abs()
    }

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

    /// Returns `self * rate`, rounded half up to the nearest paisa.
    ///
    /// Used for GST on a line and for PERCENTAGE coupons.
    ///
    /// ## Example
    /// ```rust
    /// use fulfil_core::money::Money;
    /// use fulfil_core::types::Rate;
    ///
    /// let cart = Money::from_rupees(2000);
    /// let discount = cart.percentage(Rate::from_percent(20));
    /// assert_eq!(discount, Money::from_rupees(400));
    /// ```
    pub fn percentage(&self, rate: Rate) -> Money {
        // i128 keeps large carts from overflowing
        let share = (self.0 as i128 * rate.bps() as i128 + 5_000) / 10_000;
        Money(share as i64)
    }

    /// Multiplies a unit price by a line quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: u32) -> Self {
        Money(self.0 * qty as i64)
    }

    /// Rounds up to the next multiple of `step`.
    ///
    /// Already-aligned values are returned unchanged, so the operation is
    /// idempotent. A non-positive step leaves the value as is.
    ///
    /// ## Example
    /// ```rust
    /// use fulfil_core::money::Money;
    ///
    /// let step = Money::from_rupees(5);
    /// assert_eq!(Money::from_rupees(47).round_up_to(step), Money::from_rupees(50));
    /// assert_eq!(Money::from_rupees(50).round_up_to(step), Money::from_rupees(50));
    /// ```
    pub fn round_up_to(&self, step: Money) -> Money {
        if step.0 <= 0 {
            return *self;
        }
        let remainder = self.0.rem_euclid(step.0);
        if remainder == 0 {
            *self
        } else {
            Money(self.0 - remainder + step.0)
        }
    }

    /// Splits an amount into two halves that always sum to the original.
    ///
    /// The first half is the floor; the second absorbs the odd paisa.
    /// Used to divide a line's GST into CGST and SGST.
    pub fn split_even(&self) -> (Money, Money) {
        let first = self.0.div_euclid(2);
        (Money(first), Money(self.0 - first))
    }

    /// Returns `self × part / whole`, rounded half up.
    ///
    /// Returns zero when `whole` is not positive.
    ///
    /// ## Example
    /// ```rust
    /// use fulfil_core::money::Money;
    ///
    /// let tax = Money::from_rupees(180);
    /// let share = tax.prorate(Money::from_rupees(250), Money::from_rupees(1000));
    /// assert_eq!(share, Money::from_rupees(45));
    /// ```
    pub fn prorate(&self, part: Money, whole: Money) -> Money {
        if whole.0 <= 0 {
            return Money::zero();
        }
        let numerator = self.0 as i128 * part.0 as i128 * 2 + whole.0 as i128;
        let denominator = whole.0 as i128 * 2;
        Money(numerator.div_euclid(denominator) as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly rendering, e.g. `₹104.50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}₹{}.{:02}",
            sign,
            self.rupees().abs(),
            self.paise_part()
        )
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

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: u32) -> Self {
        Money(self.0 * qty as i64)
    }
}

impl Sum for Money {
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
    fn test_from_paise() {
        let money = Money::from_paise(10_450);
        assert_eq!(money.paise(), 10_450);
        assert_eq!(money.rupees(), 104);
        assert_eq!(money.paise_part(), 50);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_paise(10_450).to_string(), "₹104.50");
        assert_eq!(Money::from_rupees(5).to_string(), "₹5.00");
        assert_eq!(Money::from_paise(-550).to_string(), "-₹5.50");
        assert_eq!(Money::zero().to_string(), "₹0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_rupees(10);
        let b = Money::from_rupees(5);

        assert_eq!((a + b).rupees(), 15);
        assert_eq!((a - b).rupees(), 5);
        assert_eq!((a * 3_i64).rupees(), 30);
        assert_eq!(a.multiply_quantity(4).rupees(), 40);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.rupees(), 20);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        // ₹10.05 at 5% = 50.25 paise → 50
        assert_eq!(Money::from_paise(1_005).percentage(Rate::from_bps(500)).paise(), 50);
        // ₹0.10 at 5% = 0.5 paise → 1
        assert_eq!(Money::from_paise(10).percentage(Rate::from_bps(500)).paise(), 1);
    }

    #[test]
    fn test_round_up_to_step() {
        let step = Money::from_rupees(5);
        assert_eq!(Money::from_rupees(47).round_up_to(step), Money::from_rupees(50));
        assert_eq!(Money::from_rupees(50).round_up_to(step), Money::from_rupees(50));
        assert_eq!(Money::zero().round_up_to(step), Money::zero());
        assert_eq!(Money::from_paise(5_001).round_up_to(step), Money::from_rupees(55));
        assert_eq!(Money::from_paise(1).round_up_to(step), Money::from_rupees(5));
    }

    #[test]
    fn test_round_up_ignores_non_positive_step() {
        let amount = Money::from_paise(4_711);
        assert_eq!(amount.round_up_to(Money::zero()), amount);
    }

    #[test]
    fn test_split_even_sums_to_original() {
        let (cgst, sgst) = Money::from_paise(181).split_even();
        assert_eq!(cgst.paise(), 90);
        assert_eq!(sgst.paise(), 91);
        assert_eq!(cgst + sgst, Money::from_paise(181));
    }

    #[test]
    fn test_prorate() {
        let tax = Money::from_rupees(360);
        assert_eq!(
            tax.prorate(Money::from_rupees(500), Money::from_rupees(2000)),
            Money::from_rupees(90)
        );
        // 100 × 1/3 = 33.33 → 33
        assert_eq!(
            Money::from_paise(100).prorate(Money::from_paise(1), Money::from_paise(3)),
            Money::from_paise(33)
        );
        assert_eq!(tax.prorate(Money::from_rupees(1), Money::zero()), Money::zero());
    }
}
