//! # Return & Refund Computation
//!
//! Computes what a customer gets back when a return is approved.
//!
//! ## Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  refund_amount        = Σ unit_price × returned_qty   (tax-exclusive)  │
//! │  gst_reversal_amount  = tax_total × refund_amount / sub_total          │
//! │                         (exactly tax_total on a full return)           │
//! │                                                                         │
//! │  Both are owed to the customer. They are shown as two line items and   │
//! │  the payout is their SUM; GST reversal is never deducted.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Shipping fees and coupon discounts are not part of the refund.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreResult;
use crate::money::Money;
use crate::types::{CartLine, OrderTotals, ReturnLine};
use crate::validation::resolve_return_lines;

/// The monetary effect of an approved return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RefundBreakdown {
    /// Product value of the returned units, tax-exclusive.
    pub refund_amount: Money,
    /// CGST + SGST attributable to the returned units.
    pub gst_reversal_amount: Money,
    /// Every unit of every line came back.
    pub full_return: bool,
}

impl RefundBreakdown {
    /// What is paid out: product value plus reversed tax.
    #[inline]
    pub fn total_restitution(&self) -> Money {
        self.refund_amount + self.gst_reversal_amount
    }
}

/// Computes the refund for a selection of returned units.
///
/// An empty selection returns everything.
///
/// ## Example
/// ```rust
/// use fulfil_core::money::Money;
/// use fulfil_core::refund::compute_refund;
/// use fulfil_core::types::{CartLine, OrderTotals, ReturnLine};
///
/// let lines = vec![
///     CartLine::new("A", 1, Money::from_rupees(1000)),
///     CartLine::new("B", 1, Money::from_rupees(1000)),
/// ];
/// let totals = OrderTotals::compute(&lines, Money::zero(), Money::zero());
///
/// let half = compute_refund(&lines, &totals, &[ReturnLine { line_index: 1, quantity: 1 }]).unwrap();
/// assert_eq!(half.refund_amount, Money::from_rupees(1000));
/// assert_eq!(half.gst_reversal_amount, Money::from_rupees(180));
/// ```
pub fn compute_refund(
    lines: &[CartLine],
    totals: &OrderTotals,
    selection: &[ReturnLine],
) -> CoreResult<RefundBreakdown> {
    let returned = resolve_return_lines(lines, selection)?;

    let refund_amount: Money = returned
        .iter()
        .map(|r| lines[r.line_index].unit_price.multiply_quantity(r.quantity))
        .sum();

    let full_return = returned.len() == lines.len()
        && returned
            .iter()
            .all(|r| r.quantity == lines[r.line_index].quantity);

    let gst_reversal_amount = if full_return {
        totals.tax_total
    } else {
        totals.tax_total.prorate(refund_amount, totals.sub_total)
    };

    Ok(RefundBreakdown {
        refund_amount,
        gst_reversal_amount,
        full_return,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rate;

    fn order_lines() -> Vec<CartLine> {
        let mut shirt = CartLine::new("SHIRT", 2, Money::from_rupees(750));
        shirt.gst_rate = Rate::from_percent(12);
        let shoes = CartLine::new("SHOES", 1, Money::from_rupees(2500));
        vec![shirt, shoes]
    }

    #[test]
    fn test_full_return_reverses_all_tax() {
        let lines = order_lines();
        let totals = OrderTotals::compute(&lines, Money::from_rupees(100), Money::from_rupees(50));
        let refund = compute_refund(&lines, &totals, &[]).unwrap();

        assert!(refund.full_return);
        assert_eq!(refund.refund_amount, totals.sub_total);
        assert_eq!(refund.gst_reversal_amount, totals.tax_total);
        assert_eq!(refund.total_restitution(), totals.sub_total + totals.tax_total);
    }

    #[test]
    fn test_discount_is_not_clawed_back() {
        let lines = vec![CartLine::new("KURTA", 2, Money::from_rupees(1000))];
        let totals = OrderTotals::compute(&lines, Money::from_rupees(100), Money::from_rupees(50));
        let refund = compute_refund(&lines, &totals, &[]).unwrap();

        let paid_without_shipping = totals.grand_total - totals.shipping_fee;
        assert_eq!(paid_without_shipping, Money::from_rupees(2260));
        assert_eq!(refund.total_restitution(), Money::from_rupees(2360));
        assert_eq!(
            refund.total_restitution() - paid_without_shipping,
            totals.discount
        );
    }

    #[test]
    fn test_explicit_full_selection_is_full_return() {
        let lines = order_lines();
        let totals = OrderTotals::compute(&lines, Money::zero(), Money::zero());
        let selection = [
            ReturnLine { line_index: 1, quantity: 1 },
            ReturnLine { line_index: 0, quantity: 2 },
        ];
        let refund = compute_refund(&lines, &totals, &selection).unwrap();
        assert!(refund.full_return);
        assert_eq!(refund.gst_reversal_amount, totals.tax_total);
    }

    #[test]
    fn test_partial_return_is_proportional() {
        let lines = order_lines();
        // sub_total 4000, tax 180 + 450 = 630
        let totals = OrderTotals::compute(&lines, Money::zero(), Money::zero());
        assert_eq!(totals.tax_total, Money::from_rupees(630));

        let refund = compute_refund(&lines, &totals, &[ReturnLine { line_index: 0, quantity: 1 }]).unwrap();
        assert!(!refund.full_return);
        assert_eq!(refund.refund_amount, Money::from_rupees(750));
        // 630 × 750 / 4000 = 118.125
        assert_eq!(refund.gst_reversal_amount, Money::from_paise(11_813));
    }

    #[test]
    fn test_invalid_selection_is_validation_error() {
        let lines = order_lines();
        let totals = OrderTotals::compute(&lines, Money::zero(), Money::zero());
        let err = compute_refund(&lines, &totals, &[ReturnLine { line_index: 0, quantity: 3 }]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }
}
