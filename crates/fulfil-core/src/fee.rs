//! # Delivery Fee Policy
//!
//! Turns a raw courier quote into a billable fee.
//!
//! ```text
//! courier says: { serviceable: true, shipping_charge: 47.0 }
//!                                │
//!                                ▼
//!      to paise (once) ──► round UP to the ₹5 step ──► ₹50.00
//! ```
//!
//! The fee is never rounded down, so the store never undercharges shipping.
//! This module owns the rounding; callers must not round again. Quotes for
//! non-serviceable destinations bill nothing and carry a reason instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::money::{Money, PAISE_PER_RUPEE};

/// The billing step: fees are multiples of ₹5.
pub const DEFAULT_FEE_STEP: Money = Money::from_rupees(5);

// =============================================================================
// Quotes
// =============================================================================

/// What the courier answered, before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourierQuote {
    pub serviceable: bool,
    /// Rupees, as a JSON number.
    pub shipping_charge: f64,
}

/// A billable delivery quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeliveryQuote {
    pub serviceable: bool,
    /// Always a multiple of the fee step; zero when not serviceable.
    pub billable_fee: Money,
    /// Set when `serviceable` is false.
    pub reason: Option<String>,
}

impl DeliveryQuote {
    pub fn not_serviceable(reason: impl Into<String>) -> Self {
        DeliveryQuote {
            serviceable: false,
            billable_fee: Money::zero(),
            reason: Some(reason.into()),
        }
    }
}

/// The courier sent a charge that cannot be a price.
#[derive(Debug, Error, PartialEq)]
#[error("Courier returned an invalid shipping charge: {0}")]
pub struct MalformedQuote(pub f64);

// =============================================================================
// Normalization
// =============================================================================

/// Rounds an amount up to the next multiple of `step`.
///
/// Idempotent: `normalize_fee(normalize_fee(x, s), s) == normalize_fee(x, s)`.
#[inline]
pub fn normalize_fee(amount: Money, step: Money) -> Money {
    amount.round_up_to(step)
}

/// Converts a courier charge in rupees to a billable fee.
///
/// The charge is first taken to the nearest paisa (currency precision),
/// then rounded up to the step.
///
/// ## Example
/// ```rust
/// use fulfil_core::fee::{billable_fee, DEFAULT_FEE_STEP};
/// use fulfil_core::money::Money;
///
/// assert_eq!(billable_fee(47.0, DEFAULT_FEE_STEP).unwrap(), Money::from_rupees(50));
/// assert_eq!(billable_fee(50.0, DEFAULT_FEE_STEP).unwrap(), Money::from_rupees(50));
/// assert_eq!(billable_fee(0.0, DEFAULT_FEE_STEP).unwrap(), Money::zero());
/// assert!(billable_fee(-1.0, DEFAULT_FEE_STEP).is_err());
/// ```
pub fn billable_fee(shipping_charge: f64, step: Money) -> Result<Money, MalformedQuote> {
    if !shipping_charge.is_finite() || shipping_charge < 0.0 {
        return Err(MalformedQuote(shipping_charge));
    }
    let paise = (shipping_charge * PAISE_PER_RUPEE as f64).round();
    if paise > i64::MAX as f64 {
        return Err(MalformedQuote(shipping_charge));
    }
    Ok(normalize_fee(Money::from_paise(paise as i64), step))
}

/// Normalizes a full courier answer.
pub fn normalize_quote(quote: &CourierQuote, step: Money) -> Result<DeliveryQuote, MalformedQuote> {
    if !quote.serviceable {
        return Ok(DeliveryQuote::not_serviceable(
            "courier does not deliver to this pincode",
        ));
    }
    Ok(DeliveryQuote {
        serviceable: true,
        billable_fee: billable_fee(quote.shipping_charge, step)?,
        reason: None,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_scenario_rounding() {
        assert_eq!(billable_fee(47.0, DEFAULT_FEE_STEP).unwrap(), Money::from_rupees(50));
        assert_eq!(billable_fee(50.0, DEFAULT_FEE_STEP).unwrap(), Money::from_rupees(50));
        assert_eq!(billable_fee(0.0, DEFAULT_FEE_STEP).unwrap(), Money::zero());
    }

    #[test]
    fn test_fraction_above_step_rounds_up() {
        assert_eq!(billable_fee(50.01, DEFAULT_FEE_STEP).unwrap(), Money::from_rupees(55));
        assert_eq!(billable_fee(45.5, DEFAULT_FEE_STEP).unwrap(), Money::from_rupees(50));
        assert_eq!(billable_fee(0.1, DEFAULT_FEE_STEP).unwrap(), Money::from_rupees(5));
    }

    #[test]
    fn test_rejects_nonsense_charges() {
        assert!(billable_fee(-0.5, DEFAULT_FEE_STEP).is_err());
        assert!(billable_fee(f64::NAN, DEFAULT_FEE_STEP).is_err());
        assert!(billable_fee(f64::INFINITY, DEFAULT_FEE_STEP).is_err());
    }

    #[test]
    fn test_not_serviceable_bills_nothing() {
        let quote = CourierQuote {
            serviceable: false,
            shipping_charge: 80.0,
        };
        let normalized = normalize_quote(&quote, DEFAULT_FEE_STEP).unwrap();
        assert!(!normalized.serviceable);
        assert_eq!(normalized.billable_fee, Money::zero());
        assert!(normalized.reason.is_some());
    }

    #[test]
    fn test_courier_quote_wire_format() {
        let quote: CourierQuote =
            serde_json::from_str(r#"{"serviceable":true,"shippingCharge":62.3}"#).unwrap();
        assert!(quote.serviceable);
        assert_eq!(
            normalize_quote(&quote, DEFAULT_FEE_STEP).unwrap().billable_fee,
            Money::from_rupees(65)
        );
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent_and_aligned(paise in 0i64..10_000_000) {
            let once = normalize_fee(Money::from_paise(paise), DEFAULT_FEE_STEP);
            prop_assert_eq!(normalize_fee(once, DEFAULT_FEE_STEP), once);
            prop_assert_eq!(once.paise() % DEFAULT_FEE_STEP.paise(), 0);
            prop_assert!(once.paise() >= paise);
            prop_assert!(once.paise() - paise < DEFAULT_FEE_STEP.paise());
        }
    }
}
