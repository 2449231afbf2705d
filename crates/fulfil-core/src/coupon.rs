//! # Coupon Validation
//!
//! Decides whether a coupon applies to a cart and how much it takes off.
//!
//! ## Policy (first failing check wins)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. coupon exists, is active, and `now` is inside its window           │
//! │        └── else NotFound                                               │
//! │  2. cart_value ≥ min_order_value                                       │
//! │        └── else PolicyError::MinOrderValue                             │
//! │  3. first-order-only ⇒ caller has no prior completed order             │
//! │        └── else PolicyError::FirstOrderOnly                            │
//! │                                                                         │
//! │  FLAT        discount = min(value, cart_value)                          │
//! │  PERCENTAGE  discount = min(cart_value × rate, max_discount?)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps 1-2 are [`precheck`]; step 3 plus the discount is [`apply`]. The
//! split lets an async caller look up order history only for coupons that
//! need it. [`evaluate`] runs all three for callers that already know.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, PolicyError, ValidationError};
use crate::money::Money;
use crate::types::Rate;
use crate::validation::ValidationResult;

/// Longest accepted coupon code.
pub const MAX_CODE_LEN: usize = 32;

// =============================================================================
// Coupon Definition
// =============================================================================

/// How a coupon computes its discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountRule {
    /// A fixed amount off.
    Flat { value: Money },
    /// A share of the cart value, optionally capped.
    Percentage {
        value: Rate,
        max_discount: Option<Money>,
    },
}

/// Admin-owned coupon reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Coupon {
    /// Normalized (trimmed, upper-case) code.
    pub code: String,
    pub rule: DiscountRule,
    #[serde(default)]
    pub min_order_value: Money,
    #[serde(default)]
    pub is_first_order_only: bool,
    #[ts(as = "String")]
    pub valid_from: DateTime<Utc>,
    /// Inclusive end of the window; `None` never expires.
    #[ts(as = "Option<String>")]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Coupon {
    /// Builds a coupon, normalizing the code and checking the rule.
    pub fn new(
        code: &str,
        rule: DiscountRule,
        min_order_value: Money,
        is_first_order_only: bool,
        valid_from: DateTime<Utc>,
        valid_until: Option<DateTime<Utc>>,
    ) -> ValidationResult<Self> {
        let coupon = Coupon {
            code: normalize_code(code),
            rule,
            min_order_value,
            is_first_order_only,
            valid_from,
            valid_until,
            is_active: true,
        };
        coupon.validate()?;
        Ok(coupon)
    }

    /// Checks the definition itself (used on construction and on load).
    pub fn validate(&self) -> ValidationResult<()> {
        validate_code(&self.code)?;
        if self.min_order_value.is_negative() {
            return Err(ValidationError::Negative {
                field: "min_order_value".to_string(),
            });
        }
        match self.rule {
            DiscountRule::Flat { value } => {
                if !value.is_positive() {
                    return Err(ValidationError::MustBePositive {
                        field: "value".to_string(),
                    });
                }
            }
            DiscountRule::Percentage {
                value,
                max_discount,
            } => {
                if value.is_zero() || value.bps() > Rate::FULL_BPS {
                    return Err(ValidationError::OutOfRange {
                        field: "value".to_string(),
                        min: 1,
                        max: Rate::FULL_BPS as i64,
                    });
                }
                if let Some(cap) = max_discount {
                    if !cap.is_positive() {
                        return Err(ValidationError::MustBePositive {
                            field: "max_discount".to_string(),
                        });
                    }
                }
            }
        }
        if let Some(until) = self.valid_until {
            if until < self.valid_from {
                return Err(ValidationError::invalid(
                    "valid_until",
                    "ends before valid_from",
                ));
            }
        }
        Ok(())
    }

    /// Returns true if the coupon can be redeemed at `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && now >= self.valid_from
            && self.valid_until.map_or(true, |until| now <= until)
    }

    /// The discount for a cart value, bounded by the cart value and any cap.
    pub fn discount_for(&self, cart_value: Money) -> Money {
        if !cart_value.is_positive() {
            return Money::zero();
        }
        let raw = match self.rule {
            DiscountRule::Flat { value } => value,
            DiscountRule::Percentage {
                value,
                max_discount,
            } => {
                let share = cart_value.percentage(value);
                match max_discount {
                    Some(cap) => share.min(cap),
                    None => share,
                }
            }
        };
        raw.min(cart_value).max(Money::zero())
    }
}

// =============================================================================
// Applied Coupon
// =============================================================================

/// The coupon currently attached to a cart or order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppliedCoupon {
    pub code: String,
    pub discount: Money,
    /// The cart value the discount was computed against.
    pub cart_value: Money,
}

// =============================================================================
// Codes
// =============================================================================

/// Normalizes a code for lookup: trimmed and ASCII upper-case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Validates a (normalized) coupon code.
pub fn validate_code(code: &str) -> ValidationResult<()> {
    if code.is_empty() {
        return Err(ValidationError::required("code"));
    }
    if code.len() > MAX_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_CODE_LEN,
        });
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::invalid(
            "code",
            "must contain only letters, numbers, hyphens, and underscores",
        ));
    }
    Ok(())
}

// =============================================================================
// Evaluation
// =============================================================================

/// Steps 1 and 2: existence/window and minimum order value.
pub fn precheck<'a>(
    coupon: Option<&'a Coupon>,
    code: &str,
    cart_value: Money,
    now: DateTime<Utc>,
) -> CoreResult<&'a Coupon> {
    let code = normalize_code(code);
    let coupon = coupon
        .filter(|c| c.code == code && c.is_live_at(now))
        .ok_or_else(|| CoreError::not_found("coupon", code.clone()))?;

    if cart_value < coupon.min_order_value {
        return Err(PolicyError::MinOrderValue {
            code,
            required: coupon.min_order_value,
            actual: cart_value,
        }
        .into());
    }
    Ok(coupon)
}

/// Step 3 and the discount computation.
pub fn apply(
    coupon: &Coupon,
    cart_value: Money,
    has_prior_completed_order: bool,
) -> CoreResult<AppliedCoupon> {
    if coupon.is_first_order_only && has_prior_completed_order {
        return Err(PolicyError::FirstOrderOnly {
            code: coupon.code.clone(),
        }
        .into());
    }
    Ok(AppliedCoupon {
        code: coupon.code.clone(),
        discount: coupon.discount_for(cart_value),
        cart_value,
    })
}

/// Runs the full policy.
///
/// ## Example
/// ```rust
/// use chrono::{Duration, Utc};
/// use fulfil_core::coupon::{evaluate, Coupon, DiscountRule};
/// use fulfil_core::money::Money;
/// use fulfil_core::types::Rate;
///
/// let now = Utc::now();
/// let coupon = Coupon::new(
///     "festive20",
///     DiscountRule::Percentage { value: Rate::from_percent(20), max_discount: Some(Money::from_rupees(300)) },
///     Money::zero(),
///     false,
///     now - Duration::days(1),
///     None,
/// ).unwrap();
///
/// let applied = evaluate(Some(&coupon), "FESTIVE20", Money::from_rupees(2000), false, now).unwrap();
/// assert_eq!(applied.discount, Money::from_rupees(300));
/// ```
pub fn evaluate(
    coupon: Option<&Coupon>,
    code: &str,
    cart_value: Money,
    has_prior_completed_order: bool,
    now: DateTime<Utc>,
) -> CoreResult<AppliedCoupon> {
    let coupon = precheck(coupon, code, cart_value, now)?;
    apply(coupon, cart_value, has_prior_completed_order)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn flat(value_rupees: i64, min_rupees: i64) -> Coupon {
        Coupon::new(
            "FLAT100",
            DiscountRule::Flat {
                value: Money::from_rupees(value_rupees),
            },
            Money::from_rupees(min_rupees),
            false,
            Utc::now() - Duration::days(1),
            Some(Utc::now() + Duration::days(1)),
        )
        .unwrap()
    }

    fn percent(pct: u32, cap_rupees: Option<i64>) -> Coupon {
        Coupon::new(
            "PCT",
            DiscountRule::Percentage {
                value: Rate::from_percent(pct),
                max_discount: cap_rupees.map(Money::from_rupees),
            },
            Money::zero(),
            false,
            Utc::now() - Duration::days(1),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_percentage_capped() {
        let coupon = percent(20, Some(300));
        let applied = evaluate(Some(&coupon), "pct", Money::from_rupees(2000), false, Utc::now()).unwrap();
        assert_eq!(applied.discount, Money::from_rupees(300));
        assert_eq!(applied.cart_value, Money::from_rupees(2000));
    }

    #[test]
    fn test_percentage_uncapped() {
        let coupon = percent(20, None);
        assert_eq!(coupon.discount_for(Money::from_rupees(2000)), Money::from_rupees(400));
    }

    #[test]
    fn test_flat_never_exceeds_cart() {
        let coupon = flat(100, 0);
        assert_eq!(coupon.discount_for(Money::from_rupees(60)), Money::from_rupees(60));
        assert_eq!(coupon.discount_for(Money::from_rupees(600)), Money::from_rupees(100));
    }

    #[test]
    fn test_unknown_code_is_not_found() {
        let err = evaluate(None, "NOPE", Money::from_rupees(100), false, Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "coupon", .. }));
    }

    #[test]
    fn test_expired_or_inactive_is_not_found() {
        let mut coupon = flat(100, 0);
        let later = Utc::now() + Duration::days(2);
        assert!(matches!(
            evaluate(Some(&coupon), "FLAT100", Money::from_rupees(500), false, later),
            Err(CoreError::NotFound { .. })
        ));

        coupon.is_active = false;
        assert!(matches!(
            evaluate(Some(&coupon), "FLAT100", Money::from_rupees(500), false, Utc::now()),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_min_order_value_checked_before_first_order() {
        let mut coupon = flat(100, 999);
        coupon.is_first_order_only = true;
        let err = evaluate(Some(&coupon), "FLAT100", Money::from_rupees(500), true, Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Policy(PolicyError::MinOrderValue { .. })
        ));
    }

    #[test]
    fn test_first_order_only() {
        let mut coupon = flat(100, 0);
        coupon.is_first_order_only = true;
        assert!(evaluate(Some(&coupon), "FLAT100", Money::from_rupees(500), false, Utc::now()).is_ok());
        assert!(matches!(
            evaluate(Some(&coupon), "FLAT100", Money::from_rupees(500), true, Utc::now()),
            Err(CoreError::Policy(PolicyError::FirstOrderOnly { .. }))
        ));
    }

    #[test]
    fn test_invalid_definitions_rejected() {
        let now = Utc::now();
        assert!(Coupon::new("X", DiscountRule::Flat { value: Money::zero() }, Money::zero(), false, now, None).is_err());
        assert!(Coupon::new(
            "X",
            DiscountRule::Percentage { value: Rate::from_percent(101), max_discount: None },
            Money::zero(),
            false,
            now,
            None
        )
        .is_err());
        assert!(Coupon::new("has space", DiscountRule::Flat { value: Money::from_rupees(1) }, Money::zero(), false, now, None).is_err());
        assert!(Coupon::new(
            "X",
            DiscountRule::Flat { value: Money::from_rupees(1) },
            Money::zero(),
            false,
            now,
            Some(now - Duration::days(1))
        )
        .is_err());
    }

    #[test]
    fn test_coupon_json_shape() {
        let json = r#"{
            "code": "WELCOME50",
            "rule": { "type": "PERCENTAGE", "value": 5000, "max_discount": 25000 },
            "is_first_order_only": true,
            "valid_from": "2026-01-01T00:00:00Z",
            "valid_until": null
        }"#;
        let coupon: Coupon = serde_json::from_str(json).unwrap();
        assert!(coupon.is_active);
        assert!(coupon.validate().is_ok());
        assert_eq!(coupon.discount_for(Money::from_rupees(1000)), Money::from_rupees(250));
    }

    proptest! {
        #[test]
        fn prop_discount_bounded(
            cart in 0i64..10_000_000,
            flat_value in 1i64..1_000_000,
            pct in 1u32..=100,
            cap in proptest::option::of(1i64..1_000_000),
        ) {
            let cart = Money::from_paise(cart);

            let mut flat_coupon = flat(1, 0);
            flat_coupon.rule = DiscountRule::Flat { value: Money::from_paise(flat_value) };
            prop_assert!(flat_coupon.discount_for(cart) <= cart);

            let mut pct_coupon = percent(1, None);
            pct_coupon.rule = DiscountRule::Percentage {
                value: Rate::from_percent(pct),
                max_discount: cap.map(Money::from_paise),
            };
            let discount = pct_coupon.discount_for(cart);
            prop_assert!(discount <= cart);
            prop_assert!(!discount.is_negative());
            if let Some(cap) = cap {
                prop_assert!(discount <= Money::from_paise(cap));
            }
        }
    }
}
