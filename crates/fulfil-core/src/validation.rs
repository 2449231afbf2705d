//! # Validation Module
//!
//! Input validation for cart lines, destinations and return requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Storefront / admin forms                                     │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Cart lines before they enter a draft                              │
//! │  ├── Destination pincode before a courier lookup                       │
//! │  └── Return evidence and COD bank details                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Lifecycle rules (status, return window) in `lifecycle`       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use fulfil_core::validation::{validate_pincode, validate_quantity};
//!
//! validate_pincode("560001").unwrap();
//! validate_quantity(3).unwrap();
//! assert!(validate_pincode("56001").is_err());
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::types::{BankDetails, CartLine, PackageInfo, PaymentMethod, ReturnLine};
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted return reason.
pub const MAX_REASON_LEN: usize = 1000;

// =============================================================================
// Cart Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be at least 1
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: u32) -> ValidationResult<()> {
    if qty == 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY as i64,
        });
    }

    Ok(())
}

/// Validates package data: weight and every dimension must be finite and ≥ 0.
pub fn validate_package_info(info: &PackageInfo) -> ValidationResult<()> {
    check_measure("weight", info.weight)?;
    if let Some(dims) = info.dimensions {
        check_measure("length", dims.length)?;
        check_measure("width", dims.width)?;
        check_measure("height", dims.height)?;
    }
    Ok(())
}

fn check_measure(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() {
        return Err(ValidationError::invalid(field, "must be a finite number"));
    }
    if value < 0.0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a cart line before it enters a draft.
pub fn validate_cart_line(line: &CartLine) -> ValidationResult<()> {
    if line.product_ref.trim().is_empty() {
        return Err(ValidationError::required("product_ref"));
    }
    validate_quantity(line.quantity)?;
    if line.unit_price.is_negative() {
        return Err(ValidationError::Negative {
            field: "unit_price".to_string(),
        });
    }
    if line.unit_mrp.is_negative() {
        return Err(ValidationError::Negative {
            field: "unit_mrp".to_string(),
        });
    }
    if line.gst_rate.bps() > crate::types::Rate::FULL_BPS {
        return Err(ValidationError::OutOfRange {
            field: "gst_rate".to_string(),
            min: 0,
            max: crate::types::Rate::FULL_BPS as i64,
        });
    }
    if let Some(info) = &line.package_info {
        validate_package_info(info)?;
    }
    Ok(())
}

/// Validates the number of distinct lines a cart may hold after adding one.
pub fn validate_cart_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 0,
            max: MAX_CART_LINES as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Destination Validators
// =============================================================================

/// Validates an Indian postal pincode.
///
/// ## Rules
/// - Exactly 6 ASCII digits
/// - First digit is 1-9
///
/// ## Example
/// ```rust
/// use fulfil_core::validation::validate_pincode;
///
/// assert!(validate_pincode("110001").is_ok());
/// assert!(validate_pincode("011001").is_err());
/// assert!(validate_pincode("11000A").is_err());
/// ```
pub fn validate_pincode(pincode: &str) -> ValidationResult<()> {
    let pincode = pincode.trim();
    if pincode.is_empty() {
        return Err(ValidationError::required("pincode"));
    }
    if pincode.len() != 6 || !pincode.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::invalid("pincode", "must be 6 digits"));
    }
    if pincode.starts_with('0') {
        return Err(ValidationError::invalid("pincode", "cannot start with 0"));
    }
    Ok(())
}

// =============================================================================
// Return Request Validators
// =============================================================================

/// Validates the customer's stated reason for a return.
pub fn validate_reason(reason: &str) -> ValidationResult<()> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ValidationError::required("reason"));
    }
    if reason.chars().count() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LEN,
        });
    }
    Ok(())
}

/// Validates evidence image references: at least one, none blank.
pub fn validate_images(images: &[String]) -> ValidationResult<()> {
    if images.is_empty() {
        return Err(ValidationError::required("images"));
    }
    if images.iter().any(|url| url.trim().is_empty()) {
        return Err(ValidationError::invalid("images", "image reference is blank"));
    }
    Ok(())
}

/// Validates an IFSC code: 4 letters, a literal `0`, then 6 letters/digits.
///
/// ## Example
/// ```rust
/// use fulfil_core::validation::validate_ifsc;
///
/// assert!(validate_ifsc("HDFC0001234").is_ok());
/// assert!(validate_ifsc("HDFC1001234").is_err());
/// ```
pub fn validate_ifsc(ifsc: &str) -> ValidationResult<()> {
    let ifsc = ifsc.trim();
    if ifsc.is_empty() {
        return Err(ValidationError::required("ifsc"));
    }
    let bytes = ifsc.as_bytes();
    let well_formed = bytes.len() == 11
        && bytes[..4].iter().all(u8::is_ascii_alphabetic)
        && bytes[4] == b'0'
        && bytes[5..].iter().all(u8::is_ascii_alphanumeric);
    if !well_formed {
        return Err(ValidationError::invalid(
            "ifsc",
            "expected 4 letters, a 0, then 6 letters or digits",
        ));
    }
    Ok(())
}

/// Validates a bank account number: 9 to 18 digits.
pub fn validate_account_number(account: &str) -> ValidationResult<()> {
    let account = account.trim();
    if account.is_empty() {
        return Err(ValidationError::required("account_number"));
    }
    if !(9..=18).contains(&account.len()) || !account.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::invalid(
            "account_number",
            "must be 9 to 18 digits",
        ));
    }
    Ok(())
}

/// Validates refund bank details.
///
/// Required (and must be complete) only for COD orders; prepaid orders are
/// refunded to the original instrument and any supplied details are ignored.
pub fn validate_bank_details(
    payment_method: PaymentMethod,
    details: Option<&BankDetails>,
) -> ValidationResult<()> {
    if !payment_method.is_cod() {
        return Ok(());
    }
    let details = details.ok_or_else(|| ValidationError::required("bank_details"))?;
    validate_account_number(&details.account_number)?;
    validate_ifsc(&details.ifsc)?;
    if details.holder_name.trim().is_empty() {
        return Err(ValidationError::required("holder_name"));
    }
    Ok(())
}

/// Resolves a return selection against the order's lines.
///
/// An empty selection means every line at its full quantity. Otherwise each
/// index must exist, appear once, and return between 1 and the ordered quantity.
pub fn resolve_return_lines(
    lines: &[CartLine],
    selection: &[ReturnLine],
) -> ValidationResult<Vec<ReturnLine>> {
    if selection.is_empty() {
        return Ok(lines
            .iter()
            .enumerate()
            .map(|(line_index, line)| ReturnLine {
                line_index,
                quantity: line.quantity,
            })
            .collect());
    }

    let mut seen = HashSet::new();
    for item in selection {
        let line = lines.get(item.line_index).ok_or_else(|| ValidationError::OutOfRange {
            field: "line_index".to_string(),
            min: 0,
            max: lines.len().saturating_sub(1) as i64,
        })?;
        if !seen.insert(item.line_index) {
            return Err(ValidationError::Duplicate {
                field: "line_index".to_string(),
                value: item.line_index.to_string(),
            });
        }
        if item.quantity == 0 || item.quantity > line.quantity {
            return Err(ValidationError::OutOfRange {
                field: format!("quantity for line {}", item.line_index),
                min: 1,
                max: line.quantity as i64,
            });
        }
    }
    Ok(selection.to_vec())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::Dimensions;

    fn bank() -> BankDetails {
        BankDetails {
            account_number: "123456789012".to_string(),
            ifsc: "SBIN0004321".to_string(),
            holder_name: "A. Customer".to_string(),
        }
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_pincode() {
        assert!(validate_pincode("560001").is_ok());
        assert!(validate_pincode(" 560001 ").is_ok());
        assert!(validate_pincode("").is_err());
        assert!(validate_pincode("5600011").is_err());
        assert!(validate_pincode("012345").is_err());
    }

    #[test]
    fn test_validate_package_info() {
        let ok = PackageInfo {
            weight: 0.0,
            dimensions: Some(Dimensions::new(10.0, 0.0, 2.0)),
        };
        assert!(validate_package_info(&ok).is_ok());

        let negative = PackageInfo {
            weight: -0.1,
            dimensions: None,
        };
        assert!(matches!(
            validate_package_info(&negative),
            Err(ValidationError::Negative { .. })
        ));

        let nan = PackageInfo {
            weight: 1.0,
            dimensions: Some(Dimensions::new(f64::NAN, 1.0, 1.0)),
        };
        assert!(validate_package_info(&nan).is_err());
    }

    #[test]
    fn test_validate_cart_line() {
        let line = CartLine::new("TEE-1", 2, Money::from_rupees(499));
        assert!(validate_cart_line(&line).is_ok());

        let blank = CartLine::new("  ", 2, Money::from_rupees(499));
        assert!(validate_cart_line(&blank).is_err());

        let free_negative = CartLine::new("TEE-1", 1, Money::from_paise(-1));
        assert!(validate_cart_line(&free_negative).is_err());
    }

    #[test]
    fn test_validate_images() {
        assert!(validate_images(&["https://cdn/x.jpg".to_string()]).is_ok());
        assert!(validate_images(&[]).is_err());
        assert!(validate_images(&["  ".to_string()]).is_err());
    }

    #[test]
    fn test_bank_details_required_only_for_cod() {
        assert!(validate_bank_details(PaymentMethod::Prepaid, None).is_ok());
        assert!(validate_bank_details(PaymentMethod::Cod, None).is_err());
        assert!(validate_bank_details(PaymentMethod::Cod, Some(&bank())).is_ok());

        let mut missing_holder = bank();
        missing_holder.holder_name = " ".to_string();
        assert!(validate_bank_details(PaymentMethod::Cod, Some(&missing_holder)).is_err());

        let mut bad_ifsc = bank();
        bad_ifsc.ifsc = "SBIN004321".to_string();
        assert!(validate_bank_details(PaymentMethod::Cod, Some(&bad_ifsc)).is_err());
    }

    #[test]
    fn test_validate_account_number() {
        assert!(validate_account_number("123456789").is_ok());
        assert!(validate_account_number("12345678").is_err());
        assert!(validate_account_number("12345678901234567890").is_err());
        assert!(validate_account_number("1234abcd90").is_err());
    }

    #[test]
    fn test_resolve_return_lines() {
        let lines = vec![
            CartLine::new("A", 2, Money::from_rupees(100)),
            CartLine::new("B", 1, Money::from_rupees(300)),
        ];

        let all = resolve_return_lines(&lines, &[]).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].quantity, 2);

        let partial = [ReturnLine {
            line_index: 0,
            quantity: 1,
        }];
        assert_eq!(resolve_return_lines(&lines, &partial).unwrap(), partial.to_vec());

        let too_many = [ReturnLine {
            line_index: 1,
            quantity: 2,
        }];
        assert!(resolve_return_lines(&lines, &too_many).is_err());

        let missing = [ReturnLine {
            line_index: 5,
            quantity: 1,
        }];
        assert!(resolve_return_lines(&lines, &missing).is_err());

        let dup = [
            ReturnLine {
                line_index: 0,
                quantity: 1,
            },
            ReturnLine {
                line_index: 0,
                quantity: 1,
            },
        ];
        assert!(matches!(
            resolve_return_lines(&lines, &dup),
            Err(ValidationError::Duplicate { .. })
        ));
    }
}
