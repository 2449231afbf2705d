//! # Error Types
//!
//! Domain-specific error types for fulfil-core.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  fulfil-core errors (this file)                                        │
//! │  ├── CoreError                                                          │
//! │  │   ├── Validation(ValidationError) - missing/malformed input          │
//! │  │   ├── Policy(PolicyError)         - business rule said no            │
//! │  │   ├── Conflict { .. }             - illegal/racing transition        │
//! │  │   └── NotFound { .. }             - unknown coupon/order/request     │
//! │                                                                         │
//! │  fulfil-engine errors (separate crate)                                 │
//! │  └── EngineError - adds ServiceUnavailable, Superseded, Stale, config  │
//! │                                                                         │
//! │  Every variant is recoverable: callers render it as a specific message │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::money::Money;
use crate::types::OrderStatus;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification of a rejection, for rendering and API status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Policy,
    Conflict,
    NotFound,
    ServiceUnavailable,
}

// =============================================================================
// Core Error
// =============================================================================

/// Business logic errors raised by the fulfilment computations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Required input is missing or malformed.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A business rule rejected the request.
    #[error("{0}")]
    Policy(#[from] PolicyError),

    /// The order's current status does not allow the requested move.
    ///
    /// ## When This Occurs
    /// - Cancelling an order that is already Delivered or Cancelled
    /// - Two admins racing: the second `ship` finds the order already Shipped
    /// - Optimistic version check failed (`current == requested` is possible)
    #[error("Order {order_id} is {current}, cannot move to {requested}")]
    Conflict {
        order_id: String,
        current: OrderStatus,
        requested: OrderStatus,
    },

    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Policy(_) => ErrorKind::Policy,
            CoreError::Conflict { .. } => ErrorKind::Conflict,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or greater (weights and dimensions).
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (pincode, IFSC, account number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g. the same line returned twice).
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    pub(crate) fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }

    pub(crate) fn invalid(field: &str, reason: &str) -> Self {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Policy Error
// =============================================================================

/// Business-rule rejections.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Cart value is below the coupon's threshold.
    #[error("Coupon {code} needs a minimum order value of {required}, cart is {actual}")]
    MinOrderValue {
        code: String,
        required: Money,
        actual: Money,
    },

    /// Coupon is reserved for a customer's first order.
    #[error("Coupon {code} is valid on the first order only")]
    FirstOrderOnly { code: String },

    /// The return window has closed.
    #[error("Return window for order {order_id} closed at {expired_at}")]
    ReturnWindowExpired {
        order_id: String,
        expired_at: DateTime<Utc>,
    },

    /// No courier delivers to this pincode.
    #[error("Delivery to {pincode} is not serviceable: {reason}")]
    NotServiceable { pincode: String, reason: String },

    /// Checkout with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// A discount larger than the goods it applies to.
    #[error("Discount {discount} exceeds cart value {cart_value}")]
    DiscountExceedsCart { discount: Money, cart_value: Money },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
