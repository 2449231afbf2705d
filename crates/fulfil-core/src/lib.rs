//! # fulfil-core: Pure Fulfilment Computations
//!
//! Every number a customer sees between "add to cart" and "refund issued" is
//! computed here, as pure functions over owned data.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Order Fulfilment Engine                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    fulfil-cli (operators)                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │  fulfil-engine: courier lookup, coupon store, drafts, OrderBook │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ fulfil-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │ shipment │ │   fee    │ │  coupon  │ │ lifecycle/refund │  │   │
//! │  │   │ weights  │ │ ₹5 steps │ │ discount │ │ transition table │  │   │
//! │  │   │ box dims │ │          │ │ eligible │ │ GST reversal     │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO ASYNC • NO LOGGING • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - `Money` in paise, integer arithmetic only
//! - [`types`] - Cart lines, orders, return requests, GST rates
//! - [`shipment`] - Shipment Aggregator and packing policies
//! - [`fee`] - Courier quote normalization (round up to ₹5)
//! - [`coupon`] - Coupon definitions, eligibility and discount
//! - [`lifecycle`] - Order state machine
//! - [`refund`] - Refund and GST reversal for returns
//! - [`validation`] - Input validation rules
//! - [`error`] - Error taxonomy
//!
//! ## Example Usage
//!
//! ```rust
//! use fulfil_core::fee::{normalize_fee, DEFAULT_FEE_STEP};
//! use fulfil_core::Money;
//!
//! // A ₹62.30 courier charge is billed as ₹65.00
//! let fee = normalize_fee(Money::from_paise(6230), DEFAULT_FEE_STEP);
//! assert_eq!(fee, Money::from_rupees(65));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod coupon;
pub mod error;
pub mod fee;
pub mod lifecycle;
pub mod money;
pub mod refund;
pub mod shipment;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use coupon::{AppliedCoupon, Coupon, DiscountRule};
pub use error::{CoreError, CoreResult, ErrorKind, PolicyError, ValidationError};
pub use fee::{CourierQuote, DeliveryQuote};
pub use lifecycle::{PlaceOrder, ReturnSubmission, StatusChange};
pub use money::Money;
pub use refund::RefundBreakdown;
pub use shipment::{PackingKind, PackingPolicy, ShipmentDefaults, ShipmentParameters};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// Catches fat-finger orders (1000 instead of 10).
pub const MAX_LINE_QUANTITY: u32 = 999;

/// Days a delivered order stays open for returns unless configured otherwise.
pub const DEFAULT_RETURN_WINDOW_DAYS: i64 = 7;
