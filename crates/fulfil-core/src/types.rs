//! # Domain Types
//!
//! Core domain types shared by every fulfilment subsystem.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    CartLine     │   │      Order      │   │  ReturnRequest  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  product_ref    │   │  id             │   │  id             │       │
//! │  │  quantity       │──►│  lines (frozen) │◄──│  order_id       │       │
//! │  │  unit_price     │   │  status         │   │  lines          │       │
//! │  │  package_info   │   │  totals         │   │  refund amounts │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Rate       │   │   OrderStatus   │   │ PaymentMethod   │       │
//! │  │  bps (u32)      │   │  see lifecycle  │   │  COD / PREPAID  │       │
//! │  │  1800 = 18%     │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cart lines are copied into the order at checkout (snapshot pattern), so a
//! later catalog price change never alters a placed order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::coupon::AppliedCoupon;
use crate::money::Money;
use crate::shipment::ShipmentParameters;

// =============================================================================
// Rate
// =============================================================================

/// A percentage in basis points (1 bps = 0.01%).
///
/// Used for GST slabs (1800 = 18%) and PERCENTAGE coupons (2000 = 20%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// 100% in basis points.
    pub const FULL_BPS: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a whole percentage (20 → 20%).
    #[inline]
    pub const fn from_percent(percent: u32) -> Self {
        Rate(percent * 100)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

/// Default GST slab applied when a line does not state one.
pub const DEFAULT_GST_RATE: Rate = Rate::from_percent(18);

fn default_gst_rate() -> Rate {
    DEFAULT_GST_RATE
}

// =============================================================================
// Package Info
// =============================================================================

/// Packed dimensions of one unit, in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub const fn new(length: f64, width: f64, height: f64) -> Self {
        Dimensions {
            length,
            width,
            height,
        }
    }

    /// Volume of one unit in cm³.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.length * self.width * self.height
    }
}

/// Physical shipping data for one unit of a product.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PackageInfo {
    /// Weight of one unit in kilograms.
    pub weight: f64,

    /// Packed dimensions; products without them fall back to defaults.
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
}

// =============================================================================
// Cart Line
// =============================================================================

/// A line in a cart, and later a frozen line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    /// Catalog product reference.
    pub product_ref: String,

    /// Units ordered (1..=MAX_LINE_QUANTITY).
    pub quantity: u32,

    #[serde(default)]
    pub color: Option<String>,

    #[serde(default)]
    pub size: Option<String>,

    /// Selling price per unit, tax-exclusive.
    pub unit_price: Money,

    /// Maximum retail price per unit.
    pub unit_mrp: Money,

    /// GST slab for this product.
    #[serde(default = "default_gst_rate")]
    pub gst_rate: Rate,

    /// Shipping data; lines without it are skipped by the shipment aggregator.
    #[serde(default)]
    pub package_info: Option<PackageInfo>,
}

impl CartLine {
    /// Creates a line with the default GST slab and no package data.
    pub fn new(product_ref: impl Into<String>, quantity: u32, unit_price: Money) -> Self {
        CartLine {
            product_ref: product_ref.into(),
            quantity,
            color: None,
            size: None,
            unit_price,
            unit_mrp: unit_price,
            gst_rate: DEFAULT_GST_RATE,
            package_info: None,
        }
    }

    /// Attaches package data.
    pub fn with_package(mut self, package_info: PackageInfo) -> Self {
        self.package_info = Some(package_info);
        self
    }

    /// Line total before tax (unit price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// GST owed on this line.
    #[inline]
    pub fn line_tax(&self) -> Money {
        self.line_total().percentage(self.gst_rate)
    }

    /// Savings against MRP for this line (never negative).
    pub fn mrp_savings(&self) -> Money {
        let per_unit = self.unit_mrp - self.unit_price;
        if per_unit.is_positive() {
            per_unit.multiply_quantity(self.quantity)
        } else {
            Money::zero()
        }
    }

    /// Returns true if `other` describes the same product variant.
    pub fn same_variant(&self, product_ref: &str, color: Option<&str>, size: Option<&str>) -> bool {
        self.product_ref == product_ref
            && self.color.as_deref() == color
            && self.size.as_deref() == size
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash collected by the courier on delivery.
    Cod,
    /// Paid online before dispatch.
    #[default]
    Prepaid,
}

impl PaymentMethod {
    #[inline]
    pub const fn is_cod(&self) -> bool {
        matches!(self, PaymentMethod::Cod)
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// The lifecycle status of an order.
///
/// The legal moves between these live in [`crate::lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    ReturnRequested,
    ReturnApproved,
    Refunded,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::ReturnRequested => "return_requested",
            OrderStatus::ReturnApproved => "return_approved",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Refund Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    /// Nothing is owed back (no refund event, or COD never collected).
    #[default]
    NotApplicable,
    /// Money is owed back and has not been paid out yet.
    Pending,
    /// Payout done.
    Completed,
}

// =============================================================================
// Return Request
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Bank account for COD refunds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BankDetails {
    pub account_number: String,
    pub ifsc: String,
    pub holder_name: String,
}

/// A quantity of one order line being sent back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnLine {
    /// Index into `Order::lines`.
    pub line_index: usize,
    pub quantity: u32,
}

/// A customer's request to send back (part of) a delivered order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnRequest {
    pub id: String,
    pub order_id: String,
    pub reason: String,
    /// Evidence image URLs, as handed over by the upload service.
    pub images: Vec<String>,
    pub bank_details: Option<BankDetails>,
    /// Resolved selection; always explicit, never empty.
    pub lines: Vec<ReturnLine>,
    pub status: ReturnStatus,
    /// Product value refunded, tax-exclusive.
    pub refund_amount: Money,
    /// GST reversed on the returned lines, paid in addition to `refund_amount`.
    pub gst_reversal_amount: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl ReturnRequest {
    /// Total owed to the customer: product value plus reversed GST.
    #[inline]
    pub fn total_restitution(&self) -> Money {
        self.refund_amount + self.gst_reversal_amount
    }
}

// =============================================================================
// Order Totals
// =============================================================================

/// Monetary breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderTotals {
    pub sub_total: Money,
    pub cgst_total: Money,
    pub sgst_total: Money,
    /// Always `cgst_total + sgst_total`.
    pub tax_total: Money,
    pub discount: Money,
    pub shipping_fee: Money,
    /// `sub_total + tax_total + shipping_fee - discount`.
    pub grand_total: Money,
}

impl OrderTotals {
    /// Computes totals for a set of lines.
    ///
    /// GST is computed per line and split into CGST/SGST halves per line,
    /// so the two components always sum to the line tax exactly.
    pub fn compute(lines: &[CartLine], discount: Money, shipping_fee: Money) -> Self {
        let mut sub_total = Money::zero();
        let mut cgst_total = Money::zero();
        let mut sgst_total = Money::zero();

        for line in lines {
            sub_total += line.line_total();
            let (cgst, sgst) = line.line_tax().split_even();
            cgst_total += cgst;
            sgst_total += sgst;
        }

        let tax_total = cgst_total + sgst_total;
        OrderTotals {
            sub_total,
            cgst_total,
            sgst_total,
            tax_total,
            discount,
            shipping_fee,
            grand_total: sub_total + tax_total + shipping_fee - discount,
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// A placed order.
///
/// Created once at checkout. Status, refund and return fields are only
/// changed through the methods in [`crate::lifecycle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    /// Frozen copy of the cart lines.
    pub lines: Vec<CartLine>,
    pub status: OrderStatus,
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub coupon: Option<AppliedCoupon>,
    pub shipment: ShipmentParameters,
    pub delivery_pincode: String,
    pub payment_method: PaymentMethod,
    pub refund_status: RefundStatus,
    /// Every return request ever raised, oldest first.
    pub returns: Vec<ReturnRequest>,
    #[ts(as = "String")]
    pub placed_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub delivered_at: Option<DateTime<Utc>>,
    /// Set once, on the first Delivered transition.
    #[ts(as = "Option<String>")]
    pub return_window_expires_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Bumped on every successful transition (optimistic concurrency).
    pub version: u64,
}

impl Order {
    /// The return request currently awaiting a decision, if any.
    pub fn active_return(&self) -> Option<&ReturnRequest> {
        self.returns
            .iter()
            .rev()
            .find(|r| r.status == ReturnStatus::Pending)
    }

    pub(crate) fn active_return_mut(&mut self) -> Option<&mut ReturnRequest> {
        self.returns
            .iter_mut()
            .rev()
            .find(|r| r.status == ReturnStatus::Pending)
    }

    /// Total savings against MRP across all lines.
    pub fn mrp_savings(&self) -> Money {
        self.lines.iter().map(CartLine::mrp_savings).sum()
    }

    /// Returns true once the order has been handed to the customer.
    #[inline]
    pub fn was_delivered(&self) -> bool {
        self.delivered_at.is_some()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price_rupees: i64, qty: u32) -> CartLine {
        CartLine::new("SKU", qty, Money::from_rupees(price_rupees))
    }

    #[test]
    fn test_rate_from_percent() {
        let rate = Rate::from_percent(18);
        assert_eq!(rate.bps(), 1800);
        assert!((rate.percentage() - 18.0).abs() < 0.001);
    }

    #[test]
    fn test_line_totals() {
        let l = line(500, 3);
        assert_eq!(l.line_total(), Money::from_rupees(1500));
        assert_eq!(l.line_tax(), Money::from_rupees(270));
    }

    #[test]
    fn test_mrp_savings_never_negative() {
        let mut l = line(400, 2);
        l.unit_mrp = Money::from_rupees(500);
        assert_eq!(l.mrp_savings(), Money::from_rupees(200));

        l.unit_mrp = Money::from_rupees(300);
        assert_eq!(l.mrp_savings(), Money::zero());
    }

    #[test]
    fn test_order_totals_compute() {
        let lines = vec![line(1000, 1), line(250, 4)];
        let totals = OrderTotals::compute(&lines, Money::from_rupees(100), Money::from_rupees(50));

        assert_eq!(totals.sub_total, Money::from_rupees(2000));
        assert_eq!(totals.cgst_total, Money::from_rupees(180));
        assert_eq!(totals.sgst_total, Money::from_rupees(180));
        assert_eq!(totals.tax_total, totals.cgst_total + totals.sgst_total);
        assert_eq!(totals.grand_total, Money::from_rupees(2000 + 360 + 50 - 100));
    }

    #[test]
    fn test_odd_paisa_goes_to_sgst() {
        let mut l = CartLine::new("SKU", 1, Money::from_paise(1_005));
        l.gst_rate = Rate::from_percent(18); // 180.9 → 181 paise
        let totals = OrderTotals::compute(&[l], Money::zero(), Money::zero());
        assert_eq!(totals.cgst_total.paise(), 90);
        assert_eq!(totals.sgst_total.paise(), 91);
    }

    #[test]
    fn test_payment_method_serde() {
        assert_eq!(serde_json::to_string(&PaymentMethod::Cod).unwrap(), "\"COD\"");
        assert_eq!(
            serde_json::from_str::<PaymentMethod>("\"PREPAID\"").unwrap(),
            PaymentMethod::Prepaid
        );
    }

    #[test]
    fn test_status_display_matches_serde() {
        let json = serde_json::to_string(&OrderStatus::ReturnRequested).unwrap();
        assert_eq!(json, format!("\"{}\"", OrderStatus::ReturnRequested));
    }

    #[test]
    fn test_cart_line_defaults_gst_when_missing() {
        let json = r#"{"product_ref":"TEE-1","quantity":2,"unit_price":49900,"unit_mrp":59900}"#;
        let l: CartLine = serde_json::from_str(json).unwrap();
        assert_eq!(l.gst_rate, DEFAULT_GST_RATE);
        assert!(l.package_info.is_none());
    }
}
