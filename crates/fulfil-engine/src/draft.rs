//! # Order Draft
//!
//! One cart on its way to becoming an order, with every derived field
//! stamped by the inputs it was computed from.
//!
//! ## Recompute Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  add_line / set_quantity / remove_line / clear                          │
//! │        │  revision += 1  (shipment, quote and coupon go stale)          │
//! │        ▼                                                                │
//! │  recompute_shipment()      stamped with revision                        │
//! │        ▼                                                                │
//! │  fee_request() ──► courier ──► apply_quote()                            │
//! │                         stamped with (revision, pincode, cod)           │
//! │        ▼                                                                │
//! │  apply_coupon()            stamped with the sub-total                   │
//! │        ▼                                                                │
//! │  totals() / checkout()     refuse to read anything stale                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The draft never recomputes on its own; callers run the steps in order.
//! Reading a stale field fails with [`EngineError::Stale`].

use chrono::{DateTime, Utc};

use fulfil_core::lifecycle::PlaceOrder;
use fulfil_core::validation::{validate_cart_line, validate_cart_size, validate_pincode, validate_quantity};
use fulfil_core::{
    AppliedCoupon, CartLine, CoreError, DeliveryQuote, Money, Order, OrderTotals, PackingPolicy,
    PaymentMethod, PolicyError, ShipmentDefaults, ShipmentParameters, ValidationError,
    MAX_LINE_QUANTITY,
};

use crate::error::{EngineError, EngineResult};

/// The inputs a delivery quote was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteStamp {
    pub revision: u64,
    pub delivery_pincode: String,
    pub cod: bool,
}

/// Everything needed to ask the courier for a quote.
#[derive(Debug, Clone)]
pub struct FeeRequest {
    pub stamp: QuoteStamp,
    pub shipment: ShipmentParameters,
}

#[derive(Debug, Clone)]
pub struct OrderDraft {
    cart_id: String,
    user_id: String,
    lines: Vec<CartLine>,
    delivery_pincode: Option<String>,
    payment_method: PaymentMethod,
    revision: u64,
    shipment: Option<(u64, ShipmentParameters)>,
    quote: Option<(QuoteStamp, DeliveryQuote)>,
    coupon: Option<AppliedCoupon>,
    closed: bool,
}

impl OrderDraft {
    pub fn new(cart_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        OrderDraft {
            cart_id: cart_id.into(),
            user_id: user_id.into(),
            lines: Vec::new(),
            delivery_pincode: None,
            payment_method: PaymentMethod::default(),
            revision: 0,
            shipment: None,
            quote: None,
            coupon: None,
            closed: false,
        }
    }

    pub fn cart_id(&self) -> &str {
        &self.cart_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn delivery_pincode(&self) -> Option<&str> {
        self.delivery_pincode.as_deref()
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn sub_total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Marks the draft as placed. Anything that would change it afterwards
    /// fails as if the cart no longer existed.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn ensure_open(&self) -> EngineResult<()> {
        if self.closed {
            return Err(CoreError::NotFound {
                entity: "cart",
                id: self.cart_id.clone(),
            }
            .into());
        }
        Ok(())
    }

    // =========================================================================
    // Cart Mutations
    // =========================================================================

    /// Adds a line, or tops up the quantity of the same variant.
    pub fn add_line(&mut self, line: CartLine) -> EngineResult<u64> {
        self.ensure_open()?;
        validate_cart_line(&line)?;

        let existing = self.lines.iter_mut().find(|l| {
            l.same_variant(&line.product_ref, line.color.as_deref(), line.size.as_deref())
        });
        match existing {
            Some(current) => {
                let quantity = current.quantity.saturating_add(line.quantity);
                if quantity > MAX_LINE_QUANTITY {
                    return Err(ValidationError::OutOfRange {
                        field: "quantity".to_string(),
                        min: 1,
                        max: MAX_LINE_QUANTITY as i64,
                    }
                    .into());
                }
                current.quantity = quantity;
            }
            None => {
                validate_cart_size(self.lines.len())?;
                self.lines.push(line);
            }
        }
        Ok(self.bump())
    }

    /// Sets a line's quantity; zero removes the line.
    pub fn set_quantity(&mut self, index: usize, quantity: u32) -> EngineResult<u64> {
        self.ensure_open()?;
        if quantity == 0 {
            self.remove_line(index)?;
            return Ok(self.revision);
        }
        validate_quantity(quantity)?;
        let line = self.lines.get_mut(index).ok_or_else(|| missing_line(index))?;
        line.quantity = quantity;
        Ok(self.bump())
    }

    pub fn remove_line(&mut self, index: usize) -> EngineResult<CartLine> {
        self.ensure_open()?;
        if index >= self.lines.len() {
            return Err(missing_line(index));
        }
        let removed = self.lines.remove(index);
        self.bump();
        Ok(removed)
    }

    /// Empties the cart and drops the coupon.
    pub fn clear(&mut self) -> EngineResult<u64> {
        self.ensure_open()?;
        self.lines.clear();
        self.coupon = None;
        Ok(self.bump())
    }

    /// Sets the destination; any quote for another pincode goes stale.
    pub fn set_delivery_pincode(&mut self, pincode: &str) -> EngineResult<()> {
        self.ensure_open()?;
        let pincode = pincode.trim();
        validate_pincode(pincode)?;
        self.delivery_pincode = Some(pincode.to_string());
        Ok(())
    }

    /// Sets the payment method; a quote made for the other one goes stale.
    pub fn set_payment_method(&mut self, payment_method: PaymentMethod) {
        self.payment_method = payment_method;
    }

    fn bump(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    // =========================================================================
    // Derived Fields
    // =========================================================================

    /// Re-runs the Shipment Aggregator for the current lines.
    pub fn recompute_shipment(
        &mut self,
        policy: &dyn PackingPolicy,
        defaults: &ShipmentDefaults,
    ) -> ShipmentParameters {
        let params = fulfil_core::shipment::aggregate_with(&self.lines, policy, defaults);
        self.shipment = Some((self.revision, params));
        params
    }

    pub fn shipment(&self) -> EngineResult<&ShipmentParameters> {
        match &self.shipment {
            Some((revision, params)) if *revision == self.revision => Ok(params),
            _ => Err(EngineError::Stale { field: "shipment" }),
        }
    }

    fn current_stamp(&self) -> EngineResult<QuoteStamp> {
        let delivery_pincode = self
            .delivery_pincode
            .clone()
            .ok_or_else(|| ValidationError::Required {
                field: "delivery_pincode".to_string(),
            })?;
        Ok(QuoteStamp {
            revision: self.revision,
            delivery_pincode,
            cod: self.payment_method.is_cod(),
        })
    }

    /// What to ask the courier, given a fresh shipment and a destination.
    pub fn fee_request(&self) -> EngineResult<FeeRequest> {
        self.ensure_open()?;
        let shipment = *self.shipment()?;
        Ok(FeeRequest {
            stamp: self.current_stamp()?,
            shipment,
        })
    }

    /// Stores a quote, provided the cart has not moved on since the request.
    pub fn apply_quote(&mut self, stamp: QuoteStamp, quote: DeliveryQuote) -> EngineResult<()> {
        self.ensure_open()?;
        if stamp != self.current_stamp()? {
            return Err(EngineError::Stale { field: "quote" });
        }
        self.quote = Some((stamp, quote));
        Ok(())
    }

    pub fn quote(&self) -> EngineResult<&DeliveryQuote> {
        let stamp = self.current_stamp()?;
        match &self.quote {
            Some((s, quote)) if *s == stamp => Ok(quote),
            _ => Err(EngineError::Stale { field: "quote" }),
        }
    }

    // =========================================================================
    // Coupon Slot
    // =========================================================================

    /// Replaces the applied coupon. Returns the one it replaced.
    ///
    /// The coupon must have been computed against the current sub-total.
    pub fn apply_coupon(&mut self, applied: AppliedCoupon) -> EngineResult<Option<AppliedCoupon>> {
        self.ensure_open()?;
        if applied.cart_value != self.sub_total() {
            return Err(EngineError::Stale { field: "coupon" });
        }
        Ok(self.coupon.replace(applied))
    }

    pub fn remove_coupon(&mut self) -> Option<AppliedCoupon> {
        self.coupon.take()
    }

    /// The applied coupon, if it still matches the cart.
    pub fn coupon(&self) -> EngineResult<Option<&AppliedCoupon>> {
        match &self.coupon {
            Some(c) if c.cart_value != self.sub_total() => Err(EngineError::Stale { field: "coupon" }),
            other => Ok(other.as_ref()),
        }
    }

    /// Code of a coupon whose discount was computed for a different cart.
    pub fn stale_coupon_code(&self) -> Option<&str> {
        self.coupon
            .as_ref()
            .filter(|c| c.cart_value != self.sub_total())
            .map(|c| c.code.as_str())
    }

    // =========================================================================
    // Totals & Checkout
    // =========================================================================

    pub fn totals(&self) -> EngineResult<OrderTotals> {
        let quote = self.quote()?;
        let discount = self.coupon()?.map_or(Money::zero(), |c| c.discount);
        Ok(OrderTotals::compute(&self.lines, discount, quote.billable_fee))
    }

    /// Freezes the draft into a Pending order.
    ///
    /// ## Errors
    /// - `Policy` for an empty cart or an unserviceable destination
    /// - `Stale` if shipment, quote or coupon were not recomputed
    pub fn checkout(&self, order_id: impl Into<String>, now: DateTime<Utc>) -> EngineResult<Order> {
        self.ensure_open()?;
        if self.lines.is_empty() {
            return Err(PolicyError::EmptyCart.into());
        }
        let shipment = *self.shipment()?;
        let delivery_quote = self.quote()?.clone();
        let coupon = self.coupon()?.cloned();
        let delivery_pincode = self.current_stamp()?.delivery_pincode;

        let order = Order::place(
            PlaceOrder {
                id: order_id.into(),
                user_id: self.user_id.clone(),
                lines: self.lines.clone(),
                shipment,
                delivery_quote,
                coupon,
                delivery_pincode,
                payment_method: self.payment_method,
            },
            now,
        )?;
        Ok(order)
    }
}

fn missing_line(index: usize) -> EngineError {
    CoreError::NotFound {
        entity: "cart line",
        id: index.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fulfil_core::shipment::StackedPacking;
    use fulfil_core::{Dimensions, ErrorKind, PackageInfo};

    fn draft() -> OrderDraft {
        let mut d = OrderDraft::new("cart-1", "u-1");
        d.add_line(
            CartLine::new("TEE", 2, Money::from_rupees(500)).with_package(PackageInfo {
                weight: 0.2,
                dimensions: Some(Dimensions::new(25.0, 20.0, 3.0)),
            }),
        )
        .unwrap();
        d.set_delivery_pincode("560034").unwrap();
        d
    }

    fn quoted(d: &mut OrderDraft, fee: i64) {
        d.recompute_shipment(&StackedPacking, &ShipmentDefaults::default());
        let req = d.fee_request().unwrap();
        d.apply_quote(
            req.stamp,
            DeliveryQuote {
                serviceable: true,
                billable_fee: Money::from_rupees(fee),
                reason: None,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_same_variant_merges() {
        let mut d = draft();
        d.add_line(CartLine::new("TEE", 1, Money::from_rupees(500))).unwrap();
        assert_eq!(d.lines().len(), 1);
        assert_eq!(d.lines()[0].quantity, 3);

        let mut red = CartLine::new("TEE", 1, Money::from_rupees(500));
        red.color = Some("red".into());
        d.add_line(red).unwrap();
        assert_eq!(d.lines().len(), 2);
        assert_eq!(d.revision(), 3);
    }

    #[test]
    fn test_mutation_invalidates_shipment_and_quote() {
        let mut d = draft();
        quoted(&mut d, 50);
        assert!(d.totals().is_ok());

        d.set_quantity(0, 3).unwrap();
        assert!(matches!(d.shipment(), Err(EngineError::Stale { field: "shipment" })));
        assert!(matches!(d.quote(), Err(EngineError::Stale { field: "quote" })));
        assert!(d.fee_request().is_err());

        let params = d.recompute_shipment(&StackedPacking, &ShipmentDefaults::default());
        assert!((params.total_weight - 0.6).abs() < 1e-9);
        assert_eq!(params.height, 9.0);
        // shipment fresh again, quote still stale
        assert!(d.quote().is_err());
    }

    #[test]
    fn test_pincode_or_payment_change_invalidates_quote() {
        let mut d = draft();
        quoted(&mut d, 50);

        d.set_payment_method(PaymentMethod::Cod);
        assert!(d.quote().is_err());
        d.set_payment_method(PaymentMethod::Prepaid);
        assert!(d.quote().is_ok());

        d.set_delivery_pincode("110001").unwrap();
        assert!(d.quote().is_err());
    }

    #[test]
    fn test_late_quote_is_rejected() {
        let mut d = draft();
        d.recompute_shipment(&StackedPacking, &ShipmentDefaults::default());
        let req = d.fee_request().unwrap();

        d.set_delivery_pincode("110001").unwrap();
        let err = d
            .apply_quote(req.stamp, DeliveryQuote::not_serviceable("x"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Stale { field: "quote" }));
    }

    #[test]
    fn test_coupon_slot_replaced_atomically() {
        let mut d = draft();
        let first = AppliedCoupon {
            code: "A".into(),
            discount: Money::from_rupees(100),
            cart_value: Money::from_rupees(1000),
        };
        let second = AppliedCoupon {
            code: "B".into(),
            discount: Money::from_rupees(150),
            cart_value: Money::from_rupees(1000),
        };
        assert_eq!(d.apply_coupon(first.clone()).unwrap(), None);
        assert_eq!(d.apply_coupon(second).unwrap(), Some(first));
        assert_eq!(d.coupon().unwrap().unwrap().code, "B");

        let wrong_value = AppliedCoupon {
            code: "C".into(),
            discount: Money::from_rupees(1),
            cart_value: Money::from_rupees(1),
        };
        assert!(d.apply_coupon(wrong_value).is_err());
        assert_eq!(d.coupon().unwrap().unwrap().code, "B");

        d.add_line(CartLine::new("CAP", 1, Money::from_rupees(300))).unwrap();
        assert_eq!(d.stale_coupon_code(), Some("B"));
        assert!(d.coupon().is_err());
    }

    #[test]
    fn test_checkout() {
        let mut d = draft();
        assert!(matches!(d.checkout("o-1", Utc::now()), Err(EngineError::Stale { .. })));

        quoted(&mut d, 50);
        let order = d.checkout("o-1", Utc::now()).unwrap();
        assert_eq!(order.totals.sub_total, Money::from_rupees(1000));
        assert_eq!(order.totals.shipping_fee, Money::from_rupees(50));
        assert_eq!(order.totals.grand_total, Money::from_rupees(1000 + 180 + 50));
        assert_eq!(order.delivery_pincode, "560034");
    }

    #[test]
    fn test_checkout_blocked_when_not_serviceable() {
        let mut d = draft();
        d.recompute_shipment(&StackedPacking, &ShipmentDefaults::default());
        let req = d.fee_request().unwrap();
        d.apply_quote(req.stamp, DeliveryQuote::not_serviceable("no courier"))
            .unwrap();
        let err = d.checkout("o-1", Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Policy);
    }

    #[test]
    fn test_closed_draft_refuses_changes() {
        let mut d = draft();
        quoted(&mut d, 50);
        d.checkout("o-1", Utc::now()).unwrap();
        d.close();

        assert!(d.is_closed());
        let err = d
            .add_line(CartLine::new("CAP", 1, Money::from_rupees(300)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(d.set_quantity(0, 5).is_err());
        assert!(d.set_delivery_pincode("110001").is_err());
        assert!(d.checkout("o-2", Utc::now()).is_err());
        assert_eq!(d.lines()[0].quantity, 2);
    }

    #[test]
    fn test_empty_cart_and_bad_index() {
        let mut d = OrderDraft::new("cart-2", "u-1");
        assert_eq!(d.checkout("o", Utc::now()).unwrap_err().kind(), ErrorKind::Policy);
        assert_eq!(d.remove_line(0).unwrap_err().kind(), ErrorKind::NotFound);
        assert!(d.set_delivery_pincode("12345").is_err());
    }
}
