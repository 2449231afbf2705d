//! # Order Lifecycle
//!
//! The order state machine: which status moves are legal, and what each
//! move does to the order's money and return fields.
//!
//! ## Transition Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Pending ──► Confirmed ──► Processing ──► Shipped ──► Delivered         │
//! │     │            │              │            │           │   ▲          │
//! │     └────────────┴──────┬───────┴────────────┘           │   │ reject   │
//! │                         ▼                                ▼   │          │
//! │                    Cancelled ■                   ReturnRequested        │
//! │                                                          │              │
//! │                                                          ▼ approve      │
//! │                                                   ReturnApproved        │
//! │                                                          │              │
//! │                                                          ▼              │
//! │                                                      Refunded ■         │
//! │                                                                         │
//! │  ■ terminal: nothing leaves Cancelled or Refunded                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A move not in the table fails with [`CoreError::Conflict`] naming both the
//! current and the requested status; the order is left untouched.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::coupon::AppliedCoupon;
use crate::error::{CoreError, CoreResult, PolicyError, ValidationError};
use crate::fee::DeliveryQuote;
use crate::money::Money;
use crate::refund::{compute_refund, RefundBreakdown};
use crate::shipment::ShipmentParameters;
use crate::types::{
    BankDetails, CartLine, Order, OrderStatus, OrderTotals, PaymentMethod, RefundStatus,
    ReturnLine, ReturnRequest, ReturnStatus,
};
use crate::validation::{
    resolve_return_lines, validate_bank_details, validate_cart_line, validate_images,
    validate_pincode, validate_reason,
};

// =============================================================================
// Transition Table
// =============================================================================

impl OrderStatus {
    /// Statuses reachable in one move.
    pub const fn allowed_targets(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Processing, Cancelled],
            Processing => &[Shipped, Cancelled],
            Shipped => &[Delivered, Cancelled],
            Delivered => &[ReturnRequested],
            ReturnRequested => &[ReturnApproved, Delivered],
            ReturnApproved => &[Refunded],
            Cancelled | Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        self.allowed_targets().contains(&to)
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// Pre-delivery statuses, from which the customer may still cancel.
    pub const fn is_cancellable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending
                | OrderStatus::Confirmed
                | OrderStatus::Processing
                | OrderStatus::Shipped
        )
    }
}

/// A status move that was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

// =============================================================================
// Placing an Order
// =============================================================================

/// Everything checkout hands over to create an order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub id: String,
    pub user_id: String,
    pub lines: Vec<CartLine>,
    pub shipment: ShipmentParameters,
    pub delivery_quote: DeliveryQuote,
    pub coupon: Option<AppliedCoupon>,
    pub delivery_pincode: String,
    pub payment_method: PaymentMethod,
}

/// A customer's return submission, before it becomes a [`ReturnRequest`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReturnSubmission {
    pub id: String,
    pub reason: String,
    pub images: Vec<String>,
    pub bank_details: Option<BankDetails>,
    /// Empty means the whole order.
    #[serde(default)]
    pub lines: Vec<ReturnLine>,
}

impl Order {
    /// Creates a Pending order from a checked-out cart.
    ///
    /// ## Checks
    /// - at least one line, each valid
    /// - destination pincode valid and serviceable
    /// - coupon (if any) computed against this exact sub-total
    /// - discount never exceeds the sub-total, so `grand_total ≥ 0`
    pub fn place(request: PlaceOrder, now: DateTime<Utc>) -> CoreResult<Order> {
        if request.lines.is_empty() {
            return Err(PolicyError::EmptyCart.into());
        }
        for line in &request.lines {
            validate_cart_line(line)?;
        }
        validate_pincode(&request.delivery_pincode)?;

        if !request.delivery_quote.serviceable {
            return Err(PolicyError::NotServiceable {
                pincode: request.delivery_pincode,
                reason: request
                    .delivery_quote
                    .reason
                    .unwrap_or_else(|| "not serviceable".to_string()),
            }
            .into());
        }

        let sub_total: Money = request.lines.iter().map(CartLine::line_total).sum();
        let discount = match &request.coupon {
            Some(applied) => {
                if applied.cart_value != sub_total {
                    return Err(ValidationError::invalid(
                        "coupon",
                        "discount was computed for a different cart value",
                    )
                    .into());
                }
                applied.discount
            }
            None => Money::zero(),
        };
        if discount > sub_total || discount.is_negative() {
            return Err(PolicyError::DiscountExceedsCart {
                discount,
                cart_value: sub_total,
            }
            .into());
        }

        let totals = OrderTotals::compute(
            &request.lines,
            discount,
            request.delivery_quote.billable_fee,
        );

        Ok(Order {
            id: request.id,
            user_id: request.user_id,
            lines: request.lines,
            status: OrderStatus::Pending,
            totals,
            coupon: request.coupon,
            shipment: request.shipment,
            delivery_pincode: request.delivery_pincode.trim().to_string(),
            payment_method: request.payment_method,
            refund_status: RefundStatus::NotApplicable,
            returns: Vec::new(),
            placed_at: now,
            delivered_at: None,
            return_window_expires_at: None,
            updated_at: now,
            version: 0,
        })
    }

    // =========================================================================
    // Generic Transition
    // =========================================================================

    fn conflict(&self, requested: OrderStatus) -> CoreError {
        CoreError::Conflict {
            order_id: self.id.clone(),
            current: self.status,
            requested,
        }
    }

    fn ensure_can_move(&self, to: OrderStatus) -> CoreResult<()> {
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(self.conflict(to))
        }
    }

    /// Applies a checked move. Callers must run all fallible checks first.
    fn apply_move(&mut self, to: OrderStatus, now: DateTime<Utc>) -> StatusChange {
        let change = StatusChange {
            from: self.status,
            to,
        };
        self.status = to;
        self.updated_at = now;
        self.version += 1;
        change
    }

    fn advance(&mut self, to: OrderStatus, now: DateTime<Utc>) -> CoreResult<StatusChange> {
        self.ensure_can_move(to)?;
        Ok(self.apply_move(to, now))
    }

    // =========================================================================
    // Fulfilment
    // =========================================================================

    pub fn confirm(&mut self, now: DateTime<Utc>) -> CoreResult<StatusChange> {
        self.advance(OrderStatus::Confirmed, now)
    }

    pub fn start_processing(&mut self, now: DateTime<Utc>) -> CoreResult<StatusChange> {
        self.advance(OrderStatus::Processing, now)
    }

    pub fn ship(&mut self, now: DateTime<Utc>) -> CoreResult<StatusChange> {
        self.advance(OrderStatus::Shipped, now)
    }

    /// Marks the order delivered and opens the return window.
    ///
    /// `delivered_at` and `return_window_expires_at` are set only the first
    /// time; a rejected return moving the order back to Delivered keeps them.
    pub fn deliver(
        &mut self,
        now: DateTime<Utc>,
        return_window: Duration,
    ) -> CoreResult<StatusChange> {
        if self.status != OrderStatus::Shipped {
            return Err(self.conflict(OrderStatus::Delivered));
        }
        let window_closes = match self.delivered_at {
            Some(_) => None,
            None => Some(now.checked_add_signed(return_window).ok_or_else(|| {
                ValidationError::invalid("return_window", "closes past the supported date range")
            })?),
        };

        let change = self.apply_move(OrderStatus::Delivered, now);
        if let Some(expires_at) = window_closes {
            self.delivered_at = Some(now);
            self.return_window_expires_at = Some(expires_at);
        }
        Ok(change)
    }

    /// Cancels a not-yet-delivered order.
    ///
    /// Prepaid orders owe a refund; COD orders were never paid.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> CoreResult<StatusChange> {
        if !self.status.is_cancellable() {
            return Err(self.conflict(OrderStatus::Cancelled));
        }
        let change = self.apply_move(OrderStatus::Cancelled, now);
        self.refund_status = match self.payment_method {
            PaymentMethod::Prepaid => RefundStatus::Pending,
            PaymentMethod::Cod => RefundStatus::NotApplicable,
        };
        Ok(change)
    }

    // =========================================================================
    // Returns
    // =========================================================================

    /// Returns true while a return may still be requested.
    pub fn is_within_return_window(&self, now: DateTime<Utc>) -> bool {
        self.return_window_expires_at
            .map_or(false, |expires| now <= expires)
    }

    /// Opens a return request on a delivered order.
    ///
    /// ## Checks, in order
    /// 1. status is Delivered (else Conflict)
    /// 2. `now` is inside the return window (else Policy)
    /// 3. reason, ≥1 image, bank details for COD, valid line selection
    ///    (else Validation)
    pub fn request_return(
        &mut self,
        submission: ReturnSubmission,
        now: DateTime<Utc>,
    ) -> CoreResult<StatusChange> {
        self.ensure_can_move(OrderStatus::ReturnRequested)?;

        if !self.is_within_return_window(now) {
            return Err(PolicyError::ReturnWindowExpired {
                order_id: self.id.clone(),
                expired_at: self.return_window_expires_at.unwrap_or(now),
            }
            .into());
        }

        validate_reason(&submission.reason)?;
        validate_images(&submission.images)?;
        validate_bank_details(self.payment_method, submission.bank_details.as_ref())?;
        let lines = resolve_return_lines(&self.lines, &submission.lines)?;

        let bank_details = if self.payment_method.is_cod() {
            submission.bank_details
        } else {
            None
        };

        self.returns.push(ReturnRequest {
            id: submission.id,
            order_id: self.id.clone(),
            reason: submission.reason.trim().to_string(),
            images: submission.images,
            bank_details,
            lines,
            status: ReturnStatus::Pending,
            refund_amount: Money::zero(),
            gst_reversal_amount: Money::zero(),
            created_at: now,
            decided_at: None,
        });
        Ok(self.apply_move(OrderStatus::ReturnRequested, now))
    }

    /// Approves the pending return and computes what is owed.
    pub fn approve_return(
        &mut self,
        now: DateTime<Utc>,
    ) -> CoreResult<(StatusChange, RefundBreakdown)> {
        self.ensure_can_move(OrderStatus::ReturnApproved)?;

        let selection = self
            .active_return()
            .map(|r| r.lines.clone())
            .ok_or_else(|| CoreError::not_found("return request", self.id.clone()))?;
        let breakdown = compute_refund(&self.lines, &self.totals, &selection)?;

        if let Some(request) = self.active_return_mut() {
            request.status = ReturnStatus::Approved;
            request.refund_amount = breakdown.refund_amount;
            request.gst_reversal_amount = breakdown.gst_reversal_amount;
            request.decided_at = Some(now);
        }
        self.refund_status = RefundStatus::Pending;
        Ok((self.apply_move(OrderStatus::ReturnApproved, now), breakdown))
    }

    /// Rejects the pending return; the order goes back to Delivered.
    pub fn reject_return(&mut self, now: DateTime<Utc>) -> CoreResult<StatusChange> {
        self.ensure_can_move(OrderStatus::Delivered)?;

        let order_id = self.id.clone();
        let request = self
            .active_return_mut()
            .ok_or_else(|| CoreError::not_found("return request", order_id))?;
        request.status = ReturnStatus::Rejected;
        request.decided_at = Some(now);
        Ok(self.apply_move(OrderStatus::Delivered, now))
    }

    /// Records the payout of an approved return.
    pub fn mark_refunded(&mut self, now: DateTime<Utc>) -> CoreResult<StatusChange> {
        let change = self.advance(OrderStatus::Refunded, now)?;
        self.refund_status = RefundStatus::Completed;
        Ok(change)
    }

    /// Records the payout for a cancelled prepaid order.
    ///
    /// Cancelled stays terminal; only the refund status moves.
    pub fn settle_cancellation_refund(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != OrderStatus::Cancelled || self.refund_status != RefundStatus::Pending {
            return Err(self.conflict(OrderStatus::Cancelled));
        }
        self.refund_status = RefundStatus::Completed;
        self.updated_at = now;
        self.version += 1;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn place(payment_method: PaymentMethod) -> Order {
        let lines = vec![
            CartLine::new("KURTA", 2, Money::from_rupees(800)),
            CartLine::new("DUPATTA", 1, Money::from_rupees(400)),
        ];
        Order::place(
            PlaceOrder {
                id: "ord-1".to_string(),
                user_id: "user-1".to_string(),
                lines,
                shipment: crate::shipment::aggregate(&[]),
                delivery_quote: DeliveryQuote {
                    serviceable: true,
                    billable_fee: Money::from_rupees(50),
                    reason: None,
                },
                coupon: Some(AppliedCoupon {
                    code: "FLAT100".to_string(),
                    discount: Money::from_rupees(100),
                    cart_value: Money::from_rupees(2000),
                }),
                delivery_pincode: "560001".to_string(),
                payment_method,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn delivered(payment_method: PaymentMethod) -> Order {
        let mut order = place(payment_method);
        let now = Utc::now();
        order.confirm(now).unwrap();
        order.start_processing(now).unwrap();
        order.ship(now).unwrap();
        order.deliver(now, Duration::days(7)).unwrap();
        order
    }

    fn submission() -> ReturnSubmission {
        ReturnSubmission {
            id: "ret-1".to_string(),
            reason: "Wrong size".to_string(),
            images: vec!["https://cdn.example/ret-1.jpg".to_string()],
            bank_details: None,
            lines: Vec::new(),
        }
    }

    #[test]
    fn test_place_computes_totals() {
        let order = place(PaymentMethod::Prepaid);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.totals.sub_total, Money::from_rupees(2000));
        assert_eq!(order.totals.tax_total, Money::from_rupees(360));
        assert_eq!(order.totals.grand_total, Money::from_rupees(2000 + 360 + 50 - 100));
        assert_eq!(order.version, 0);
    }

    #[test]
    fn test_place_rejects_unserviceable_and_stale_coupon() {
        let base = PlaceOrder {
            id: "o".to_string(),
            user_id: "u".to_string(),
            lines: vec![CartLine::new("A", 1, Money::from_rupees(100))],
            shipment: crate::shipment::aggregate(&[]),
            delivery_quote: DeliveryQuote::not_serviceable("no courier"),
            coupon: None,
            delivery_pincode: "560001".to_string(),
            payment_method: PaymentMethod::Prepaid,
        };
        let err = Order::place(base.clone(), Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::Policy(PolicyError::NotServiceable { .. })));

        let stale = PlaceOrder {
            delivery_quote: DeliveryQuote {
                serviceable: true,
                billable_fee: Money::zero(),
                reason: None,
            },
            coupon: Some(AppliedCoupon {
                code: "X".to_string(),
                discount: Money::from_rupees(10),
                cart_value: Money::from_rupees(999),
            }),
            ..base
        };
        assert_eq!(Order::place(stale, Utc::now()).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_happy_path_is_linear() {
        let mut order = place(PaymentMethod::Prepaid);
        let now = Utc::now();
        assert!(order.ship(now).is_err());
        order.confirm(now).unwrap();
        assert!(order.confirm(now).is_err());
        order.start_processing(now).unwrap();
        order.ship(now).unwrap();
        let change = order.deliver(now, Duration::days(7)).unwrap();
        assert_eq!(change.from, OrderStatus::Shipped);
        assert_eq!(order.return_window_expires_at, Some(now + Duration::days(7)));
        assert_eq!(order.version, 4);
    }

    #[test]
    fn test_deliver_with_out_of_range_window_leaves_order_shipped() {
        let mut order = place(PaymentMethod::Prepaid);
        let now = Utc::now();
        order.confirm(now).unwrap();
        order.start_processing(now).unwrap();
        order.ship(now).unwrap();

        let err = order.deliver(now, Duration::days(100_000_000_000)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.delivered_at, None);
        assert_eq!(order.version, 3);
    }

    #[test]
    fn test_cancel_from_shipped_then_conflict() {
        let mut order = place(PaymentMethod::Prepaid);
        let now = Utc::now();
        order.confirm(now).unwrap();
        order.start_processing(now).unwrap();
        order.ship(now).unwrap();

        order.cancel(now).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.refund_status, RefundStatus::Pending);

        let err = order.cancel(now).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Conflict {
                current: OrderStatus::Cancelled,
                requested: OrderStatus::Cancelled,
                ..
            }
        ));
    }

    #[test]
    fn test_cod_cancellation_owes_nothing() {
        let mut order = place(PaymentMethod::Cod);
        order.cancel(Utc::now()).unwrap();
        assert_eq!(order.refund_status, RefundStatus::NotApplicable);
        assert!(order.settle_cancellation_refund(Utc::now()).is_err());
    }

    #[test]
    fn test_settle_prepaid_cancellation() {
        let mut order = place(PaymentMethod::Prepaid);
        order.cancel(Utc::now()).unwrap();
        order.settle_cancellation_refund(Utc::now()).unwrap();
        assert_eq!(order.refund_status, RefundStatus::Completed);
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_cannot_cancel_after_delivery() {
        let mut order = delivered(PaymentMethod::Prepaid);
        assert_eq!(order.cancel(Utc::now()).unwrap_err().kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_return_requires_delivered() {
        let mut order = place(PaymentMethod::Prepaid);
        let err = order.request_return(submission(), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_return_window_expiry() {
        let mut order = delivered(PaymentMethod::Prepaid);
        let expires = order.return_window_expires_at.unwrap();

        assert!(order.is_within_return_window(expires));
        let err = order
            .request_return(submission(), expires + Duration::seconds(1))
            .unwrap_err();
        assert!(matches!(err, CoreError::Policy(PolicyError::ReturnWindowExpired { .. })));
        assert_eq!(order.status, OrderStatus::Delivered);
    }

    #[test]
    fn test_return_validation() {
        let mut order = delivered(PaymentMethod::Cod);
        let now = Utc::now();

        let mut no_reason = submission();
        no_reason.reason = "   ".to_string();
        assert_eq!(order.request_return(no_reason, now).unwrap_err().kind(), ErrorKind::Validation);

        let mut no_images = submission();
        no_images.images.clear();
        assert_eq!(order.request_return(no_images, now).unwrap_err().kind(), ErrorKind::Validation);

        // COD without bank details
        assert_eq!(order.request_return(submission(), now).unwrap_err().kind(), ErrorKind::Validation);
        assert!(order.returns.is_empty());
        assert_eq!(order.status, OrderStatus::Delivered);

        let mut with_bank = submission();
        with_bank.bank_details = Some(BankDetails {
            account_number: "001234567890".to_string(),
            ifsc: "ICIC0000123".to_string(),
            holder_name: "R. Iyer".to_string(),
        });
        order.request_return(with_bank, now).unwrap();
        assert_eq!(order.status, OrderStatus::ReturnRequested);
        assert!(order.active_return().is_some());
    }

    #[test]
    fn test_approve_then_refund() {
        let mut order = delivered(PaymentMethod::Prepaid);
        let now = Utc::now();
        let mut partial = submission();
        partial.lines = vec![ReturnLine {
            line_index: 0,
            quantity: 1,
        }];
        order.request_return(partial, now).unwrap();

        let (change, breakdown) = order.approve_return(now).unwrap();
        assert_eq!(change.to, OrderStatus::ReturnApproved);
        assert_eq!(breakdown.refund_amount, Money::from_rupees(800));
        assert_eq!(breakdown.gst_reversal_amount, Money::from_rupees(144));
        assert_eq!(order.refund_status, RefundStatus::Pending);
        assert_eq!(order.returns[0].status, ReturnStatus::Approved);
        assert_eq!(order.returns[0].total_restitution(), Money::from_rupees(944));

        order.mark_refunded(now).unwrap();
        assert_eq!(order.status, OrderStatus::Refunded);
        assert_eq!(order.refund_status, RefundStatus::Completed);
        assert!(order.status.is_terminal());
        assert_eq!(order.cancel(now).unwrap_err().kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_reject_returns_to_delivered_and_keeps_window() {
        let mut order = delivered(PaymentMethod::Prepaid);
        let window = order.return_window_expires_at;
        let now = Utc::now();
        order.request_return(submission(), now).unwrap();

        let change = order.reject_return(now).unwrap();
        assert_eq!(change.to, OrderStatus::Delivered);
        assert_eq!(order.return_window_expires_at, window);
        assert_eq!(order.returns[0].status, ReturnStatus::Rejected);
        assert!(order.active_return().is_none());

        // a fresh request is allowed while the window is open
        let mut second = submission();
        second.id = "ret-2".to_string();
        order.request_return(second, now).unwrap();
        assert_eq!(order.returns.len(), 2);
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        assert!(OrderStatus::Cancelled.allowed_targets().is_empty());
        assert!(OrderStatus::Refunded.allowed_targets().is_empty());
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::ReturnRequested.can_transition_to(OrderStatus::Delivered));
    }
}
