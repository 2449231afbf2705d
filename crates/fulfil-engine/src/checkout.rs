//! # Checkout Service
//!
//! Drives [`OrderDraft`]s through recompute and into the [`OrderBook`].
//!
//! ## Thread Safety
//! Each cart lives behind its own `Arc<Mutex<OrderDraft>>`:
//! 1. Mutations and coupon application on one cart run one at a time
//! 2. Different carts never wait on each other
//! 3. The cart lock is NOT held while the courier is called, so a customer
//!    changing the pincode mid-lookup is never blocked; the late answer is
//!    dropped instead (see [`QuoteTracker`])
//!
//! ## Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Caller                      CheckoutService                            │
//! │  ──────                      ───────────────                            │
//! │  add_line / set_quantity ──► lock cart ─► change a copy ─► recompute    │
//! │                              ─► re-validate coupon ─► commit the copy   │
//! │  set_destination ──────────► lock cart ─► set pincode / payment method  │
//! │  refresh_quote ────────────► lock ─► fee_request ─► unlock              │
//! │                              courier (bounded) ─► tracker.accept        │
//! │                              lock ─► apply_quote                        │
//! │  apply_coupon ─────────────► lock cart ─► validate ─► replace slot      │
//! │  checkout ─────────────────► lock cart ─► Order::place ─► close draft   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use fulfil_core::{
    AppliedCoupon, CartLine, CoreError, DeliveryQuote, ErrorKind, Order, OrderTotals,
    PaymentMethod, ShipmentParameters,
};

use crate::config::EngineConfig;
use crate::coupons::{CouponCatalog, CouponValidator};
use crate::courier::{CourierLookup, DeliveryFeeNormalizer, QuoteTracker};
use crate::draft::OrderDraft;
use crate::error::EngineResult;
use crate::orders::OrderBook;

// =============================================================================
// Cart Registry
// =============================================================================

/// Open drafts, one lock per cart.
#[derive(Debug, Default)]
pub struct CartRegistry {
    carts: RwLock<HashMap<String, Arc<Mutex<OrderDraft>>>>,
}

impl CartRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cart, creating an empty draft on first use.
    pub async fn open(&self, cart_id: &str, user_id: &str) -> Arc<Mutex<OrderDraft>> {
        if let Some(cart) = self.carts.read().await.get(cart_id) {
            return cart.clone();
        }
        self.carts
            .write()
            .await
            .entry(cart_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(OrderDraft::new(cart_id, user_id))))
            .clone()
    }

    pub async fn get(&self, cart_id: &str) -> EngineResult<Arc<Mutex<OrderDraft>>> {
        self.carts
            .read()
            .await
            .get(cart_id)
            .cloned()
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "cart",
                    id: cart_id.to_string(),
                }
                .into()
            })
    }

    pub async fn remove(&self, cart_id: &str) -> Option<Arc<Mutex<OrderDraft>>> {
        self.carts.write().await.remove(cart_id)
    }

    pub async fn len(&self) -> usize {
        self.carts.read().await.len()
    }
}

// =============================================================================
// Checkout Service
// =============================================================================

pub struct CheckoutService {
    config: Arc<EngineConfig>,
    carts: CartRegistry,
    normalizer: DeliveryFeeNormalizer,
    tracker: QuoteTracker,
    coupons: CouponValidator,
    orders: Arc<OrderBook>,
}

impl CheckoutService {
    /// Wires the service. The order book doubles as the coupon validator's
    /// order history.
    pub fn new(
        config: Arc<EngineConfig>,
        courier: Arc<dyn CourierLookup>,
        catalog: Arc<dyn CouponCatalog>,
        orders: Arc<OrderBook>,
    ) -> Self {
        let normalizer = DeliveryFeeNormalizer::new(courier, &config.courier);
        let coupons = CouponValidator::new(catalog, orders.clone());
        CheckoutService {
            config,
            carts: CartRegistry::new(),
            normalizer,
            tracker: QuoteTracker::new(),
            coupons,
            orders,
        }
    }

    pub fn orders(&self) -> &Arc<OrderBook> {
        &self.orders
    }

    pub fn carts(&self) -> &CartRegistry {
        &self.carts
    }

    // =========================================================================
    // Cart Mutations
    // =========================================================================

    pub async fn open_cart(&self, cart_id: &str, user_id: &str) {
        self.carts.open(cart_id, user_id).await;
    }

    /// Adds a line and brings the shipment (and coupon) up to date.
    ///
    /// If the coupon store cannot be reached the cart is left exactly as it
    /// was, so the caller can retry without doubling the line.
    #[instrument(skip(self, line), fields(product_ref = %line.product_ref, quantity = line.quantity))]
    pub async fn add_line(&self, cart_id: &str, line: CartLine) -> EngineResult<ShipmentParameters> {
        self.mutate(cart_id, |draft| draft.add_line(line).map(drop)).await
    }

    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        cart_id: &str,
        index: usize,
        quantity: u32,
    ) -> EngineResult<ShipmentParameters> {
        self.mutate(cart_id, |draft| draft.set_quantity(index, quantity).map(drop)).await
    }

    #[instrument(skip(self))]
    pub async fn remove_line(&self, cart_id: &str, index: usize) -> EngineResult<ShipmentParameters> {
        self.mutate(cart_id, |draft| draft.remove_line(index).map(drop)).await
    }

    /// Empties the cart; the coupon goes with it.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, cart_id: &str) -> EngineResult<ShipmentParameters> {
        self.mutate(cart_id, |draft| draft.clear().map(drop)).await
    }

    /// Sets where the parcel goes and how it is paid for.
    #[instrument(skip(self))]
    pub async fn set_destination(
        &self,
        cart_id: &str,
        delivery_pincode: &str,
        payment_method: PaymentMethod,
    ) -> EngineResult<()> {
        let cart = self.carts.get(cart_id).await?;
        let mut draft = cart.lock().await;
        draft.ensure_open()?;
        draft.set_delivery_pincode(delivery_pincode)?;
        draft.set_payment_method(payment_method);
        Ok(())
    }

    /// Runs a cart change on a copy of the draft, brings the copy up to date,
    /// and swaps it in only if every step succeeded.
    async fn mutate<F>(&self, cart_id: &str, change: F) -> EngineResult<ShipmentParameters>
    where
        F: FnOnce(&mut OrderDraft) -> EngineResult<()>,
    {
        let cart = self.carts.get(cart_id).await?;
        let mut draft = cart.lock().await;
        draft.ensure_open()?;

        let mut next = draft.clone();
        change(&mut next)?;
        let shipment = self.after_mutation(&mut next).await?;

        *draft = next;
        Ok(shipment)
    }

    /// Recomputes the shipment and re-validates the coupon against the new
    /// sub-total, dropping it if it no longer applies.
    async fn after_mutation(&self, draft: &mut OrderDraft) -> EngineResult<ShipmentParameters> {
        let shipment = draft.recompute_shipment(
            self.config.shipment.packing.policy(),
            &self.config.shipment.defaults,
        );
        debug!(
            cart_id = %draft.cart_id(),
            revision = draft.revision(),
            weight = shipment.total_weight,
            "Shipment recomputed"
        );

        if let Some(code) = draft.stale_coupon_code().map(str::to_string) {
            match self
                .coupons
                .validate(&code, draft.sub_total(), draft.user_id(), Utc::now())
                .await
            {
                Ok(applied) => {
                    draft.apply_coupon(applied)?;
                }
                Err(e) if e.kind() == ErrorKind::ServiceUnavailable => return Err(e),
                Err(e) => {
                    warn!(cart_id = %draft.cart_id(), code = %code, error = %e, "Dropping coupon that no longer applies");
                    draft.remove_coupon();
                }
            }
        }
        Ok(shipment)
    }

    // =========================================================================
    // Delivery Fee
    // =========================================================================

    /// Fetches a fresh delivery quote for the cart's current contents.
    ///
    /// ## Errors
    /// - `ServiceUnavailable` if the courier failed or timed out
    /// - `Superseded` if a newer refresh for the same cart was started
    /// - `Stale` if the cart changed while the courier was answering
    #[instrument(skip(self))]
    pub async fn refresh_quote(&self, cart_id: &str) -> EngineResult<DeliveryQuote> {
        let cart = self.carts.get(cart_id).await?;

        let (request, ticket) = {
            let draft = cart.lock().await;
            let request = draft.fee_request()?;
            (request, self.tracker.begin(cart_id).await)
        };

        let quote = self
            .normalizer
            .quote(
                &request.shipment,
                &request.stamp.delivery_pincode,
                request.stamp.cod,
            )
            .await?;

        self.tracker.accept(&ticket).await?;

        let mut draft = cart.lock().await;
        draft.apply_quote(request.stamp, quote.clone())?;
        info!(
            cart_id,
            serviceable = quote.serviceable,
            billable_fee = %quote.billable_fee,
            "Delivery quote applied"
        );
        Ok(quote)
    }

    // =========================================================================
    // Coupons
    // =========================================================================

    /// Applies a coupon, replacing any coupon already on the cart. On failure
    /// the previous coupon stays.
    #[instrument(skip(self))]
    pub async fn apply_coupon(&self, cart_id: &str, code: &str) -> EngineResult<AppliedCoupon> {
        let cart = self.carts.get(cart_id).await?;
        let mut draft = cart.lock().await;
        draft.ensure_open()?;

        let applied = self
            .coupons
            .validate(code, draft.sub_total(), draft.user_id(), Utc::now())
            .await?;
        if let Some(previous) = draft.apply_coupon(applied.clone())? {
            debug!(replaced = %previous.code, "Coupon replaced");
        }
        info!(cart_id, code = %applied.code, discount = %applied.discount, "Coupon applied");
        Ok(applied)
    }

    pub async fn remove_coupon(&self, cart_id: &str) -> EngineResult<Option<AppliedCoupon>> {
        let cart = self.carts.get(cart_id).await?;
        let mut draft = cart.lock().await;
        draft.ensure_open()?;
        Ok(draft.remove_coupon())
    }

    // =========================================================================
    // Totals & Checkout
    // =========================================================================

    pub async fn totals(&self, cart_id: &str) -> EngineResult<OrderTotals> {
        let cart = self.carts.get(cart_id).await?;
        let draft = cart.lock().await;
        draft.totals()
    }

    /// Places the order and closes the cart.
    #[instrument(skip(self))]
    pub async fn checkout(&self, cart_id: &str) -> EngineResult<Order> {
        let cart = self.carts.get(cart_id).await?;
        let mut draft = cart.lock().await;

        let order = draft.checkout(Uuid::new_v4().to_string(), Utc::now())?;
        let order = self.orders.place(order).await?;

        // Callers already queued on this lock hold the Arc; they must see the
        // cart as gone rather than edit a draft nobody will read again.
        draft.close();
        self.carts.remove(cart_id).await;
        self.tracker.forget(cart_id).await;
        info!(cart_id, order_id = %order.id, "Checkout complete");
        Ok(order)
    }
}

impl std::fmt::Debug for CheckoutService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutService")
            .field("pickup_pincode", &self.normalizer.pickup_pincode())
            .field("packing", &self.config.shipment.packing)
            .finish_non_exhaustive()
    }
}
