//! # fulfil-engine: Order Fulfilment Coordination
//!
//! The async layer over `fulfil-core`: it talks to the courier and the coupon
//! store, keeps one lock per cart and one per order, and publishes every
//! order transition.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Engine Architecture                              │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                     CheckoutService                              │  │
//! │  │   CartRegistry ──► OrderDraft (per-cart Mutex)                   │  │
//! │  └───────┬──────────────────────┬──────────────────────┬────────────┘  │
//! │          ▼                      ▼                      ▼               │
//! │  ┌────────────────┐  ┌────────────────────┐  ┌────────────────────┐    │
//! │  │ DeliveryFee    │  │ CouponValidator    │  │ OrderBook          │    │
//! │  │ Normalizer     │  │                    │  │                    │    │
//! │  │ CourierLookup  │  │ CouponCatalog      │  │ per-order Mutex    │    │
//! │  │ + timeout      │  │ OrderHistory ◄─────┼──┤ TransitionSink     │    │
//! │  │ + QuoteTracker │  │                    │  │                    │    │
//! │  └────────────────┘  └────────────────────┘  └────────────────────┘    │
//! │                                                                         │
//! │  EngineConfig: defaults → fulfil.toml → FULFIL_* env → validate()      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`checkout`] - `CheckoutService` and `CartRegistry`
//! - [`draft`] - `OrderDraft`, the per-cart aggregate
//! - [`courier`] - Courier lookup trait, fee normalizer, last-request-wins
//! - [`rate_card`] - Local rate-card courier
//! - [`coupons`] - Coupon store traits and validator
//! - [`orders`] - `OrderBook`, the serialized state machine service
//! - [`events`] - Transition events and sinks
//! - [`config`] - Engine configuration
//! - [`error`] - Engine error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fulfil_engine::{CheckoutService, EngineConfig, InMemoryCouponCatalog, OrderBook, RateCardCourier};
//!
//! let config = Arc::new(EngineConfig::load_or_default(None));
//! let orders = Arc::new(OrderBook::new(&config.orders));
//! let courier = Arc::new(RateCardCourier::new(config.courier.rate_card.clone()));
//! let checkout = CheckoutService::new(config, courier, Arc::new(InMemoryCouponCatalog::new()), orders);
//!
//! checkout.open_cart("cart-1", "user-1").await;
//! checkout.add_line("cart-1", line).await?;
//! checkout.set_destination("cart-1", "560034", PaymentMethod::Prepaid).await?;
//! checkout.refresh_quote("cart-1").await?;
//! let order = checkout.checkout("cart-1").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod config;
pub mod coupons;
pub mod courier;
pub mod draft;
pub mod error;
pub mod events;
pub mod orders;
pub mod rate_card;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::{CartRegistry, CheckoutService};
pub use config::{CourierSettings, EngineConfig, OrderSettings, ShipmentSettings};
pub use coupons::{CouponCatalog, CouponValidator, InMemoryCouponCatalog, OrderHistory};
pub use courier::{
    CourierError, CourierLookup, DeliveryFeeNormalizer, QuoteTicket, QuoteTracker,
    ServiceabilityRequest,
};
pub use draft::{FeeRequest, OrderDraft, QuoteStamp};
pub use error::{EngineError, EngineResult};
pub use events::{Actor, NoOpSink, OutboxSink, SinkError, TransitionEvent, TransitionSink};
pub use orders::OrderBook;
pub use rate_card::{RateCard, RateCardCourier};
