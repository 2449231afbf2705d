//! # Coupon Validation
//!
//! Runs the coupon policy from `fulfil_core::coupon` against an external
//! coupon store and the customer's order history.
//!
//! ## Evaluation Order
//! ```text
//! code ──► normalize ──► CouponCatalog::find_coupon
//!                              │
//!                 missing / inactive / outside window ──► NotFound
//!                              │
//!                 cart value < min order value ─────────► Policy
//!                              │
//!                 first-order-only? ──► OrderHistory ───► Policy if a
//!                              │                          completed order exists
//!                              ▼
//!                        AppliedCoupon
//! ```
//! Order history is only consulted for first-order-only coupons.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use fulfil_core::coupon::{self, normalize_code, validate_code};
use fulfil_core::{AppliedCoupon, Coupon, Money};

use crate::error::EngineResult;

// =============================================================================
// Store Traits
// =============================================================================

/// Read access to coupon definitions.
#[async_trait]
pub trait CouponCatalog: Send + Sync {
    /// Looks up a coupon by normalized code.
    async fn find_coupon(&self, code: &str) -> EngineResult<Option<Coupon>>;
}

/// Read access to a customer's past orders.
#[async_trait]
pub trait OrderHistory: Send + Sync {
    /// Returns true if the user has at least one delivered order.
    async fn has_completed_order(&self, user_id: &str) -> EngineResult<bool>;
}

// =============================================================================
// In-Memory Catalog
// =============================================================================

/// Coupon catalog held in memory, keyed by normalized code.
#[derive(Debug, Default)]
pub struct InMemoryCouponCatalog {
    coupons: RwLock<HashMap<String, Coupon>>,
}

impl InMemoryCouponCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from definitions, validating each one.
    pub fn from_coupons(coupons: impl IntoIterator<Item = Coupon>) -> EngineResult<Self> {
        let mut map = HashMap::new();
        for mut coupon in coupons {
            coupon.code = normalize_code(&coupon.code);
            coupon.validate()?;
            map.insert(coupon.code.clone(), coupon);
        }
        Ok(InMemoryCouponCatalog {
            coupons: RwLock::new(map),
        })
    }

    /// Adds or replaces a coupon.
    pub async fn upsert(&self, mut coupon: Coupon) -> EngineResult<()> {
        coupon.code = normalize_code(&coupon.code);
        coupon.validate()?;
        self.coupons.write().await.insert(coupon.code.clone(), coupon);
        Ok(())
    }

    pub async fn remove(&self, code: &str) -> Option<Coupon> {
        self.coupons.write().await.remove(&normalize_code(code))
    }

    pub async fn len(&self) -> usize {
        self.coupons.read().await.len()
    }
}

#[async_trait]
impl CouponCatalog for InMemoryCouponCatalog {
    async fn find_coupon(&self, code: &str) -> EngineResult<Option<Coupon>> {
        Ok(self.coupons.read().await.get(code).cloned())
    }
}

// =============================================================================
// Coupon Validator
// =============================================================================

pub struct CouponValidator {
    catalog: Arc<dyn CouponCatalog>,
    history: Arc<dyn OrderHistory>,
}

impl CouponValidator {
    pub fn new(catalog: Arc<dyn CouponCatalog>, history: Arc<dyn OrderHistory>) -> Self {
        CouponValidator { catalog, history }
    }

    /// Validates `code` for a cart and computes its discount.
    ///
    /// The first failing check wins; see the module docs for the order.
    #[instrument(skip(self, cart_value, now), fields(cart_value = %cart_value))]
    pub async fn validate(
        &self,
        code: &str,
        cart_value: Money,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<AppliedCoupon> {
        let code = normalize_code(code);
        validate_code(&code)?;

        let found = self.catalog.find_coupon(&code).await?;
        let coupon = coupon::precheck(found.as_ref(), &code, cart_value, now)?;

        let has_prior = if coupon.is_first_order_only {
            self.history.has_completed_order(user_id).await?
        } else {
            false
        };

        let applied = coupon::apply(coupon, cart_value, has_prior)?;
        debug!(code = %applied.code, discount = %applied.discount, "Coupon accepted");
        Ok(applied)
    }
}
