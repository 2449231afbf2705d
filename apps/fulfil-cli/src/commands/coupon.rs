use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use fulfil_core::{Coupon, Money};
use fulfil_engine::{CouponValidator, EngineResult, InMemoryCouponCatalog, OrderHistory};

use super::{print_json, read_json};

/// Answers the prior-order question from a command-line flag.
struct FlagHistory {
    returning: bool,
}

#[async_trait]
impl OrderHistory for FlagHistory {
    async fn has_completed_order(&self, _user_id: &str) -> EngineResult<bool> {
        Ok(self.returning)
    }
}

pub async fn run(coupons: &Path, code: &str, cart_value: i64, returning: bool) -> anyhow::Result<()> {
    let coupons: Vec<Coupon> = read_json(coupons)?;
    let catalog = InMemoryCouponCatalog::from_coupons(coupons)?;
    info!(coupons = catalog.len().await, "Coupon catalog loaded");

    let validator = CouponValidator::new(Arc::new(catalog), Arc::new(FlagHistory { returning }));
    let applied = validator
        .validate(code, Money::from_rupees(cart_value), "cli", Utc::now())
        .await?;
    print_json(&applied)
}
