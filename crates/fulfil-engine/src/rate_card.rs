//! # Rate Card Courier
//!
//! A local [`CourierLookup`] priced from a static rate card. Used by the CLI
//! and as a stand-in where no courier API is configured.
//!
//! ## Pricing
//! ```text
//! chargeable = max(actual weight, L × B × H / volumetric_divisor)
//! charge     = base_charge                                 (first base_weight kg)
//!            + ceil((chargeable − base_weight) / slab) × slab_charge
//!            + cod_surcharge                               (COD only)
//! ```
//! Destinations whose pincode starts with none of `serviceable_prefixes` are
//! not serviceable. An empty prefix list serves every pincode.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use fulfil_core::CourierQuote;

use crate::courier::{CourierError, CourierLookup, ServiceabilityRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateCard {
    pub serviceable_prefixes: Vec<String>,
    /// Rupees for the first `base_weight` kilograms.
    pub base_charge: f64,
    pub base_weight: f64,
    /// Rupees per additional slab.
    pub slab_charge: f64,
    pub slab_weight: f64,
    pub volumetric_divisor: f64,
    pub cod_surcharge: f64,
}

impl Default for RateCard {
    fn default() -> Self {
        RateCard {
            serviceable_prefixes: Vec::new(),
            base_charge: 40.0,
            base_weight: 0.5,
            slab_charge: 18.5,
            slab_weight: 0.5,
            volumetric_divisor: 5000.0,
            cod_surcharge: 25.0,
        }
    }
}

impl RateCard {
    pub fn validate(&self) -> Result<(), String> {
        let amounts = [
            ("base_charge", self.base_charge),
            ("slab_charge", self.slab_charge),
            ("cod_surcharge", self.cod_surcharge),
            ("base_weight", self.base_weight),
        ];
        for (field, value) in amounts {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} cannot be negative", field));
            }
        }
        if !(self.slab_weight > 0.0) {
            return Err("slab_weight must be greater than 0".into());
        }
        if !(self.volumetric_divisor > 0.0) {
            return Err("volumetric_divisor must be greater than 0".into());
        }
        if let Some(bad) = self
            .serviceable_prefixes
            .iter()
            .find(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
        {
            return Err(format!("serviceable prefix '{}' must be digits", bad));
        }
        Ok(())
    }

    pub fn serves(&self, pincode: &str) -> bool {
        self.serviceable_prefixes.is_empty()
            || self
                .serviceable_prefixes
                .iter()
                .any(|prefix| pincode.starts_with(prefix.as_str()))
    }

    /// Weight the courier bills for: actual or volumetric, whichever is larger.
    pub fn chargeable_weight(&self, request: &ServiceabilityRequest) -> f64 {
        let volumetric = (request.length as f64 * request.breadth as f64 * request.height as f64)
            / self.volumetric_divisor;
        request.weight.max(volumetric)
    }

    /// Charge in rupees, before any fee rounding.
    pub fn charge(&self, request: &ServiceabilityRequest) -> f64 {
        let extra = (self.chargeable_weight(request) - self.base_weight).max(0.0);
        let slabs = (extra / self.slab_weight).ceil();
        let mut charge = self.base_charge + slabs * self.slab_charge;
        if request.is_cod() {
            charge += self.cod_surcharge;
        }
        charge
    }
}

/// Courier that answers from a [`RateCard`] without any I/O.
#[derive(Debug, Clone, Default)]
pub struct RateCardCourier {
    card: RateCard,
}

impl RateCardCourier {
    pub fn new(card: RateCard) -> Self {
        RateCardCourier { card }
    }

    pub fn card(&self) -> &RateCard {
        &self.card
    }
}

#[async_trait]
impl CourierLookup for RateCardCourier {
    async fn check_serviceability(
        &self,
        request: &ServiceabilityRequest,
    ) -> Result<CourierQuote, CourierError> {
        if !self.card.serves(&request.delivery_pincode) {
            return Ok(CourierQuote {
                serviceable: false,
                shipping_charge: 0.0,
            });
        }
        Ok(CourierQuote {
            serviceable: true,
            shipping_charge: self.card.charge(request),
        })
    }
}
