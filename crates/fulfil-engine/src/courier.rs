//! # Courier Serviceability
//!
//! Turns shipment parameters and a destination into a billable delivery fee.
//!
//! ## Quote Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ShipmentParameters ──► ServiceabilityRequest ──► CourierLookup         │
//! │  + pincode + cod           (whole cm, kg)          (external, async)    │
//! │                                                         │               │
//! │                              tokio::time::timeout ◄─────┘               │
//! │                                    │                                    │
//! │             ┌──────────────────────┼──────────────────────┐             │
//! │             ▼                      ▼                      ▼             │
//! │     timeout / error       serviceable: false      serviceable: true     │
//! │   ServiceUnavailable      fee 0, reason set       fee rounded UP to ₹5  │
//! │                                                                         │
//! │  QuoteTracker: each cart keeps only its latest request. A result that   │
//! │  lands after a newer request was issued is Superseded and dropped.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The normalizer owns the rounding policy. Nothing downstream re-rounds.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use fulfil_core::fee::normalize_quote;
use fulfil_core::validation::validate_pincode;
use fulfil_core::{CourierQuote, DeliveryQuote, Money, ShipmentParameters};

use crate::config::CourierSettings;
use crate::error::{EngineError, EngineResult};

// =============================================================================
// Wire Types
// =============================================================================

/// Serviceability request, as the courier API expects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceabilityRequest {
    pub pickup_pincode: String,
    pub delivery_pincode: String,
    /// Kilograms, fractional.
    pub weight: f64,
    /// Whole centimetres.
    pub length: u32,
    pub breadth: u32,
    pub height: u32,
    /// 1 for cash on delivery, 0 otherwise.
    pub cod: u8,
}

impl ServiceabilityRequest {
    pub fn new(
        pickup_pincode: impl Into<String>,
        delivery_pincode: impl Into<String>,
        shipment: &ShipmentParameters,
        cod: bool,
    ) -> Self {
        let (length, breadth, height) = shipment.courier_dimensions();
        ServiceabilityRequest {
            pickup_pincode: pickup_pincode.into(),
            delivery_pincode: delivery_pincode.into(),
            weight: shipment.courier_weight(),
            length,
            breadth,
            height,
            cod: u8::from(cod),
        }
    }

    pub fn is_cod(&self) -> bool {
        self.cod != 0
    }
}

/// Why a courier lookup produced no answer.
#[derive(Debug, Error)]
pub enum CourierError {
    #[error("courier unreachable: {0}")]
    Transport(String),

    #[error("courier rejected the request: {0}")]
    Rejected(String),
}

// =============================================================================
// Courier Lookup Trait
// =============================================================================

/// An external courier serviceability API.
#[async_trait]
pub trait CourierLookup: Send + Sync {
    async fn check_serviceability(
        &self,
        request: &ServiceabilityRequest,
    ) -> Result<CourierQuote, CourierError>;
}

// =============================================================================
// Delivery Fee Normalizer
// =============================================================================

/// Bounded-time courier lookup plus fee rounding.
pub struct DeliveryFeeNormalizer {
    courier: Arc<dyn CourierLookup>,
    pickup_pincode: String,
    timeout: Duration,
    fee_step: Money,
}

impl DeliveryFeeNormalizer {
    pub fn new(courier: Arc<dyn CourierLookup>, settings: &CourierSettings) -> Self {
        DeliveryFeeNormalizer {
            courier,
            pickup_pincode: settings.pickup_pincode.clone(),
            timeout: settings.timeout(),
            fee_step: settings.fee_step(),
        }
    }

    /// Quotes a parcel to `delivery_pincode`.
    ///
    /// ## Errors
    /// - `Validation` if the pincode is malformed (the courier is not called)
    /// - `ServiceUnavailable` on timeout, courier error, or a negative/NaN charge
    #[instrument(skip(self, shipment), fields(pickup = %self.pickup_pincode))]
    pub async fn quote(
        &self,
        shipment: &ShipmentParameters,
        delivery_pincode: &str,
        cod: bool,
    ) -> EngineResult<DeliveryQuote> {
        let delivery_pincode = delivery_pincode.trim();
        validate_pincode(delivery_pincode)?;

        let request =
            ServiceabilityRequest::new(&self.pickup_pincode, delivery_pincode, shipment, cod);
        debug!(?request, "Requesting courier serviceability");

        let answer = tokio::time::timeout(self.timeout, self.courier.check_serviceability(&request))
            .await
            .map_err(|_| {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Courier lookup timed out");
                EngineError::ServiceUnavailable {
                    reason: format!(
                        "courier lookup timed out after {} ms",
                        self.timeout.as_millis()
                    ),
                }
            })?
            .map_err(|e| {
                warn!(error = %e, "Courier lookup failed");
                EngineError::ServiceUnavailable {
                    reason: e.to_string(),
                }
            })?;

        let quote = normalize_quote(&answer, self.fee_step).map_err(|e| {
            warn!(charge = e.0, "Courier returned a malformed quote");
            EngineError::ServiceUnavailable {
                reason: e.to_string(),
            }
        })?;

        debug!(
            serviceable = quote.serviceable,
            raw_charge = answer.shipping_charge,
            billable_fee = %quote.billable_fee,
            "Courier quote normalized"
        );
        Ok(quote)
    }

    pub fn pickup_pincode(&self) -> &str {
        &self.pickup_pincode
    }
}

// =============================================================================
// Last-Request-Wins
// =============================================================================

/// Proof that a quote request was issued, and in which order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteTicket {
    pub cart_id: String,
    pub sequence: u64,
}

/// Tracks the latest quote request per cart.
///
/// Sequence numbers come from one counter, so they are unique and increasing
/// across all carts.
#[derive(Debug, Default)]
pub struct QuoteTracker {
    next: AtomicU64,
    latest: Mutex<HashMap<String, u64>>,
}

impl QuoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a ticket that supersedes every earlier one for this cart.
    pub async fn begin(&self, cart_id: &str) -> QuoteTicket {
        let sequence = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        self.latest.lock().await.insert(cart_id.to_string(), sequence);
        QuoteTicket {
            cart_id: cart_id.to_string(),
            sequence,
        }
    }

    /// Succeeds only if no newer ticket was issued for the same cart.
    pub async fn accept(&self, ticket: &QuoteTicket) -> EngineResult<()> {
        let latest = self.latest.lock().await.get(&ticket.cart_id).copied();
        match latest {
            Some(latest) if latest == ticket.sequence => Ok(()),
            other => {
                let latest = other.unwrap_or(0);
                warn!(
                    cart_id = %ticket.cart_id,
                    sequence = ticket.sequence,
                    latest,
                    "Discarding superseded courier quote"
                );
                Err(EngineError::Superseded {
                    cart_id: ticket.cart_id.clone(),
                    sequence: ticket.sequence,
                    latest,
                })
            }
        }
    }

    pub async fn latest(&self, cart_id: &str) -> Option<u64> {
        self.latest.lock().await.get(cart_id).copied()
    }

    /// Drops the cart's entry; any ticket still in flight becomes stale.
    pub async fn forget(&self, cart_id: &str) {
        self.latest.lock().await.remove(cart_id);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
