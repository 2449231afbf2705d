//! # Shipment Aggregator
//!
//! Derives one physical parcel (weight, dimensions, volume) from a set of
//! heterogeneous cart lines, for the courier serviceability lookup.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cart lines ──► PackingPolicy::pack ──► fallbacks ──► clamps ──► result │
//! │                                                                         │
//! │  pack      : accumulate lines that carry package info                  │
//! │  fallbacks : a field that is EXACTLY zero takes its default            │
//! │              (0.5 kg, 25 cm, 20 cm, 5 cm), each field independently    │
//! │  clamps    : length ≥ 10, width ≥ 10, height ≥ 2, always               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The function is total: an empty cart falls through to the defaults.
//!
//! ## Packing Policies
//! Packing is a heuristic, so it is a trait. [`StackedPacking`] (the default)
//! places items side by side on the footprint and stacks them vertically:
//! length and width are the maximum over lines, height is `Σ height × qty`.
//! [`SingleBoxPacking`] takes the largest unit in every dimension.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::types::CartLine;

// =============================================================================
// Shipment Parameters
// =============================================================================

/// A single derived parcel. Never persisted on its own.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShipmentParameters {
    /// Kilograms.
    pub total_weight: f64,
    /// Centimetres.
    pub length: f64,
    pub width: f64,
    pub height: f64,
    /// Cubic centimetres, summed over units.
    pub volume: f64,
}

impl ShipmentParameters {
    /// Dimensions as sent to the courier: whole centimetres, rounded.
    pub fn courier_dimensions(&self) -> (u32, u32, u32) {
        (
            round_cm(self.length),
            round_cm(self.width),
            round_cm(self.height),
        )
    }

    /// Weight as sent to the courier: kept fractional, to the gram.
    pub fn courier_weight(&self) -> f64 {
        (self.total_weight * 1000.0).round() / 1000.0
    }

    /// Volumetric weight in kg for a courier's divisor (commonly 5000).
    pub fn volumetric_weight(&self, divisor: f64) -> f64 {
        if divisor <= 0.0 {
            return 0.0;
        }
        let (l, w, h) = self.courier_dimensions();
        (l as f64 * w as f64 * h as f64) / divisor
    }
}

fn round_cm(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}

// =============================================================================
// Defaults
// =============================================================================

/// Fallback and minimum values applied after packing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipmentDefaults {
    pub fallback_weight: f64,
    pub fallback_length: f64,
    pub fallback_width: f64,
    pub fallback_height: f64,
    pub min_length: f64,
    pub min_width: f64,
    pub min_height: f64,
}

impl Default for ShipmentDefaults {
    fn default() -> Self {
        ShipmentDefaults {
            fallback_weight: 0.5,
            fallback_length: 25.0,
            fallback_width: 20.0,
            fallback_height: 5.0,
            min_length: 10.0,
            min_width: 10.0,
            min_height: 2.0,
        }
    }
}

impl ShipmentDefaults {
    /// Applies per-field fallbacks, then the minimum clamps.
    pub fn finish(&self, mut packed: ShipmentParameters) -> ShipmentParameters {
        if packed.total_weight == 0.0 {
            packed.total_weight = self.fallback_weight;
        }
        if packed.length == 0.0 {
            packed.length = self.fallback_length;
        }
        if packed.width == 0.0 {
            packed.width = self.fallback_width;
        }
        if packed.height == 0.0 {
            packed.height = self.fallback_height;
        }

        packed.length = packed.length.max(self.min_length);
        packed.width = packed.width.max(self.min_width);
        packed.height = packed.height.max(self.min_height);
        packed
    }
}

// =============================================================================
// Packing Policies
// =============================================================================

/// Strategy for combining line dimensions into one parcel.
///
/// Implementations only accumulate; fallbacks and clamps are applied by
/// [`aggregate_with`]. Weight and volume are always `Σ value × qty`.
pub trait PackingPolicy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn pack(&self, lines: &[CartLine]) -> ShipmentParameters;
}

/// Side-by-side footprint, vertically stacked units.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackedPacking;

impl PackingPolicy for StackedPacking {
    fn name(&self) -> &'static str {
        "stacked"
    }

    fn pack(&self, lines: &[CartLine]) -> ShipmentParameters {
        let mut out = ShipmentParameters::default();
        for line in lines {
            let Some(info) = &line.package_info else {
                continue;
            };
            let qty = line.quantity as f64;
            out.total_weight += info.weight * qty;

            if let Some(dims) = info.dimensions {
                out.length = out.length.max(dims.length);
                out.width = out.width.max(dims.width);
                out.height += dims.height * qty;
                out.volume += dims.volume() * qty;
            }
        }
        out
    }
}

/// Every unit fits in a box as large as the largest unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleBoxPacking;

impl PackingPolicy for SingleBoxPacking {
    fn name(&self) -> &'static str {
        "single_box"
    }

    fn pack(&self, lines: &[CartLine]) -> ShipmentParameters {
        let mut out = ShipmentParameters::default();
        for line in lines {
            let Some(info) = &line.package_info else {
                continue;
            };
            let qty = line.quantity as f64;
            out.total_weight += info.weight * qty;

            if let Some(dims) = info.dimensions {
                out.length = out.length.max(dims.length);
                out.width = out.width.max(dims.width);
                out.height = out.height.max(dims.height);
                out.volume += dims.volume() * qty;
            }
        }
        out
    }
}

/// Named packing policy, as chosen in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackingKind {
    #[default]
    Stacked,
    SingleBox,
}

impl PackingKind {
    pub fn policy(&self) -> &'static dyn PackingPolicy {
        match self {
            PackingKind::Stacked => &StackedPacking,
            PackingKind::SingleBox => &SingleBoxPacking,
        }
    }
}

impl std::str::FromStr for PackingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "stacked" => Ok(PackingKind::Stacked),
            "single_box" => Ok(PackingKind::SingleBox),
            other => Err(format!(
                "Unknown packing policy: '{}'. Valid options: stacked, single_box",
                other
            )),
        }
    }
}

// =============================================================================
// Aggregation
// =============================================================================

/// Aggregates lines with an explicit policy and defaults.
pub fn aggregate_with(
    lines: &[CartLine],
    policy: &dyn PackingPolicy,
    defaults: &ShipmentDefaults,
) -> ShipmentParameters {
    defaults.finish(policy.pack(lines))
}

/// Aggregates lines with stacked packing and the standard defaults.
///
/// ## Example
/// ```rust
/// use fulfil_core::shipment::aggregate;
///
/// let empty = aggregate(&[]);
/// assert_eq!(empty.total_weight, 0.5);
/// assert_eq!((empty.length, empty.width, empty.height), (25.0, 20.0, 5.0));
/// ```
pub fn aggregate(lines: &[CartLine]) -> ShipmentParameters {
    aggregate_with(lines, &StackedPacking, &ShipmentDefaults::default())
}

// =============================================================================
// Unit Tests
// =============================================================================
