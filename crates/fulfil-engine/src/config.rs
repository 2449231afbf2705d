//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FULFIL_PICKUP_PINCODE=560001                                       │
//! │     FULFIL_COURIER_TIMEOUT_MS=3000                                     │
//! │     FULFIL_RETURN_WINDOW_DAYS=7                                        │
//! │     FULFIL_FEE_STEP_RUPEES=5                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/fulfil/fulfil.toml (Linux)                               │
//! │     ~/Library/Application Support/in.fulfil.engine/fulfil.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [shipment]
//! packing = "stacked"      # stacked | single_box
//! fallback_weight = 0.5
//! min_height = 2.0
//!
//! [courier]
//! pickup_pincode = "560001"
//! timeout_ms = 3000
//! fee_step_rupees = 5
//!
//! [courier.rate_card]
//! serviceable_prefixes = ["56", "40", "11"]
//! base_charge = 40.0
//! slab_charge = 18.5
//! cod_surcharge = 25.0
//!
//! [orders]
//! return_window_days = 7
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use fulfil_core::fee::DEFAULT_FEE_STEP;
use fulfil_core::validation::validate_pincode;
use fulfil_core::{Money, PackingKind, ShipmentDefaults, DEFAULT_RETURN_WINDOW_DAYS};

use crate::error::{EngineError, EngineResult};
use crate::rate_card::RateCard;

// =============================================================================
// Shipment Settings
// =============================================================================

/// How cart lines are combined into a parcel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipmentSettings {
    #[serde(default)]
    pub packing: PackingKind,

    /// Fallbacks and minimum clamps.
    #[serde(default, flatten)]
    pub defaults: ShipmentDefaults,
}

// =============================================================================
// Courier Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierSettings {
    /// Warehouse pincode every parcel ships from.
    #[serde(default = "default_pickup_pincode")]
    pub pickup_pincode: String,

    /// Upper bound on a single serviceability lookup (milliseconds).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Quotes are rounded up to a multiple of this many rupees.
    #[serde(default = "default_fee_step_rupees")]
    pub fee_step_rupees: i64,

    /// Local rate card, used when no remote courier is wired in.
    #[serde(default)]
    pub rate_card: RateCard,
}

fn default_pickup_pincode() -> String {
    "560001".to_string()
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_fee_step_rupees() -> i64 {
    DEFAULT_FEE_STEP.rupees()
}

impl Default for CourierSettings {
    fn default() -> Self {
        CourierSettings {
            pickup_pincode: default_pickup_pincode(),
            timeout_ms: default_timeout_ms(),
            fee_step_rupees: default_fee_step_rupees(),
            rate_card: RateCard::default(),
        }
    }
}

impl CourierSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn fee_step(&self) -> Money {
        Money::from_rupees(self.fee_step_rupees)
    }
}

// =============================================================================
// Order Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSettings {
    /// Days after delivery during which a return may be requested.
    #[serde(default = "default_return_window_days")]
    pub return_window_days: i64,

    /// Capacity of the transition event outbox channel.
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
}

/// Ten years; longer windows are a typo, not a policy.
pub const MAX_RETURN_WINDOW_DAYS: i64 = 3650;

fn default_return_window_days() -> i64 {
    DEFAULT_RETURN_WINDOW_DAYS
}

fn default_outbox_capacity() -> usize {
    1024
}

impl Default for OrderSettings {
    fn default() -> Self {
        OrderSettings {
            return_window_days: default_return_window_days(),
            outbox_capacity: default_outbox_capacity(),
        }
    }
}

impl OrderSettings {
    /// The window as a duration, clamped to what `validate` accepts.
    pub fn return_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.return_window_days.clamp(0, MAX_RETURN_WINDOW_DAYS))
    }
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub shipment: ShipmentSettings,

    #[serde(default)]
    pub courier: CourierSettings,

    #[serde(default)]
    pub orders: OrderSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (fulfil.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    pub fn validate(&self) -> EngineResult<()> {
        validate_pincode(&self.courier.pickup_pincode)
            .map_err(|e| EngineError::InvalidConfig(format!("courier.pickup_pincode: {}", e)))?;

        if self.courier.timeout_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "courier.timeout_ms must be greater than 0".into(),
            ));
        }

        if self.courier.fee_step_rupees <= 0 {
            return Err(EngineError::InvalidConfig(
                "courier.fee_step_rupees must be greater than 0".into(),
            ));
        }

        if !(0..=MAX_RETURN_WINDOW_DAYS).contains(&self.orders.return_window_days) {
            return Err(EngineError::InvalidConfig(format!(
                "orders.return_window_days must be between 0 and {}",
                MAX_RETURN_WINDOW_DAYS
            )));
        }

        if self.orders.outbox_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "orders.outbox_capacity must be greater than 0".into(),
            ));
        }

        let d = &self.shipment.defaults;
        let dims = [
            ("fallback_weight", d.fallback_weight),
            ("fallback_length", d.fallback_length),
            ("fallback_width", d.fallback_width),
            ("fallback_height", d.fallback_height),
        ];
        for (field, value) in dims {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineError::InvalidConfig(format!(
                    "shipment.{} must be a positive number",
                    field
                )));
            }
        }
        let mins = [
            ("min_length", d.min_length),
            ("min_width", d.min_width),
            ("min_height", d.min_height),
        ];
        for (field, value) in mins {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::InvalidConfig(format!(
                    "shipment.{} cannot be negative",
                    field
                )));
            }
        }

        self.courier
            .rate_card
            .validate()
            .map_err(|reason| EngineError::InvalidConfig(format!("courier.rate_card: {}", reason)))?;

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(pincode) = std::env::var("FULFIL_PICKUP_PINCODE") {
            debug!(pincode = %pincode, "Overriding pickup pincode from environment");
            self.courier.pickup_pincode = pincode;
        }

        if let Ok(timeout) = std::env::var("FULFIL_COURIER_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(ms) => self.courier.timeout_ms = ms,
                Err(_) => warn!(value = %timeout, "Ignoring invalid FULFIL_COURIER_TIMEOUT_MS"),
            }
        }

        if let Ok(days) = std::env::var("FULFIL_RETURN_WINDOW_DAYS") {
            match days.parse::<i64>() {
                Ok(d) => self.orders.return_window_days = d,
                Err(_) => warn!(value = %days, "Ignoring invalid FULFIL_RETURN_WINDOW_DAYS"),
            }
        }

        if let Ok(step) = std::env::var("FULFIL_FEE_STEP_RUPEES") {
            match step.parse::<i64>() {
                Ok(s) => self.courier.fee_step_rupees = s,
                Err(_) => warn!(value = %step, "Ignoring invalid FULFIL_FEE_STEP_RUPEES"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("in", "fulfil", "engine")
            .map(|dirs| dirs.config_dir().join("fulfil.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.courier.fee_step(), Money::from_rupees(5));
        assert_eq!(config.orders.return_window(), chrono::Duration::days(7));
        assert_eq!(config.shipment.packing, PackingKind::Stacked);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.courier.pickup_pincode = "0123".to_string();
        assert!(config.validate().unwrap_err().is_config_error());

        config.courier.pickup_pincode = "400001".to_string();
        config.courier.timeout_ms = 0;
        assert!(config.validate().is_err());

        config.courier.timeout_ms = 500;
        config.shipment.defaults.fallback_weight = 0.0;
        assert!(config.validate().is_err());

        config.shipment.defaults.fallback_weight = 0.5;
        assert!(config.validate().is_ok());

        config.orders.return_window_days = 100_000_000_000;
        assert!(config.validate().unwrap_err().is_config_error());
        config.orders.return_window_days = -1;
        assert!(config.validate().is_err());
        config.orders.return_window_days = MAX_RETURN_WINDOW_DAYS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_return_window_is_clamped() {
        let settings = OrderSettings {
            return_window_days: 100_000_000_000,
            ..OrderSettings::default()
        };
        assert_eq!(
            settings.return_window(),
            chrono::Duration::days(MAX_RETURN_WINDOW_DAYS)
        );
    }

    #[test]
    fn test_partial_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            [shipment]
            packing = "single_box"
            min_height = 3.0

            [orders]
            return_window_days = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.shipment.packing, PackingKind::SingleBox);
        assert_eq!(config.shipment.defaults.min_height, 3.0);
        assert_eq!(config.shipment.defaults.fallback_length, 25.0);
        assert_eq!(config.orders.return_window_days, 10);
        assert_eq!(config.courier.timeout_ms, 3000);
    }

    #[test]
    fn test_toml_round_trip_sections() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[shipment]"));
        assert!(toml_str.contains("[courier]"));
        assert!(toml_str.contains("[orders]"));
    }

    #[test]
    fn test_load_from_explicit_path() {
        let path = std::env::temp_dir().join(format!("fulfil-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[courier]\npickup_pincode = \"110001\"\n").unwrap();

        let config = EngineConfig::load(Some(path.clone())).unwrap();
        assert_eq!(config.courier.pickup_pincode, "110001");

        std::fs::remove_file(path).unwrap();
    }
}
