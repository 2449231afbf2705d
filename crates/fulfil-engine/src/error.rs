//! # Engine Error Types
//!
//! Everything the engine can reject with.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Domain (core)  │  │   Upstream      │  │     Freshness           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Validation     │  │  Service        │  │  Superseded             │ │
//! │  │  Policy         │  │  Unavailable    │  │  Stale                  │ │
//! │  │  Conflict       │  │  (timeout,      │  │                         │ │
//! │  │  NotFound       │  │   bad quote)    │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                    │
//! │  │  Configuration  │  The engine never retries: ServiceUnavailable is  │
//! │  │  InvalidConfig  │  the only retryable kind, and retrying is the     │
//! │  │  Load / Save    │  caller's call.                                   │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use fulfil_core::{CoreError, ErrorKind, PolicyError, ValidationError};
use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// A rule from fulfil-core rejected the request.
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Upstream Errors
    // =========================================================================
    /// The courier failed, timed out, or answered with nonsense.
    ///
    /// No fee is ever substituted; checkout stays blocked until a real quote
    /// arrives.
    #[error("Delivery service unavailable: {reason}")]
    ServiceUnavailable { reason: String },

    // =========================================================================
    // Freshness Errors
    // =========================================================================
    /// A newer quote request for the same cart was issued while this one was
    /// in flight. The result was discarded.
    #[error("Quote request {sequence} for cart {cart_id} was superseded by request {latest}")]
    Superseded {
        cart_id: String,
        sequence: u64,
        latest: u64,
    },

    /// A derived field was read after the inputs it depends on changed.
    #[error("{field} is out of date; recompute it first")]
    Stale { field: &'static str },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Core(err.into())
    }
}

impl From<PolicyError> for EngineError {
    fn from(err: PolicyError) -> Self {
        EngineError::Core(err.into())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl EngineError {
    /// Coarse kind, for rendering a message or picking an API status.
    ///
    /// Freshness errors are conflicts: the caller raced its own cart.
    /// Configuration errors are validation failures of the config input.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Core(err) => err.kind(),
            EngineError::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            EngineError::Superseded { .. } | EngineError::Stale { .. } => ErrorKind::Conflict,
            EngineError::InvalidConfig(_)
            | EngineError::ConfigLoadFailed(_)
            | EngineError::ConfigSaveFailed(_) => ErrorKind::Validation,
        }
    }

    /// Returns true if the same request may succeed later unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ServiceUnavailable { .. })
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidConfig(_)
                | EngineError::ConfigLoadFailed(_)
                | EngineError::ConfigSaveFailed(_)
        )
    }

    /// The wrapped domain error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            EngineError::Core(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fulfil_core::OrderStatus;

    #[test]
    fn test_retryable_errors() {
        assert!(EngineError::ServiceUnavailable {
            reason: "timeout".into()
        }
        .is_retryable());

        assert!(!EngineError::Stale { field: "quote" }.is_retryable());
        assert!(!EngineError::InvalidConfig("bad".into()).is_retryable());
        assert!(!EngineError::from(PolicyError::EmptyCart).is_retryable());
    }

    #[test]
    fn test_kinds() {
        let conflict: EngineError = CoreError::Conflict {
            order_id: "o-1".into(),
            current: OrderStatus::Cancelled,
            requested: OrderStatus::Cancelled,
        }
        .into();
        assert_eq!(conflict.kind(), ErrorKind::Conflict);
        assert_eq!(
            EngineError::Superseded {
                cart_id: "c".into(),
                sequence: 1,
                latest: 2
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            EngineError::from(ValidationError::Required {
                field: "reason".into()
            })
            .kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_core_message_is_transparent() {
        let err: EngineError = CoreError::Conflict {
            order_id: "o-9".into(),
            current: OrderStatus::Delivered,
            requested: OrderStatus::Cancelled,
        }
        .into();
        assert_eq!(err.to_string(), "Order o-9 is delivered, cannot move to cancelled");
    }
}
