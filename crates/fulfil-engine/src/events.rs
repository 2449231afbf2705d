//! # Transition Events
//!
//! Every applied status change is published as a [`TransitionEvent`] for the
//! surrounding system to persist (audit trail, GST and payout reports).
//!
//! ```text
//! OrderBook ──► TransitionSink::publish ──► OutboxSink ──► mpsc ──► consumer
//!                       │
//!                       └─ failure is logged; the transition stands
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

use fulfil_core::OrderStatus;

// =============================================================================
// Event Types
// =============================================================================

/// Who asked for a transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Customer(String),
    Admin(String),
    System,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Customer(id) => write!(f, "customer:{}", id),
            Actor::Admin(id) => write!(f, "admin:{}", id),
            Actor::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    pub order_id: String,
    #[serde(rename = "fromStatus")]
    pub from: OrderStatus,
    #[serde(rename = "toStatus")]
    pub to: OrderStatus,
    #[serde(rename = "timestamp")]
    pub at: DateTime<Utc>,
    pub actor: Actor,
}

// =============================================================================
// Sinks
// =============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("transition outbox is full")]
    Full,

    #[error("transition outbox is closed")]
    Closed,
}

/// Receives transition events. Must not block.
pub trait TransitionSink: Send + Sync {
    fn publish(&self, event: &TransitionEvent) -> Result<(), SinkError>;
}

/// Discards every event.
pub struct NoOpSink;

impl TransitionSink for NoOpSink {
    fn publish(&self, _event: &TransitionEvent) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Bounded outbox backed by a tokio channel.
#[derive(Debug, Clone)]
pub struct OutboxSink {
    tx: mpsc::Sender<TransitionEvent>,
}

impl OutboxSink {
    /// Creates the sink and the receiving end the consumer drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TransitionEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (OutboxSink { tx }, rx)
    }
}

impl TransitionSink for OutboxSink {
    fn publish(&self, event: &TransitionEvent) -> Result<(), SinkError> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}
