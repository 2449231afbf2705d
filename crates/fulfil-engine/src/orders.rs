//! # Order Book
//!
//! Holds placed orders and applies lifecycle transitions one at a time per
//! order.
//!
//! ## Thread Safety
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RwLock<HashMap<order_id, Arc<Mutex<Order>>>>                           │
//! │                                                                         │
//! │  cancel(o-1) ──┐                                                        │
//! │                ├──► lock(o-1) ──► check table ──► apply ──► emit event  │
//! │  deliver(o-1) ─┘         │                                              │
//! │                          └─ the second caller sees the first caller's   │
//! │                             result and gets a Conflict, never a lost    │
//! │                             update                                      │
//! │                                                                         │
//! │  Transitions on different orders never wait on each other.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each transition runs against a copy of the order and is committed only if
//! every check passed. Callers holding an older snapshot may pass
//! `expected_version`; a mismatch is a Conflict naming the current status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{info, instrument, warn};

use fulfil_core::lifecycle::ReturnSubmission;
use fulfil_core::{
    CoreError, CoreResult, Order, OrderStatus, RefundBreakdown, StatusChange, ValidationError,
};

use crate::config::OrderSettings;
use crate::coupons::OrderHistory;
use crate::error::EngineResult;
use crate::events::{Actor, NoOpSink, OutboxSink, TransitionEvent, TransitionSink};

pub struct OrderBook {
    orders: RwLock<HashMap<String, Arc<Mutex<Order>>>>,
    sink: Arc<dyn TransitionSink>,
    return_window: chrono::Duration,
}

impl OrderBook {
    pub fn new(settings: &OrderSettings) -> Self {
        Self::with_sink(settings, Arc::new(NoOpSink))
    }

    /// Book whose events go to a bounded outbox sized by
    /// `orders.outbox_capacity`. The receiver is the outbox's read end.
    pub fn with_outbox(settings: &OrderSettings) -> (Self, mpsc::Receiver<TransitionEvent>) {
        let (sink, rx) = OutboxSink::channel(settings.outbox_capacity);
        (Self::with_sink(settings, Arc::new(sink)), rx)
    }

    pub fn with_sink(settings: &OrderSettings, sink: Arc<dyn TransitionSink>) -> Self {
        OrderBook {
            orders: RwLock::new(HashMap::new()),
            sink,
            return_window: settings.return_window(),
        }
    }

    // =========================================================================
    // Storage
    // =========================================================================

    /// Stores a newly placed order.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn place(&self, order: Order) -> EngineResult<Order> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(ValidationError::Duplicate {
                field: "order_id".to_string(),
                value: order.id.clone(),
            }
            .into());
        }
        info!(
            user_id = %order.user_id,
            grand_total = %order.totals.grand_total,
            "Order placed"
        );
        orders.insert(order.id.clone(), Arc::new(Mutex::new(order.clone())));
        Ok(order)
    }

    /// Returns a snapshot of an order.
    pub async fn get(&self, order_id: &str) -> EngineResult<Order> {
        let handle = self.handle(order_id).await?;
        let order = handle.lock().await;
        Ok(order.clone())
    }

    /// Snapshots of every order for a user, oldest first.
    pub async fn list_for_user(&self, user_id: &str) -> Vec<Order> {
        let handles: Vec<_> = self.orders.read().await.values().cloned().collect();
        let mut out = Vec::new();
        for handle in handles {
            let order = handle.lock().await;
            if order.user_id == user_id {
                out.push(order.clone());
            }
        }
        out.sort_by_key(|o| o.placed_at);
        out
    }

    async fn handle(&self, order_id: &str) -> EngineResult<Arc<Mutex<Order>>> {
        self.orders
            .read()
            .await
            .get(order_id)
            .cloned()
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "order",
                    id: order_id.to_string(),
                }
                .into()
            })
    }

    // =========================================================================
    // Transition Core
    // =========================================================================

    /// Runs `step` under the order's lock and publishes the resulting event.
    async fn transition<T>(
        &self,
        order_id: &str,
        expected_version: Option<u64>,
        requested: OrderStatus,
        actor: Actor,
        step: impl FnOnce(&mut Order, DateTime<Utc>) -> CoreResult<(StatusChange, T)>,
    ) -> EngineResult<(Order, T)> {
        let handle = self.handle(order_id).await?;
        let mut current = handle.lock().await;

        if let Some(expected) = expected_version {
            if current.version != expected {
                warn!(
                    order_id,
                    expected,
                    actual = current.version,
                    "Stale order version"
                );
                return Err(CoreError::Conflict {
                    order_id: order_id.to_string(),
                    current: current.status,
                    requested,
                }
                .into());
            }
        }

        let now = Utc::now();
        let mut next = current.clone();
        let (change, extra) = step(&mut next, now)?;
        *current = next;

        let event = TransitionEvent {
            order_id: order_id.to_string(),
            from: change.from,
            to: change.to,
            at: now,
            actor,
        };
        info!(
            order_id,
            from = %change.from,
            to = %change.to,
            actor = %event.actor,
            version = current.version,
            "Order transition"
        );
        if let Err(e) = self.sink.publish(&event) {
            warn!(order_id, error = %e, "Failed to publish transition event");
        }

        Ok((current.clone(), extra))
    }

    async fn simple(
        &self,
        order_id: &str,
        expected_version: Option<u64>,
        requested: OrderStatus,
        actor: Actor,
        step: impl FnOnce(&mut Order, DateTime<Utc>) -> CoreResult<StatusChange>,
    ) -> EngineResult<Order> {
        let (order, ()) = self
            .transition(order_id, expected_version, requested, actor, |o, now| {
                step(o, now).map(|c| (c, ()))
            })
            .await?;
        Ok(order)
    }

    // =========================================================================
    // Fulfilment
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn confirm(
        &self,
        order_id: &str,
        expected_version: Option<u64>,
        actor: Actor,
    ) -> EngineResult<Order> {
        self.simple(order_id, expected_version, OrderStatus::Confirmed, actor, |o, now| {
            o.confirm(now)
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn start_processing(
        &self,
        order_id: &str,
        expected_version: Option<u64>,
        actor: Actor,
    ) -> EngineResult<Order> {
        self.simple(order_id, expected_version, OrderStatus::Processing, actor, |o, now| {
            o.start_processing(now)
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn ship(
        &self,
        order_id: &str,
        expected_version: Option<u64>,
        actor: Actor,
    ) -> EngineResult<Order> {
        self.simple(order_id, expected_version, OrderStatus::Shipped, actor, |o, now| {
            o.ship(now)
        })
        .await
    }

    /// Marks delivered and opens the configured return window.
    #[instrument(skip(self))]
    pub async fn deliver(
        &self,
        order_id: &str,
        expected_version: Option<u64>,
        actor: Actor,
    ) -> EngineResult<Order> {
        let window = self.return_window;
        self.simple(order_id, expected_version, OrderStatus::Delivered, actor, move |o, now| {
            o.deliver(now, window)
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        order_id: &str,
        expected_version: Option<u64>,
        actor: Actor,
    ) -> EngineResult<Order> {
        self.simple(order_id, expected_version, OrderStatus::Cancelled, actor, |o, now| {
            o.cancel(now)
        })
        .await
    }

    // =========================================================================
    // Returns
    // =========================================================================

    #[instrument(skip(self, submission), fields(return_id = %submission.id))]
    pub async fn request_return(
        &self,
        order_id: &str,
        submission: ReturnSubmission,
        expected_version: Option<u64>,
        actor: Actor,
    ) -> EngineResult<Order> {
        self.simple(
            order_id,
            expected_version,
            OrderStatus::ReturnRequested,
            actor,
            move |o, now| o.request_return(submission, now),
        )
        .await
    }

    /// Approves the open return; the breakdown is what the payout owes.
    #[instrument(skip(self))]
    pub async fn approve_return(
        &self,
        order_id: &str,
        expected_version: Option<u64>,
        actor: Actor,
    ) -> EngineResult<(Order, RefundBreakdown)> {
        let (order, breakdown) = self
            .transition(
                order_id,
                expected_version,
                OrderStatus::ReturnApproved,
                actor,
                |o, now| o.approve_return(now),
            )
            .await?;
        info!(
            order_id,
            refund_amount = %breakdown.refund_amount,
            gst_reversal_amount = %breakdown.gst_reversal_amount,
            "Return approved"
        );
        Ok((order, breakdown))
    }

    #[instrument(skip(self))]
    pub async fn reject_return(
        &self,
        order_id: &str,
        expected_version: Option<u64>,
        actor: Actor,
    ) -> EngineResult<Order> {
        self.simple(order_id, expected_version, OrderStatus::Delivered, actor, |o, now| {
            o.reject_return(now)
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn mark_refunded(
        &self,
        order_id: &str,
        expected_version: Option<u64>,
        actor: Actor,
    ) -> EngineResult<Order> {
        self.simple(order_id, expected_version, OrderStatus::Refunded, actor, |o, now| {
            o.mark_refunded(now)
        })
        .await
    }

    /// Records the payout of a cancelled prepaid order. No status change, so
    /// no event.
    #[instrument(skip(self))]
    pub async fn settle_cancellation_refund(&self, order_id: &str) -> EngineResult<Order> {
        let handle = self.handle(order_id).await?;
        let mut order = handle.lock().await;
        order.settle_cancellation_refund(Utc::now())?;
        info!(order_id, "Cancellation refund settled");
        Ok(order.clone())
    }
}

#[async_trait]
impl OrderHistory for OrderBook {
    async fn has_completed_order(&self, user_id: &str) -> EngineResult<bool> {
        let handles: Vec<_> = self.orders.read().await.values().cloned().collect();
        for handle in handles {
            let order = handle.lock().await;
            if order.user_id == user_id && order.was_delivered() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
