//! Order entity and the collaborator traits around it.
//!
//! Orders are owned by the host commerce platform; this crate only reads
//! them, attaches BTCPay invoice metadata, and advances the workflow
//! exactly once when payment settles. Both collaborators are reached
//! through traits so hosts can plug in their own entities.

use crate::money::Money;
use crate::{InvoiceId, OrderId, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Checkout step the buyer is sent back to on payment failure.
pub const PAYMENT_INFORMATION_STEP: &str = "payment_information";

/// Workflow state of an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    /// In checkout, not yet placed.
    #[default]
    Draft,
    /// Placed; payment settled.
    Placed,
    /// Fulfilled by the merchant.
    Completed,
    /// Canceled.
    Canceled,
}

/// BTCPay metadata stored on the order at invoice-creation time.
///
/// Only the id, expiration and a status snapshot are kept; the full
/// invoice is always re-fetched, never trusted from this cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BtcPayData {
    /// Remote invoice id.
    pub invoice_id: InvoiceId,
    /// Unix timestamp the invoice expires at.
    pub expiration_time: i64,
    /// Remote status at creation time.
    pub status: String,
}

/// A commerce order, referenced not owned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order id.
    pub id: OrderId,
    /// Order total.
    pub total: Money,
    /// Customer email, if known.
    pub email: Option<String>,
    /// Workflow state.
    pub state: OrderState,
    /// Linked BTCPay invoice metadata, set once at invoice creation.
    pub btcpay: Option<BtcPayData>,
}

impl Order {
    /// Create a draft order.
    pub fn new(id: impl Into<OrderId>, total: Money) -> Self {
        Self {
            id: id.into(),
            total,
            email: None,
            state: OrderState::Draft,
            btcpay: None,
        }
    }

    /// Set the customer email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Lookup and persistence of orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Load an order by id. `Ok(None)` when unknown.
    async fn load(&self, id: &OrderId) -> Result<Option<Order>>;

    /// Persist an order.
    async fn save(&self, order: &Order) -> Result<()>;
}

/// The host checkout flow: step tracking, order placement, rerouting.
#[async_trait]
pub trait CheckoutWorkflow: Send + Sync {
    /// The step the order's checkout currently sits on.
    async fn current_step(&self, order: &Order) -> String;

    /// Advance the order out of checkout (place it). Called at most once
    /// per order, guarded by the reconciler's draft-state check.
    async fn advance(&self, order: &mut Order) -> Result<()>;

    /// Send the buyer back to an earlier checkout step.
    async fn rewind_to_step(&self, order: &Order, step_id: &str) -> Result<()>;
}

/// In-memory order store for tests and single-process use.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: Mutex<HashMap<OrderId, Order>>,
}

impl InMemoryOrderRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an order.
    pub fn insert(&self, order: Order) {
        let mut orders = self.orders.lock().unwrap_or_else(|e| e.into_inner());
        orders.insert(order.id.clone(), order);
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn load(&self, id: &OrderId) -> Result<Option<Order>> {
        let orders = self.orders.lock().unwrap_or_else(|e| e.into_inner());
        Ok(orders.get(id).cloned())
    }

    async fn save(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.lock().unwrap_or_else(|e| e.into_inner());
        orders.insert(order.id.clone(), order.clone());
        Ok(())
    }
}

/// In-memory checkout flow that records rewinds, for tests and demos.
#[derive(Default)]
pub struct InMemoryCheckoutFlow {
    rewinds: Mutex<Vec<(OrderId, String)>>,
}

impl InMemoryCheckoutFlow {
    /// Creates a flow with no recorded rewinds.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times a buyer was sent backward.
    pub fn rewind_count(&self) -> usize {
        let rewinds = self.rewinds.lock().unwrap_or_else(|e| e.into_inner());
        rewinds.len()
    }

    /// Recorded rewinds as `(order, step)` pairs.
    pub fn rewinds(&self) -> Vec<(OrderId, String)> {
        let rewinds = self.rewinds.lock().unwrap_or_else(|e| e.into_inner());
        rewinds.clone()
    }
}

#[async_trait]
impl CheckoutWorkflow for InMemoryCheckoutFlow {
    async fn current_step(&self, order: &Order) -> String {
        match order.state {
            OrderState::Draft => "payment".to_string(),
            _ => "complete".to_string(),
        }
    }

    async fn advance(&self, order: &mut Order) -> Result<()> {
        if order.state != OrderState::Draft {
            debug!(order = %order.id, state = ?order.state, "order already advanced, skipping");
            return Ok(());
        }
        order.state = OrderState::Placed;
        Ok(())
    }

    async fn rewind_to_step(&self, order: &Order, step_id: &str) -> Result<()> {
        let mut rewinds = self.rewinds.lock().unwrap_or_else(|e| e.into_inner());
        rewinds.push((order.id.clone(), step_id.to_string()));
        Ok(())
    }
}
