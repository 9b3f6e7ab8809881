//! Local payment records and the ledger that owns them.
//!
//! The ledger enforces the two invariants the reconciliation core leans
//! on: at most one payment row per `(order, invoice)` pair, and no
//! lifecycle regressions. The whole find-or-create-or-update cycle for a
//! key must be atomic; concurrent notification deliveries for the same
//! invoice serialize here.

use crate::mapper::{allows_transition, PaymentState};
use crate::money::Money;
use crate::{GatewayError, InvoiceId, OrderId, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::warn;

/// A local payment record, keyed by `(order_id, remote_id)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Local payment id.
    pub id: String,
    /// The order this payment belongs to.
    pub order_id: OrderId,
    /// The remote invoice funding this payment.
    pub remote_id: InvoiceId,
    /// Lifecycle state.
    pub state: PaymentState,
    /// Payment amount.
    pub amount: Money,
    /// Last remote status string applied to this record.
    pub remote_state: String,
    /// Cumulative refunded amount.
    pub refunded_amount: Money,
}

impl Payment {
    /// Amount still refundable.
    pub fn refundable_amount(&self) -> Money {
        self.amount
            .checked_sub(&self.refunded_amount)
            .unwrap_or_else(|| Money::zero(self.amount.currency_code.clone()))
    }
}

/// What an upsert did to the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No row existed; one was created.
    Created,
    /// The row transitioned to a new state.
    Updated,
    /// The target state equals the current state.
    Unchanged,
    /// The transition was a lifecycle regression and was not applied.
    StaleIgnored,
}

impl UpsertOutcome {
    /// True when this upsert actually changed the payment state, i.e.
    /// exactly-once side effects keyed off it should fire.
    pub fn transitioned(&self) -> bool {
        matches!(self, Self::Created | Self::Updated)
    }
}

/// Storage of local payment records.
///
/// # Atomicity
///
/// `upsert` MUST be atomic per `(order_id, remote_id)` key: no other
/// caller may observe the row between the lookup and the write.
/// Concurrent upserts for one invoice must never produce two rows.
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Look up the payment for an `(order, invoice)` pair.
    async fn find(&self, order_id: &OrderId, remote_id: &InvoiceId) -> Result<Option<Payment>>;

    /// Create or update the payment for an `(order, invoice)` pair.
    ///
    /// Creates the row on first touch. On later touches the state moves
    /// only forward: a regressive `target_state` (stale or replayed
    /// notification) is reported as [`UpsertOutcome::StaleIgnored`] and
    /// leaves the row untouched. Never an error; replay is expected.
    async fn upsert(
        &self,
        order_id: &OrderId,
        remote_id: &InvoiceId,
        target_state: PaymentState,
        remote_status: &str,
        amount: Money,
    ) -> Result<(Payment, UpsertOutcome)>;

    /// Void an authorized payment.
    async fn void(&self, payment_id: &str) -> Result<Payment>;

    /// Refund a completed payment, fully (no amount) or partially.
    async fn refund(&self, payment_id: &str, amount: Option<Money>) -> Result<Payment>;
}

/// In-memory ledger.
///
/// One mutex guards the whole map, so the read-modify-write cycle of
/// `upsert` holds the lock from lookup to write. Suitable for tests and
/// single-process deployments; a database-backed implementation must
/// provide the same per-key atomicity via transactions.
#[derive(Default)]
pub struct InMemoryPaymentLedger {
    payments: Mutex<HashMap<(OrderId, InvoiceId), Payment>>,
}

impl InMemoryPaymentLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of payment rows.
    pub fn len(&self) -> usize {
        let payments = self.payments.lock().unwrap_or_else(|e| e.into_inner());
        payments.len()
    }

    /// True if no payments are recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_payment_by_id<T>(
        &self,
        payment_id: &str,
        apply: impl FnOnce(&mut Payment) -> Result<T>,
    ) -> Result<T> {
        let mut payments = self.payments.lock().unwrap_or_else(|e| e.into_inner());
        let payment = payments
            .values_mut()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| GatewayError::PaymentNotFound(payment_id.to_string()))?;
        apply(payment)
    }
}

fn assert_payment_state(payment: &Payment, expected: &[PaymentState]) -> Result<()> {
    if expected.contains(&payment.state) {
        return Ok(());
    }
    Err(GatewayError::InvalidPaymentState {
        payment_id: payment.id.clone(),
        actual: payment.state.to_string(),
        expected: expected.iter().map(|s| s.as_str()).collect(),
    })
}

#[async_trait]
impl PaymentLedger for InMemoryPaymentLedger {
    async fn find(&self, order_id: &OrderId, remote_id: &InvoiceId) -> Result<Option<Payment>> {
        let payments = self.payments.lock().unwrap_or_else(|e| e.into_inner());
        Ok(payments
            .get(&(order_id.clone(), remote_id.clone()))
            .cloned())
    }

    async fn upsert(
        &self,
        order_id: &OrderId,
        remote_id: &InvoiceId,
        target_state: PaymentState,
        remote_status: &str,
        amount: Money,
    ) -> Result<(Payment, UpsertOutcome)> {
        let mut payments = self.payments.lock().unwrap_or_else(|e| e.into_inner());
        let key = (order_id.clone(), remote_id.clone());

        let existing = match payments.entry(key) {
            Entry::Vacant(slot) => {
                let payment = Payment {
                    id: uuid::Uuid::new_v4().to_string(),
                    order_id: order_id.clone(),
                    remote_id: remote_id.clone(),
                    state: target_state,
                    amount: amount.clone(),
                    remote_state: remote_status.to_string(),
                    refunded_amount: Money::zero(amount.currency_code.clone()),
                };
                slot.insert(payment.clone());
                return Ok((payment, UpsertOutcome::Created));
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        if existing.state == target_state {
            // Same tier, possibly a different remote string (confirmed
            // and complete both map to completed). Record the latest.
            existing.remote_state = remote_status.to_string();
            return Ok((existing.clone(), UpsertOutcome::Unchanged));
        }

        if !allows_transition(existing.state, target_state) {
            warn!(
                payment = %existing.id,
                invoice = %remote_id,
                current = %existing.state,
                target = %target_state,
                remote_status,
                "ignoring stale remote status, would regress payment state"
            );
            return Ok((existing.clone(), UpsertOutcome::StaleIgnored));
        }

        existing.state = target_state;
        existing.remote_state = remote_status.to_string();
        existing.amount = amount;
        Ok((existing.clone(), UpsertOutcome::Updated))
    }

    async fn void(&self, payment_id: &str) -> Result<Payment> {
        self.with_payment_by_id(payment_id, |payment| {
            assert_payment_state(payment, &[PaymentState::Authorization])?;
            payment.state = PaymentState::AuthorizationVoided;
            Ok(payment.clone())
        })
    }

    async fn refund(&self, payment_id: &str, amount: Option<Money>) -> Result<Payment> {
        self.with_payment_by_id(payment_id, |payment| {
            assert_payment_state(
                payment,
                &[PaymentState::Completed, PaymentState::PartiallyRefunded],
            )?;

            let available = payment.refundable_amount();
            let requested = amount.unwrap_or_else(|| available.clone());
            if !requested.same_currency(&payment.amount) {
                return Err(GatewayError::CurrencyMismatch {
                    left: requested.currency_code.clone(),
                    right: payment.amount.currency_code.clone(),
                });
            }
            if requested.greater_than(&available) {
                return Err(GatewayError::RefundExceedsAmount {
                    requested,
                    available,
                });
            }

            let new_refunded = payment
                .refunded_amount
                .checked_add(&requested)
                .ok_or(GatewayError::Overflow)?;
            payment.state = if new_refunded.less_than(&payment.amount) {
                PaymentState::PartiallyRefunded
            } else {
                PaymentState::Refunded
            };
            payment.refunded_amount = new_refunded;
            Ok(payment.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eur(value: &str) -> Money {
        Money::parse(value, "EUR").unwrap()
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let ledger = InMemoryPaymentLedger::new();
        let order: OrderId = "O1".into();
        let invoice: InvoiceId = "INV1".into();

        let (payment, outcome) = ledger
            .upsert(&order, &invoice, PaymentState::Authorization, "paid", eur("10.00"))
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);
        assert_eq!(payment.state, PaymentState::Authorization);
        assert_eq!(payment.remote_state, "paid");

        let (payment, outcome) = ledger
            .upsert(&order, &invoice, PaymentState::Completed, "confirmed", eur("10.00"))
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(payment.state, PaymentState::Completed);
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_status_does_not_downgrade() {
        let ledger = InMemoryPaymentLedger::new();
        let order: OrderId = "O1".into();
        let invoice: InvoiceId = "INV1".into();

        ledger
            .upsert(&order, &invoice, PaymentState::Completed, "confirmed", eur("10.00"))
            .await
            .unwrap();

        // A replayed webhook carrying the earlier status arrives late.
        let (payment, outcome) = ledger
            .upsert(&order, &invoice, PaymentState::Authorization, "paid", eur("10.00"))
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::StaleIgnored);
        assert_eq!(payment.state, PaymentState::Completed);
        assert_eq!(payment.remote_state, "confirmed");
    }

    #[tokio::test]
    async fn test_identical_redelivery_is_unchanged() {
        let ledger = InMemoryPaymentLedger::new();
        let order: OrderId = "O1".into();
        let invoice: InvoiceId = "INV1".into();

        ledger
            .upsert(&order, &invoice, PaymentState::Completed, "confirmed", eur("10.00"))
            .await
            .unwrap();
        let (_, outcome) = ledger
            .upsert(&order, &invoice, PaymentState::Completed, "complete", eur("10.00"))
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Unchanged);
        assert!(!outcome.transitioned());
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_invoices_get_distinct_rows() {
        let ledger = InMemoryPaymentLedger::new();
        let order: OrderId = "O1".into();

        ledger
            .upsert(&order, &"INV1".into(), PaymentState::AuthorizationExpired, "expired", eur("10.00"))
            .await
            .unwrap();
        // A second invoice for the same order after the first expired.
        ledger
            .upsert(&order, &"INV2".into(), PaymentState::Completed, "confirmed", eur("10.00"))
            .await
            .unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn test_void_requires_authorization() {
        let ledger = InMemoryPaymentLedger::new();
        let (payment, _) = ledger
            .upsert(&"O1".into(), &"INV1".into(), PaymentState::Authorization, "paid", eur("10.00"))
            .await
            .unwrap();

        let voided = ledger.void(&payment.id).await.unwrap();
        assert_eq!(voided.state, PaymentState::AuthorizationVoided);

        let err = ledger.void(&payment.id).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidPaymentState { .. }));
    }

    #[tokio::test]
    async fn test_partial_then_full_refund() {
        let ledger = InMemoryPaymentLedger::new();
        let (payment, _) = ledger
            .upsert(&"O1".into(), &"INV1".into(), PaymentState::Completed, "complete", eur("10.00"))
            .await
            .unwrap();

        let partial = ledger
            .refund(&payment.id, Some(eur("4.00")))
            .await
            .unwrap();
        assert_eq!(partial.state, PaymentState::PartiallyRefunded);
        assert_eq!(partial.refunded_amount, eur("4.00"));
        assert_eq!(partial.refundable_amount(), eur("6.00"));

        // No amount refunds the remainder.
        let full = ledger.refund(&payment.id, None).await.unwrap();
        assert_eq!(full.state, PaymentState::Refunded);
        assert_eq!(full.refunded_amount, eur("10.00"));
    }

    #[tokio::test]
    async fn test_over_refund_rejected() {
        let ledger = InMemoryPaymentLedger::new();
        let (payment, _) = ledger
            .upsert(&"O1".into(), &"INV1".into(), PaymentState::Completed, "complete", eur("10.00"))
            .await
            .unwrap();

        let err = ledger
            .refund(&payment.id, Some(eur("10.01")))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::RefundExceedsAmount { .. }));

        let err = ledger
            .refund(&payment.id, Some(Money::parse("1.00", "USD").unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::CurrencyMismatch { .. }));
    }
}
