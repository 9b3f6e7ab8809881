//! Reconciliation of remote invoice state into local records.
//!
//! Two asynchronous signals arrive after the buyer leaves for the hosted
//! payment page: the browser "return" redirect and the server-to-server
//! "notify" webhook. Delivery is at-least-once and unordered, and both
//! may race each other and themselves across processes. Both entry
//! points funnel into one routine that re-fetches the invoice, maps its
//! status, applies it to the ledger, and drives the order workflow
//! forward at most once.
//!
//! A failed remote fetch is recoverable: nothing local is touched, the
//! caller signals failure, and the webhook sender redelivers later.

use crate::client::RemoteInvoiceClient;
use crate::config::GatewayConfig;
use crate::invoice::{Invoice, InvoiceStatus};
use crate::ledger::{Payment, PaymentLedger, UpsertOutcome};
use crate::mapper::map_invoice_status;
use crate::order::{CheckoutWorkflow, Order, OrderRepository, OrderState, PAYMENT_INFORMATION_STEP};
use crate::{GatewayError, OrderId, Result};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Query parameters carried by the browser return redirect.
#[derive(Clone, Debug, Default)]
pub struct ReturnParams {
    /// Email the buyer entered on the payment page, if any.
    pub buyer_email: Option<String>,
    /// Status hint from the redirect. Informational only; the invoice is
    /// always re-fetched.
    pub status_hint: Option<String>,
}

/// Result of handling a browser return.
#[derive(Clone, Debug, PartialEq)]
pub enum ReturnOutcome {
    /// Funds settled; checkout can complete.
    Settled {
        /// The reconciled payment id.
        payment_id: String,
    },
    /// Payment seen but below the confirmation depth; checkout can
    /// complete, the payment stays in authorization.
    Pending {
        /// The reconciled payment id.
        payment_id: String,
    },
    /// The invoice expired or was invalidated. A normal terminal
    /// outcome, not an error: the buyer is sent backward with a message.
    PaymentFailed {
        /// Checkout step to send the buyer back to.
        rewind_to: String,
        /// User-visible explanation.
        message: String,
    },
}

/// Result of handling a payment notification.
#[derive(Clone, Debug, PartialEq)]
pub enum NotifyOutcome {
    /// Notification applied (or recognized as a duplicate).
    Acknowledged {
        /// The reconciled payment id.
        payment_id: String,
        /// Whether this delivery advanced the order workflow.
        order_advanced: bool,
    },
    /// The invoice expired or was invalidated; recorded, no user present.
    PaymentFailed {
        /// The reconciled payment id.
        payment_id: String,
    },
}

/// Minimal notification body: everything except the id is re-fetched.
#[derive(Deserialize)]
struct NotificationBody {
    id: Option<String>,
}

/// Orchestrates both reconciliation entry points.
pub struct InvoiceReconciler {
    client: Arc<dyn RemoteInvoiceClient>,
    orders: Arc<dyn OrderRepository>,
    ledger: Arc<dyn PaymentLedger>,
    workflow: Arc<dyn CheckoutWorkflow>,
    config: GatewayConfig,
    // Serializes the check-then-advance section against concurrent
    // deliveries in this process. Cross-process exactly-once belongs to
    // the workflow implementation's own transactionality.
    advance_lock: tokio::sync::Mutex<()>,
}

impl InvoiceReconciler {
    /// Create a reconciler over the injected collaborators.
    pub fn new(
        client: Arc<dyn RemoteInvoiceClient>,
        orders: Arc<dyn OrderRepository>,
        ledger: Arc<dyn PaymentLedger>,
        workflow: Arc<dyn CheckoutWorkflow>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            client,
            orders,
            ledger,
            workflow,
            config,
            advance_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Handle the buyer returning from the hosted payment page.
    ///
    /// # Errors
    ///
    /// [`GatewayError::OrderNotFound`] for an unknown order,
    /// [`GatewayError::MissingInvoiceReference`] when the order was never
    /// sent to the payment page, [`GatewayError::InvoiceNotFound`] when
    /// the remote lookup comes back empty. A failure-status invoice is
    /// NOT an error; it is reported as [`ReturnOutcome::PaymentFailed`].
    pub async fn on_return(
        &self,
        order_id: &OrderId,
        params: &ReturnParams,
    ) -> Result<ReturnOutcome> {
        let mut order = self
            .orders
            .load(order_id)
            .await?
            .ok_or_else(|| GatewayError::OrderNotFound(order_id.clone()))?;
        let invoice_id = order
            .btcpay
            .as_ref()
            .map(|data| data.invoice_id.clone())
            .ok_or_else(|| GatewayError::MissingInvoiceReference(order_id.clone()))?;

        // The return redirect is forgeable; only a fresh fetch counts.
        let invoice = self
            .client
            .get_invoice(&invoice_id)
            .await?
            .ok_or_else(|| GatewayError::InvoiceNotFound(invoice_id.clone()))?;
        debug!(
            order = %order.id,
            invoice = %invoice.id,
            status = %invoice.status,
            hint = ?params.status_hint,
            "handling payment page return"
        );

        // Anonymous checkout: keep the email the buyer gave the payment page.
        if order.email.is_none() {
            if let Some(email) = params.buyer_email.clone().or(invoice.buyer_email.clone()) {
                order.email = Some(email);
                self.orders.save(&order).await?;
            }
        }

        let (payment, outcome) = self.reconcile(&order, &invoice).await?;

        if invoice.status.is_failure() {
            // The rewind fires only on the delivery that actually moved
            // the payment into the failure state; replays skip it.
            if outcome.transitioned() {
                self.workflow
                    .rewind_to_step(&order, PAYMENT_INFORMATION_STEP)
                    .await?;
            }
            return Ok(ReturnOutcome::PaymentFailed {
                rewind_to: PAYMENT_INFORMATION_STEP.to_string(),
                message: format!(
                    "The payment for this order {} before it could be completed. Please try again.",
                    match invoice.status {
                        InvoiceStatus::Expired => "expired",
                        _ => "was declined",
                    }
                ),
            });
        }

        if invoice.status.is_settled() {
            Ok(ReturnOutcome::Settled {
                payment_id: payment.id,
            })
        } else {
            Ok(ReturnOutcome::Pending {
                payment_id: payment.id,
            })
        }
    }

    /// Handle a server-to-server payment notification.
    ///
    /// The body is only trusted for the invoice id; status and amounts
    /// come from a fresh fetch. On any error nothing local is touched,
    /// so the sender's redelivery can retry the whole pass.
    pub async fn on_notify(&self, raw_body: &str) -> Result<NotifyOutcome> {
        if self.config.debug_log {
            debug!(body = raw_body, "received payment notification");
        }

        let body: NotificationBody = serde_json::from_str(raw_body)
            .map_err(|e| GatewayError::MalformedNotification(e.to_string()))?;
        let invoice_id = body
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                GatewayError::MalformedNotification("notification body has no invoice id".into())
            })?
            .into();

        let invoice = self
            .client
            .get_invoice(&invoice_id)
            .await?
            .ok_or_else(|| GatewayError::InvoiceNotFound(invoice_id))?;

        // No session context here; the order comes from the invoice.
        let mut order = self
            .orders
            .load(&invoice.order_id)
            .await?
            .ok_or_else(|| GatewayError::OrderNotFound(invoice.order_id.clone()))?;

        let (payment, _outcome) = self.reconcile(&order, &invoice).await?;

        if invoice.status.is_failure() {
            info!(
                order = %order.id,
                invoice = %invoice.id,
                status = %invoice.status,
                "notification reported failed payment"
            );
            return Ok(NotifyOutcome::PaymentFailed {
                payment_id: payment.id,
            });
        }

        let order_advanced = if invoice.status.is_settled() {
            self.advance_order_once(&order.id).await?
        } else {
            false
        };

        Ok(NotifyOutcome::Acknowledged {
            payment_id: payment.id,
            order_advanced,
        })
    }

    /// Apply one fresh invoice snapshot to the ledger.
    async fn reconcile(
        &self,
        order: &Order,
        invoice: &Invoice,
    ) -> Result<(Payment, UpsertOutcome)> {
        if let Some(exception) = &invoice.exception_status {
            warn!(
                invoice = %invoice.id,
                exception,
                "remote invoice carries an exception status"
            );
        }

        let target_state = map_invoice_status(invoice.status);
        let (payment, outcome) = self
            .ledger
            .upsert(
                &order.id,
                &invoice.id,
                target_state,
                invoice.status.as_str(),
                invoice.price.clone(),
            )
            .await?;
        debug!(
            order = %order.id,
            invoice = %invoice.id,
            payment = %payment.id,
            state = %payment.state,
            ?outcome,
            "reconciled invoice into payment"
        );
        Ok((payment, outcome))
    }

    /// Advance the order workflow, exactly once per order.
    ///
    /// Returns whether this call did the advancing. The order is
    /// re-loaded under the lock so concurrent deliveries cannot both
    /// pass the draft-state check; a duplicate delivery that finds the
    /// order already placed is a logged no-op.
    async fn advance_order_once(&self, order_id: &OrderId) -> Result<bool> {
        let _guard = self.advance_lock.lock().await;
        let mut order = self
            .orders
            .load(order_id)
            .await?
            .ok_or_else(|| GatewayError::OrderNotFound(order_id.clone()))?;
        if order.state != OrderState::Draft {
            debug!(
                order = %order.id,
                state = ?order.state,
                "order already advanced, duplicate notification ignored"
            );
            return Ok(false);
        }
        self.workflow.advance(&mut order).await?;
        self.orders.save(&order).await?;
        info!(order = %order.id, "order placed after payment settlement");
        Ok(true)
    }
}
