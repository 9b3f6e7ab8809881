//! Off-site redirect step of the checkout flow.
//!
//! Thin glue between the checkout's payment step and the remote server:
//! create the invoice, stash its metadata on the order, hand back the
//! hosted payment page URL. A creation failure never surfaces to the
//! buyer; they are rerouted to the previous step instead.

use crate::client::RemoteInvoiceClient;
use crate::config::GatewayConfig;
use crate::invoice::{Buyer, InvoiceRequest};
use crate::order::{BtcPayData, Order, OrderRepository, PAYMENT_INFORMATION_STEP};
use crate::{GatewayError, OrderId, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Where to send the buyer's browser next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RedirectDisposition {
    /// Off-site to the hosted payment page.
    Redirect {
        /// Hosted payment page URL.
        url: String,
    },
    /// Back to an earlier checkout step; invoice creation failed.
    Rewind {
        /// Checkout step to return to.
        step_id: String,
    },
}

/// Builds the redirect that hands the buyer to the payment page.
pub struct CheckoutRedirectController {
    client: Arc<dyn RemoteInvoiceClient>,
    orders: Arc<dyn OrderRepository>,
    config: GatewayConfig,
}

impl CheckoutRedirectController {
    /// Create a controller over the injected collaborators.
    pub fn new(
        client: Arc<dyn RemoteInvoiceClient>,
        orders: Arc<dyn OrderRepository>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            client,
            orders,
            config,
        }
    }

    /// Create the remote invoice for an order and decide the redirect.
    ///
    /// On success the order carries the invoice metadata afterwards and
    /// the disposition is the hosted payment page URL. On creation
    /// failure the disposition reroutes to the previous checkout step.
    pub async fn prepare_redirect(
        &self,
        order_id: &OrderId,
        return_url: &str,
        cancel_url: &str,
    ) -> Result<RedirectDisposition> {
        let mut order = self
            .orders
            .load(order_id)
            .await?
            .ok_or_else(|| GatewayError::OrderNotFound(order_id.clone()))?;

        let request = self.build_invoice_request(&order, return_url, cancel_url);
        let invoice = match self.client.create_invoice(&request).await {
            Ok(invoice) => invoice,
            Err(err) => {
                warn!(
                    order = %order.id,
                    error = %err,
                    "invoice creation failed, rerouting buyer to previous step"
                );
                return Ok(RedirectDisposition::Rewind {
                    step_id: PAYMENT_INFORMATION_STEP.to_string(),
                });
            }
        };

        order.btcpay = Some(BtcPayData {
            invoice_id: invoice.id.clone(),
            expiration_time: invoice.expiration_time,
            status: invoice.status.as_str().to_string(),
        });
        self.orders.save(&order).await?;
        info!(
            order = %order.id,
            invoice = %invoice.id,
            "created remote invoice, redirecting buyer"
        );

        Ok(RedirectDisposition::Redirect { url: invoice.url })
    }

    fn build_invoice_request(
        &self,
        order: &Order,
        return_url: &str,
        cancel_url: &str,
    ) -> InvoiceRequest {
        let mut buyer = Buyer::default();
        if let Some(email) = &order.email {
            buyer.email = Some(email.clone());
        }
        if !self.config.send_buyer_email {
            buyer = buyer.without_email();
        }
        if !self.config.send_buyer_address {
            buyer = buyer.without_address();
        }

        InvoiceRequest {
            price: order.total.clone(),
            order_id: order.id.clone(),
            pos_data: order.id.to_string(),
            item_description: self.config.store_name.clone(),
            buyer: Some(buyer),
            redirect_url: return_url.to_string(),
            close_url: cancel_url.to_string(),
            notification_url: self.config.notify_url.clone(),
            transaction_speed: self
                .config
                .confirmation_policy
                .transaction_speed()
                .to_string(),
        }
    }
}
