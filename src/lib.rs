//! BTCPay Server payment gateway integration.
//!
//! This crate connects an e-commerce checkout flow to a BTCPay Server
//! instance speaking the BitPay-compatible REST API. It creates remote
//! invoices, hands the buyer the hosted payment page URL, and reconciles
//! the asynchronous invoice lifecycle (browser return redirects and
//! server-to-server notifications) into local payment records.
//!
//! The crate stays stateless about its host platform: orders, payments and
//! the checkout flow are reached through trait-based dependency injection,
//! and the remote processor is behind the [`RemoteInvoiceClient`] trait.
//!
//! # Example
//!
//! ```ignore
//! use commerce_btcpay::prelude::*;
//! use std::sync::Arc;
//!
//! let config = GatewayConfig::test("btcpay.example.com", "My Store", "https://shop.example.com/notify");
//! let reconciler = InvoiceReconciler::new(client, orders, ledger, workflow, config);
//!
//! // Server-to-server notification from BTCPay Server.
//! let outcome = reconciler.on_notify(r#"{"id":"7dJ8..."}"#).await?;
//! ```

use serde::{Deserialize, Serialize};

pub mod checkout;
pub mod client;
pub mod config;
pub mod errors;
pub mod invoice;
pub mod ledger;
pub mod mapper;
pub mod money;
pub mod order;
pub mod prelude;
pub mod reconciler;

/// Test utilities (mock remote client, fixtures).
///
/// Only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use checkout::{CheckoutRedirectController, RedirectDisposition};
pub use client::{ApiToken, CredentialStore, RemoteInvoiceClient};
pub use config::{ConfirmationPolicy, GatewayConfig, GatewayMode};
pub use errors::GatewayError;
pub use invoice::{Buyer, Invoice, InvoiceRequest, InvoiceStatus};
pub use ledger::{InMemoryPaymentLedger, Payment, PaymentLedger, UpsertOutcome};
pub use mapper::PaymentState;
pub use money::Money;
pub use order::{BtcPayData, CheckoutWorkflow, Order, OrderRepository, OrderState};
pub use reconciler::{InvoiceReconciler, NotifyOutcome, ReturnOutcome, ReturnParams};

#[cfg(feature = "http-client")]
pub use client::BtcPayRestClient;

/// Common result alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Identifier of a remote invoice on the BTCPay Server.
///
/// # Example
///
/// ```
/// use commerce_btcpay::InvoiceId;
///
/// let id: InvoiceId = "7dJ8mKpX2rQ".into();
/// assert_eq!(id.as_str(), "7dJ8mKpX2rQ");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceId(pub String);

impl InvoiceId {
    /// Create a new invoice id from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the invoice id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InvoiceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for InvoiceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for InvoiceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a local commerce order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    /// Create a new order id from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the order id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
