//! Prelude module for convenient imports.
//!
//! Re-exports the types needed to wire the gateway into a host
//! application. Import everything with:
//!
//! ```rust,ignore
//! use commerce_btcpay::prelude::*;
//! ```

// Core identifiers and money
pub use crate::{InvoiceId, Money, OrderId};

// Error handling
pub use crate::errors::GatewayError;
pub use crate::Result;

// Configuration
pub use crate::config::{ConfirmationPolicy, GatewayConfig, GatewayMode};

// Remote side
pub use crate::client::{ApiToken, CredentialStore, RemoteInvoiceClient};
pub use crate::invoice::{Buyer, Invoice, InvoiceRequest, InvoiceStatus};

// Reconciliation core
pub use crate::ledger::{InMemoryPaymentLedger, Payment, PaymentLedger, UpsertOutcome};
pub use crate::mapper::PaymentState;
pub use crate::reconciler::{InvoiceReconciler, NotifyOutcome, ReturnOutcome, ReturnParams};

// Checkout glue
pub use crate::checkout::{CheckoutRedirectController, RedirectDisposition};
pub use crate::order::{
    BtcPayData, CheckoutWorkflow, Order, OrderRepository, OrderState, PAYMENT_INFORMATION_STEP,
};

// In-memory implementations for tests and single-process deployments
pub use crate::client::InMemoryCredentialStore;
pub use crate::order::{InMemoryCheckoutFlow, InMemoryOrderRepository};

// REST adapter (when compiled in)
#[cfg(feature = "http-client")]
pub use crate::client::BtcPayRestClient;
