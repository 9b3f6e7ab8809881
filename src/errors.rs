//! Error types for gateway operations.
//!
//! Every failure the reconciliation core can hit is an explicit variant;
//! nothing is swallowed. Entry-point callers translate these into their
//! transport's failure signal (a non-2xx response for notifications, an
//! error page for browser returns).

use crate::money::Money;
use crate::{InvoiceId, OrderId};

/// Comprehensive error type for gateway operations.
#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    /// The order carries no linked BTCPay invoice.
    #[error("order {0} has no BTCPay invoice reference")]
    MissingInvoiceReference(OrderId),

    /// The remote lookup returned nothing (unknown id or rejected credentials).
    #[error("invoice {0} not found on the BTCPay server")]
    InvoiceNotFound(InvoiceId),

    /// Notification body was unparseable or lacked an invoice id.
    #[error("malformed payment notification: {0}")]
    MalformedNotification(String),

    /// A notification referenced an order this shop does not know.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// The remote invoice status is outside the known lifecycle.
    #[error("unmapped remote invoice status: {0:?}")]
    UnmappedRemoteStatus(String),

    /// A void/refund referenced a payment the ledger does not hold.
    #[error("payment not found: {0}")]
    PaymentNotFound(String),

    /// A payment operation was attempted from the wrong state.
    #[error("payment {payment_id} is in state {actual}, expected one of {expected:?}")]
    InvalidPaymentState {
        /// Local payment id.
        payment_id: String,
        /// The state the payment is actually in.
        actual: String,
        /// States the operation would have accepted.
        expected: Vec<&'static str>,
    },

    /// A refund would push the refunded total past the payment amount.
    #[error("refund of {requested} exceeds refundable remainder {available}")]
    RefundExceedsAmount {
        /// Amount the caller asked to refund.
        requested: Money,
        /// Amount still refundable.
        available: Money,
    },

    /// Amounts in different currencies were combined.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Currency code of the left operand.
        left: String,
        /// Currency code of the right operand.
        right: String,
    },

    /// Checked money arithmetic overflowed.
    #[error("arithmetic overflow")]
    Overflow,

    /// Transport/network layer error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Authentication against the BTCPay server failed.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl GatewayError {
    /// True when retrying later may succeed (the webhook sender should
    /// redeliver, the buyer may revisit the return URL).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::InvoiceNotFound(_) | Self::Auth(_)
        )
    }

    /// Create a transport error from any error type.
    pub fn transport<E: std::error::Error>(err: E) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
