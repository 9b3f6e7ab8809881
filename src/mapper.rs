//! Mapping of remote invoice statuses to local payment states.
//!
//! The mapping is a fixed table; the configured confirmation policy is
//! applied on the remote side (transmitted as the transaction speed at
//! invoice creation), so by the time the processor reports `confirmed`
//! the configured depth has already been reached. See DESIGN.md for the
//! rationale and the rejected policy-dependent variant.

use crate::invoice::{Invoice, InvoiceStatus};
use crate::money::Money;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Local payment lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// Created, nothing received yet.
    New,
    /// Funds seen but not yet settled.
    Authorization,
    /// Funds settled.
    Completed,
    /// Authorization abandoned (remote status `invalid`).
    AuthorizationVoided,
    /// Authorization window elapsed (remote status `expired`).
    AuthorizationExpired,
    /// Part of the settled amount was refunded.
    PartiallyRefunded,
    /// The full settled amount was refunded.
    Refunded,
}

impl PaymentState {
    /// Wire/storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Authorization => "authorization",
            Self::Completed => "completed",
            Self::AuthorizationVoided => "authorization_voided",
            Self::AuthorizationExpired => "authorization_expired",
            Self::PartiallyRefunded => "partially_refunded",
            Self::Refunded => "refunded",
        }
    }

    /// True for states no forward reconciliation can leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::PartiallyRefunded | Self::Refunded)
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a remote invoice status to the local payment state.
///
/// Pure and total over the known status enumeration.
pub fn map_invoice_status(status: InvoiceStatus) -> PaymentState {
    match status {
        InvoiceStatus::New => PaymentState::New,
        InvoiceStatus::Paid => PaymentState::Authorization,
        InvoiceStatus::Confirmed | InvoiceStatus::Complete => PaymentState::Completed,
        InvoiceStatus::Expired => PaymentState::AuthorizationExpired,
        InvoiceStatus::Invalid => PaymentState::AuthorizationVoided,
    }
}

/// Parse a raw wire status and map it in one step.
///
/// # Errors
///
/// Returns [`GatewayError::UnmappedRemoteStatus`](crate::GatewayError)
/// for anything outside the known enumeration, so the caller can
/// log-and-skip instead of guessing a state.
pub fn map_remote_status(raw: &str) -> Result<PaymentState> {
    InvoiceStatus::parse(raw).map(map_invoice_status)
}

/// Amount recognized as received for an invoice snapshot.
///
/// Funds only count once the remote status reaches the settled tier;
/// below it the paid amount is zero regardless of what was broadcast.
pub fn paid_amount(invoice: &Invoice) -> Money {
    if invoice.status.is_settled() {
        invoice.price.clone()
    } else {
        Money::zero(invoice.price.currency_code.clone())
    }
}

/// Whether a reconciliation may move a payment from `current` to `target`.
///
/// The lifecycle is ordered `new < authorization < completed`; refund
/// states are only reachable from `completed`, and a failure verdict may
/// still be overturned by late settlement. Anything else is a regression
/// caused by a stale or replayed notification and must not be applied.
pub fn allows_transition(current: PaymentState, target: PaymentState) -> bool {
    use PaymentState::*;
    match (current, target) {
        (a, b) if a == b => true,
        (New, Authorization | Completed | AuthorizationVoided | AuthorizationExpired) => true,
        (Authorization, Completed | AuthorizationVoided | AuthorizationExpired) => true,
        // A failed invoice can settle late once enough blocks confirm.
        (AuthorizationVoided | AuthorizationExpired, Completed) => true,
        (Completed, PartiallyRefunded | Refunded) => true,
        (PartiallyRefunded, Refunded) => true,
        _ => false,
    }
}
