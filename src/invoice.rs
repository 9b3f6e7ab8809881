//! Remote invoice types.
//!
//! An [`Invoice`] is a snapshot of a remote payment request, fetched fresh
//! for every reconciliation pass. It is never cached beyond a single pass
//! because the status can change between calls.

use crate::money::Money;
use crate::{GatewayError, InvoiceId, OrderId, Result};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a remote invoice.
///
/// `Paid` means funds were broadcast but are below the requested
/// confirmation depth; `Confirmed` means the depth was reached;
/// `Complete` means the processor considers the funds fully settled.
/// Lightning payments jump straight to the settled statuses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Created, awaiting payment.
    New,
    /// Payment seen, below the requested confirmation depth.
    Paid,
    /// Requested confirmation depth reached.
    Confirmed,
    /// Fully settled on the processor side.
    Complete,
    /// Payment window elapsed without (sufficient) payment.
    Expired,
    /// The processor flagged the payment as invalid.
    Invalid,
}

impl InvoiceStatus {
    /// Parse a wire status string. Unknown values are an explicit error,
    /// never a default guess.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "new" => Ok(Self::New),
            "paid" => Ok(Self::Paid),
            "confirmed" => Ok(Self::Confirmed),
            "complete" => Ok(Self::Complete),
            "expired" => Ok(Self::Expired),
            "invalid" => Ok(Self::Invalid),
            other => Err(GatewayError::UnmappedRemoteStatus(other.to_string())),
        }
    }

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Paid => "paid",
            Self::Confirmed => "confirmed",
            Self::Complete => "complete",
            Self::Expired => "expired",
            Self::Invalid => "invalid",
        }
    }

    /// True once funds count as received (the settled tier).
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Complete)
    }

    /// True for the terminal failure statuses.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Expired | Self::Invalid)
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of a remote invoice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Remote invoice id.
    pub id: InvoiceId,
    /// The local order this invoice pays for.
    pub order_id: OrderId,
    /// Lifecycle status at fetch time.
    pub status: InvoiceStatus,
    /// Requested amount.
    pub price: Money,
    /// Hosted payment page URL.
    pub url: String,
    /// Unix timestamp after which the invoice expires.
    pub expiration_time: i64,
    /// Email the buyer entered on the payment page, if any.
    pub buyer_email: Option<String>,
    /// Processor hint for irregular payments ("paidPartial", "paidOver").
    /// Consumed for diagnostics only.
    pub exception_status: Option<String>,
}

/// Buyer details transmitted at invoice creation.
///
/// Every field is optional; the privacy toggles in
/// [`GatewayConfig`](crate::GatewayConfig) strip email and address before
/// transmission.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Buyer {
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Address lines.
    pub address: Vec<String>,
    /// City.
    pub city: Option<String>,
    /// State/province.
    pub state: Option<String>,
    /// Postal code.
    pub zip: Option<String>,
    /// Country code.
    pub country: Option<String>,
}

impl Buyer {
    /// Set the name.
    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = Some(last.into());
        self
    }

    /// Set the email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the postal address.
    pub fn with_address(
        mut self,
        lines: Vec<String>,
        city: impl Into<String>,
        zip: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        self.address = lines;
        self.city = Some(city.into());
        self.zip = Some(zip.into());
        self.country = Some(country.into());
        self
    }

    /// Strip the email address.
    pub fn without_email(mut self) -> Self {
        self.email = None;
        self
    }

    /// Strip the postal address.
    pub fn without_address(mut self) -> Self {
        self.address.clear();
        self.city = None;
        self.state = None;
        self.zip = None;
        self.country = None;
        self
    }
}

/// Outbound payload for creating an invoice on the BTCPay server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    /// Requested amount.
    pub price: Money,
    /// Local order id, echoed back in the invoice snapshot.
    pub order_id: OrderId,
    /// Point-of-sale passthrough data. The order id again, so
    /// notifications can be matched even without the orderId field.
    pub pos_data: String,
    /// Single line item description. The BitPay API supports only one
    /// item, so the store name is used.
    pub item_description: String,
    /// Buyer details, already filtered by the privacy toggles.
    pub buyer: Option<Buyer>,
    /// Where the payment page sends the buyer back to.
    pub redirect_url: String,
    /// Where the payment page sends the buyer on cancel.
    pub close_url: String,
    /// Where the server posts payment notifications.
    pub notification_url: String,
    /// Confirmation depth, as a BitPay transaction speed string.
    pub transaction_speed: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_known_values() {
        for (raw, expected) in [
            ("new", InvoiceStatus::New),
            ("paid", InvoiceStatus::Paid),
            ("confirmed", InvoiceStatus::Confirmed),
            ("complete", InvoiceStatus::Complete),
            ("expired", InvoiceStatus::Expired),
            ("invalid", InvoiceStatus::Invalid),
        ] {
            assert_eq!(InvoiceStatus::parse(raw).unwrap(), expected);
            assert_eq!(expected.as_str(), raw);
        }
    }

    #[test]
    fn test_status_parse_unknown_is_error() {
        let err = InvoiceStatus::parse("paidLate").unwrap_err();
        assert!(matches!(
            err,
            crate::GatewayError::UnmappedRemoteStatus(s) if s == "paidLate"
        ));
    }

    #[test]
    fn test_settled_tier() {
        assert!(InvoiceStatus::Confirmed.is_settled());
        assert!(InvoiceStatus::Complete.is_settled());
        assert!(!InvoiceStatus::Paid.is_settled());
        assert!(!InvoiceStatus::New.is_settled());
    }

    #[test]
    fn test_failure_statuses() {
        assert!(InvoiceStatus::Expired.is_failure());
        assert!(InvoiceStatus::Invalid.is_failure());
        assert!(!InvoiceStatus::Confirmed.is_failure());
    }

    #[test]
    fn test_buyer_privacy_stripping() {
        let buyer = Buyer::default()
            .with_name("Satoshi", "Nakamoto")
            .with_email("satoshi@example.com")
            .with_address(vec!["1 Main St".into()], "Tokyo", "100-0001", "JP");

        let stripped = buyer.clone().without_email().without_address();
        assert!(stripped.email.is_none());
        assert!(stripped.address.is_empty());
        assert!(stripped.city.is_none());
        // Name survives; it is part of the order, not a privacy toggle.
        assert_eq!(stripped.first_name.as_deref(), Some("Satoshi"));
        assert_eq!(buyer.email.as_deref(), Some("satoshi@example.com"));
    }
}
