//! BTCPay Server REST adapter.
//!
//! Speaks the BitPay-compatible API (`POST /invoices`,
//! `GET /invoices/:id`, `POST /tokens`). Responses arrive wrapped in a
//! `data` envelope; camelCase wire structs are converted into the crate
//! types at the edge so nothing downstream sees the wire format.

use super::{ApiToken, RemoteInvoiceClient};
use crate::config::GatewayConfig;
use crate::invoice::{Invoice, InvoiceRequest, InvoiceStatus};
use crate::money::Money;
use crate::{GatewayError, InvoiceId, OrderId, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// REST client for a BTCPay server.
pub struct BtcPayRestClient {
    api_url: String,
    token: Option<ApiToken>,
    client_id: Option<String>,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInvoice {
    id: String,
    #[serde(default)]
    order_id: Option<String>,
    status: String,
    price: Decimal,
    currency: String,
    url: String,
    #[serde(default)]
    expiration_time: i64,
    #[serde(default)]
    buyer_email: Option<String>,
    #[serde(default)]
    exception_status: Option<serde_json::Value>,
    #[serde(default)]
    pos_data: Option<String>,
}

impl WireInvoice {
    fn into_invoice(self) -> Result<Invoice> {
        let status = InvoiceStatus::parse(&self.status)?;
        // Older servers omit orderId; posData carries the same value.
        let order_id = self
            .order_id
            .or(self.pos_data)
            .ok_or_else(|| GatewayError::Serialization("invoice without order id".into()))?;
        // exceptionStatus is `false` when unset, a string otherwise.
        let exception_status = match self.exception_status {
            Some(serde_json::Value::String(s)) => Some(s),
            _ => None,
        };
        Ok(Invoice {
            id: InvoiceId::new(self.id),
            order_id: OrderId::new(order_id),
            status,
            price: Money::new(self.price, self.currency),
            url: self.url,
            expiration_time: self.expiration_time,
            buyer_email: self.buyer_email,
            exception_status,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireInvoiceRequest<'a> {
    price: Decimal,
    currency: &'a str,
    order_id: &'a str,
    pos_data: &'a str,
    item_desc: &'a str,
    #[serde(rename = "redirectURL")]
    redirect_url: &'a str,
    #[serde(rename = "closeURL")]
    close_url: &'a str,
    #[serde(rename = "notificationURL")]
    notification_url: &'a str,
    transaction_speed: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    buyer: Option<WireBuyer<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireBuyer<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address1: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address2: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    locality: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    postal_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePairingRequest<'a> {
    id: &'a str,
    pairing_code: &'a str,
    label: &'a str,
}

#[derive(Deserialize)]
struct WirePairingResponse {
    token: String,
}

impl BtcPayRestClient {
    /// Create a client against the server the configuration selects.
    pub fn new(config: &GatewayConfig, token: Option<ApiToken>) -> Result<Self> {
        Self::with_api_url(config.api_url(), token, config.timeout_secs)
    }

    /// Create a client against an explicit base URL.
    pub fn with_api_url(
        api_url: impl Into<String>,
        token: Option<ApiToken>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
            client_id: None,
            client,
        })
    }

    /// Set the client identity transmitted during pairing, usually taken
    /// from [`CredentialStore::client_id`](super::CredentialStore::client_id).
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    async fn read_error_body(response: reqwest::Response) -> String {
        response.text().await.unwrap_or_default()
    }
}

#[async_trait]
impl RemoteInvoiceClient for BtcPayRestClient {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice> {
        let buyer = request.buyer.as_ref().map(|b| WireBuyer {
            name: match (&b.first_name, &b.last_name) {
                (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
                (Some(first), None) => Some(first.clone()),
                (None, Some(last)) => Some(last.clone()),
                (None, None) => None,
            },
            email: b.email.as_deref(),
            address1: b.address.first().map(String::as_str),
            address2: b.address.get(1).map(String::as_str),
            locality: b.city.as_deref(),
            region: b.state.as_deref(),
            postal_code: b.zip.as_deref(),
            country: b.country.as_deref(),
        });
        let body = WireInvoiceRequest {
            price: request.price.amount,
            currency: &request.price.currency_code,
            order_id: request.order_id.as_str(),
            pos_data: &request.pos_data,
            item_desc: &request.item_description,
            redirect_url: &request.redirect_url,
            close_url: &request.close_url,
            notification_url: &request.notification_url,
            transaction_speed: &request.transaction_speed,
            buyer,
            token: self.token.as_ref().map(ApiToken::as_str),
        };

        let response = self
            .client
            .post(self.url("invoices"))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(GatewayError::Auth(Self::read_error_body(response).await));
        }
        if !status.is_success() {
            return Err(GatewayError::Transport(format!(
                "invoice creation failed with HTTP {}: {}",
                status.as_u16(),
                Self::read_error_body(response).await
            )));
        }

        let envelope: Envelope<WireInvoice> = response
            .json()
            .await
            .map_err(|e| GatewayError::Serialization(e.to_string()))?;
        let invoice = envelope.data.into_invoice()?;
        debug!(invoice = %invoice.id, order = %invoice.order_id, "created remote invoice");
        Ok(invoice)
    }

    async fn get_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>> {
        let mut request = self.client.get(self.url(&format!("invoices/{}", id)));
        if let Some(token) = &self.token {
            request = request.query(&[("token", token.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        // Unknown id and rejected credentials both read as "no invoice";
        // the caller distinguishes them from transport failures.
        if status == reqwest::StatusCode::NOT_FOUND
            || status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(GatewayError::Transport(format!(
                "invoice fetch failed with HTTP {}: {}",
                status.as_u16(),
                Self::read_error_body(response).await
            )));
        }

        let envelope: Envelope<WireInvoice> = response
            .json()
            .await
            .map_err(|e| GatewayError::Serialization(e.to_string()))?;
        envelope.data.into_invoice().map(Some)
    }

    async fn pair(&self, pairing_code: &str, label: &str) -> Result<ApiToken> {
        let body = WirePairingRequest {
            id: self.client_id.as_deref().unwrap_or_default(),
            pairing_code,
            label,
        };

        let response = self
            .client
            .post(self.url("tokens"))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Auth(format!(
                "pairing failed with HTTP {}: {}",
                status.as_u16(),
                Self::read_error_body(response).await
            )));
        }

        let envelope: Envelope<Vec<WirePairingResponse>> = response
            .json()
            .await
            .map_err(|e| GatewayError::Serialization(e.to_string()))?;
        let token = envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Auth("pairing returned no token".into()))?;
        Ok(ApiToken::new(token.token))
    }
}
