//! Test utilities for exercising the reconciliation core without a
//! BTCPay server.
//!
//! [`MockInvoiceClient`] is a scriptable [`RemoteInvoiceClient`]; the
//! `fixtures` module builds the entities tests need. Available in test
//! builds and behind the `test-utils` feature for downstream crates.

use crate::client::{ApiToken, RemoteInvoiceClient};
use crate::invoice::{Invoice, InvoiceRequest, InvoiceStatus};
use crate::{GatewayError, InvoiceId, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Scriptable in-memory stand-in for a BTCPay server.
#[derive(Default)]
pub struct MockInvoiceClient {
    invoices: Mutex<HashMap<InvoiceId, Invoice>>,
    created_requests: Mutex<Vec<InvoiceRequest>>,
    fetch_count: AtomicUsize,
    fail_transport: AtomicBool,
    fail_create: AtomicBool,
}

impl MockInvoiceClient {
    /// Creates an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the invoice returned for its id.
    pub fn insert(&self, invoice: Invoice) {
        let mut invoices = self.invoices.lock().unwrap_or_else(|e| e.into_inner());
        invoices.insert(invoice.id.clone(), invoice);
    }

    /// Overwrite the status of a stored invoice.
    pub fn set_status(&self, id: &InvoiceId, status: InvoiceStatus) {
        let mut invoices = self.invoices.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(invoice) = invoices.get_mut(id) {
            invoice.status = status;
        }
    }

    /// Make every call fail with a transport error.
    pub fn set_fail_transport(&self, fail: bool) {
        self.fail_transport.store(fail, Ordering::SeqCst);
    }

    /// Make invoice creation fail with a transport error.
    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Number of `get_invoice` calls made.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Invoice-creation requests seen, in order.
    pub fn created_requests(&self) -> Vec<InvoiceRequest> {
        let requests = self
            .created_requests
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        requests.clone()
    }

    fn check_transport(&self) -> Result<()> {
        if self.fail_transport.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("simulated outage".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteInvoiceClient for MockInvoiceClient {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice> {
        self.check_transport()?;
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("simulated creation failure".into()));
        }

        {
            let mut requests = self
                .created_requests
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            requests.push(request.clone());
        }

        let id = InvoiceId::new(format!("MOCK-{}", uuid::Uuid::new_v4()));
        let invoice = Invoice {
            id: id.clone(),
            order_id: request.order_id.clone(),
            status: InvoiceStatus::New,
            price: request.price.clone(),
            url: format!("https://btcpay.test/invoice?id={}", id),
            expiration_time: chrono::Utc::now().timestamp() + 900,
            buyer_email: request.buyer.as_ref().and_then(|b| b.email.clone()),
            exception_status: None,
        };
        self.insert(invoice.clone());
        Ok(invoice)
    }

    async fn get_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>> {
        self.check_transport()?;
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let invoices = self.invoices.lock().unwrap_or_else(|e| e.into_inner());
        Ok(invoices.get(id).cloned())
    }

    async fn pair(&self, _pairing_code: &str, _label: &str) -> Result<ApiToken> {
        self.check_transport()?;
        Ok(ApiToken::new("mock-token"))
    }
}

/// Entity builders shared across tests.
pub mod fixtures {
    use crate::config::GatewayConfig;
    use crate::invoice::{Invoice, InvoiceStatus};
    use crate::money::Money;
    use crate::order::{BtcPayData, Order};

    /// Gateway configuration pointed at a test host.
    pub fn config() -> GatewayConfig {
        GatewayConfig::test(
            "btcpay.test",
            "Test Store",
            "https://shop.test/payment/notify/btcpay",
        )
    }

    /// 10.00 EUR, the price used across scenarios.
    pub fn price() -> Money {
        Money::parse("10.00", "EUR").unwrap()
    }

    /// A draft order with no invoice attached.
    pub fn order(id: &str) -> Order {
        Order::new(id, price())
    }

    /// A draft order already linked to an invoice.
    pub fn order_with_invoice(id: &str, invoice_id: &str) -> Order {
        let mut order = order(id);
        order.btcpay = Some(BtcPayData {
            invoice_id: invoice_id.into(),
            expiration_time: chrono::Utc::now().timestamp() + 900,
            status: InvoiceStatus::New.as_str().to_string(),
        });
        order
    }

    /// A remote invoice snapshot in the given status.
    pub fn invoice(id: &str, order_id: &str, status: InvoiceStatus) -> Invoice {
        Invoice {
            id: id.into(),
            order_id: order_id.into(),
            status,
            price: price(),
            url: format!("https://btcpay.test/invoice?id={}", id),
            expiration_time: chrono::Utc::now().timestamp() + 900,
            buyer_email: None,
            exception_status: None,
        }
    }
}
