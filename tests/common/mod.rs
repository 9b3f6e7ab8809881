//! Shared helpers for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use commerce_btcpay::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub fn eur(value: &str) -> Money {
    Money::parse(value, "EUR").unwrap()
}

pub fn config() -> GatewayConfig {
    GatewayConfig::test(
        "btcpay.test",
        "Test Store",
        "https://shop.test/payment/notify/btcpay",
    )
}

pub fn invoice(id: &str, order_id: &str, status: InvoiceStatus) -> Invoice {
    Invoice {
        id: id.into(),
        order_id: order_id.into(),
        status,
        price: eur("10.00"),
        url: format!("https://btcpay.test/invoice?id={}", id),
        expiration_time: chrono::Utc::now().timestamp() + 900,
        buyer_email: None,
        exception_status: None,
    }
}

pub fn draft_order(id: &str) -> Order {
    Order::new(id, eur("10.00"))
}

pub fn order_with_invoice(id: &str, invoice_id: &str) -> Order {
    let mut order = draft_order(id);
    order.btcpay = Some(BtcPayData {
        invoice_id: invoice_id.into(),
        expiration_time: chrono::Utc::now().timestamp() + 900,
        status: "new".to_string(),
    });
    order
}

/// Scriptable stand-in for a BTCPay server.
#[derive(Default)]
pub struct ScriptedClient {
    invoices: Mutex<HashMap<InvoiceId, Invoice>>,
    fail_transport: AtomicBool,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, invoice: Invoice) {
        let mut invoices = self.invoices.lock().unwrap_or_else(|e| e.into_inner());
        invoices.insert(invoice.id.clone(), invoice);
    }

    pub fn set_status(&self, id: &InvoiceId, status: InvoiceStatus) {
        let mut invoices = self.invoices.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(invoice) = invoices.get_mut(id) {
            invoice.status = status;
        }
    }

    pub fn set_fail_transport(&self, fail: bool) {
        self.fail_transport.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteInvoiceClient for ScriptedClient {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice> {
        if self.fail_transport.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("simulated outage".into()));
        }
        let id = InvoiceId::new(format!("INV-{}", uuid::Uuid::new_v4()));
        let created = Invoice {
            id: id.clone(),
            order_id: request.order_id.clone(),
            status: InvoiceStatus::New,
            price: request.price.clone(),
            url: format!("https://btcpay.test/invoice?id={}", id),
            expiration_time: chrono::Utc::now().timestamp() + 900,
            buyer_email: request.buyer.as_ref().and_then(|b| b.email.clone()),
            exception_status: None,
        };
        self.insert(created.clone());
        Ok(created)
    }

    async fn get_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>> {
        if self.fail_transport.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("simulated outage".into()));
        }
        let invoices = self.invoices.lock().unwrap_or_else(|e| e.into_inner());
        Ok(invoices.get(id).cloned())
    }

    async fn pair(&self, _pairing_code: &str, _label: &str) -> Result<ApiToken> {
        Ok(ApiToken::new("scripted-token"))
    }
}

/// Everything a gateway test needs, wired together.
pub struct Gateway {
    pub client: Arc<ScriptedClient>,
    pub orders: Arc<InMemoryOrderRepository>,
    pub ledger: Arc<InMemoryPaymentLedger>,
    pub workflow: Arc<InMemoryCheckoutFlow>,
    pub reconciler: Arc<InvoiceReconciler>,
    pub controller: CheckoutRedirectController,
}

impl Gateway {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: GatewayConfig) -> Self {
        let client = Arc::new(ScriptedClient::new());
        let orders = Arc::new(InMemoryOrderRepository::new());
        let ledger = Arc::new(InMemoryPaymentLedger::new());
        let workflow = Arc::new(InMemoryCheckoutFlow::new());
        let reconciler = Arc::new(InvoiceReconciler::new(
            client.clone(),
            orders.clone(),
            ledger.clone(),
            workflow.clone(),
            config.clone(),
        ));
        let controller =
            CheckoutRedirectController::new(client.clone(), orders.clone(), config);
        Self {
            client,
            orders,
            ledger,
            workflow,
            reconciler,
            controller,
        }
    }
}
