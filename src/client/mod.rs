//! Remote invoice client abstraction.
//!
//! The BTCPay server is reached through the [`RemoteInvoiceClient`]
//! trait; the reconciliation core never talks HTTP directly. The
//! concrete REST adapter lives in this module behind the `http-client`
//! feature; tests use the mock in `test_utils`.

use crate::invoice::{Invoice, InvoiceRequest};
use crate::{InvoiceId, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

#[cfg(feature = "http-client")]
mod rest;

#[cfg(feature = "http-client")]
pub use rest::BtcPayRestClient;

/// API access token obtained by pairing with the BTCPay server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiToken(pub String);

impl ApiToken {
    /// Create a token from a string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Client for the remote payment processor.
///
/// # Semantics
///
/// - `get_invoice` returns `Ok(None)` when the id is unknown or the
///   credentials were rejected; transport failures are `Err`. Callers
///   treat `Err` as recoverable and take no local action.
/// - `create_invoice` failures propagate; the checkout controller turns
///   them into a backward reroute instead of surfacing them to the buyer.
#[async_trait]
pub trait RemoteInvoiceClient: Send + Sync {
    /// Create an invoice on the remote server.
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice>;

    /// Fetch the current snapshot of an invoice.
    async fn get_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>>;

    /// Exchange a pairing code for an API token.
    ///
    /// `label` identifies this shop on the server's token list.
    async fn pair(&self, pairing_code: &str, label: &str) -> Result<ApiToken>;
}

/// Opaque credential capability.
///
/// Key-pair generation and encrypted persistence belong to the host; the
/// gateway only needs a stable client identity for pairing and the token
/// per network. Implementations decide where and how these live.
pub trait CredentialStore: Send + Sync {
    /// Stable client identity transmitted during pairing.
    fn client_id(&self) -> Result<String>;

    /// The stored API token for a network, if paired.
    fn token(&self, network: &str) -> Result<Option<ApiToken>>;

    /// Persist the API token for a network.
    fn store_token(&self, network: &str, token: ApiToken) -> Result<()>;
}

/// In-memory credential store for tests and single-process use.
pub struct InMemoryCredentialStore {
    client_id: String,
    tokens: Mutex<HashMap<String, ApiToken>>,
}

impl InMemoryCredentialStore {
    /// Create a store with a fixed client identity.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            tokens: Mutex::new(HashMap::new()),
        }
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn client_id(&self) -> Result<String> {
        Ok(self.client_id.clone())
    }

    fn token(&self, network: &str) -> Result<Option<ApiToken>> {
        let tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tokens.get(network).cloned())
    }

    fn store_token(&self, network: &str, token: ApiToken) -> Result<()> {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.insert(network.to_string(), token);
        Ok(())
    }
}
