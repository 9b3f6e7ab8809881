//! Gateway configuration.
//!
//! An explicit configuration struct is passed into the controllers at
//! construction; nothing is read from ambient global state. Server hosts
//! are entered without a scheme and always dialed over https.

use serde::{Deserialize, Serialize};

/// Which of the two configured BTCPay servers is in use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    /// Production server, real funds.
    Live,
    /// Test server.
    #[default]
    Test,
}

impl GatewayMode {
    /// Network name as used in credential storage keys.
    pub fn network(&self) -> &'static str {
        match self {
            Self::Live => "livenet",
            Self::Test => "testnet",
        }
    }
}

/// How many confirmations the remote processor requires before it reports
/// an invoice as `confirmed`.
///
/// The policy is transmitted at invoice creation as the BitPay
/// transaction speed; the remote side applies the configured depth before
/// it ever reports `confirmed`, so local reconciliation treats
/// `confirmed` as settled under any policy. Lightning payments settle
/// instantly and reach `confirmed` immediately regardless of this
/// setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationPolicy {
    /// Zero confirmations: the invoice confirms as soon as it is paid.
    High,
    /// One confirmation.
    #[default]
    Medium,
    /// Six confirmations.
    Low,
}

impl ConfirmationPolicy {
    /// Wire value for the invoice-creation request.
    pub fn transaction_speed(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// Configuration for the BTCPay payment gateway.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Which server pair entry is active.
    #[serde(default)]
    pub mode: GatewayMode,

    /// Live server host, without scheme (e.g., "btcpay.domain.tld").
    #[serde(default)]
    pub server_live: String,

    /// Test server host, without scheme.
    #[serde(default)]
    pub server_test: String,

    /// Store name, used as the single invoice line item description.
    pub store_name: String,

    /// Absolute URL the BTCPay server posts payment notifications to.
    pub notify_url: String,

    /// Confirmation depth requested from the remote processor.
    #[serde(default)]
    pub confirmation_policy: ConfirmationPolicy,

    /// Dump raw notification bodies at debug level.
    #[serde(default)]
    pub debug_log: bool,

    /// Transmit the buyer email to the remote server.
    #[serde(default = "default_true")]
    pub send_buyer_email: bool,

    /// Transmit the buyer postal address to the remote server.
    #[serde(default = "default_true")]
    pub send_buyer_address: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

impl GatewayConfig {
    /// Configuration pointed at a test server.
    pub fn test(
        server: impl Into<String>,
        store_name: impl Into<String>,
        notify_url: impl Into<String>,
    ) -> Self {
        Self {
            mode: GatewayMode::Test,
            server_live: String::new(),
            server_test: server.into(),
            store_name: store_name.into(),
            notify_url: notify_url.into(),
            confirmation_policy: ConfirmationPolicy::default(),
            debug_log: false,
            send_buyer_email: true,
            send_buyer_address: true,
            timeout_secs: default_timeout(),
        }
    }

    /// Configuration pointed at a live server.
    pub fn live(
        server: impl Into<String>,
        store_name: impl Into<String>,
        notify_url: impl Into<String>,
    ) -> Self {
        Self {
            mode: GatewayMode::Live,
            server_live: server.into(),
            ..Self::test("", store_name, notify_url)
        }
    }

    /// Set the confirmation policy.
    pub fn with_confirmation_policy(mut self, policy: ConfirmationPolicy) -> Self {
        self.confirmation_policy = policy;
        self
    }

    /// Enable debug logging of raw notification bodies.
    pub fn with_debug_log(mut self, enabled: bool) -> Self {
        self.debug_log = enabled;
        self
    }

    /// Suppress transmission of buyer email and postal address.
    pub fn with_buyer_privacy(mut self) -> Self {
        self.send_buyer_email = false;
        self.send_buyer_address = false;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// The active server host, selected by mode.
    pub fn server_host(&self) -> &str {
        match self.mode {
            GatewayMode::Live => &self.server_live,
            GatewayMode::Test => &self.server_test,
        }
    }

    /// Base URL for API calls against the active server.
    pub fn api_url(&self) -> String {
        format!("https://{}", self.server_host().trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_selects_server() {
        let mut config = GatewayConfig::test("test.btcpay.tld", "Store", "https://shop/notify");
        config.server_live = "live.btcpay.tld".into();

        assert_eq!(config.server_host(), "test.btcpay.tld");
        config.mode = GatewayMode::Live;
        assert_eq!(config.server_host(), "live.btcpay.tld");
    }

    #[test]
    fn test_api_url_is_https() {
        let config = GatewayConfig::test("btcpay.domain.tld", "Store", "https://shop/notify");
        assert_eq!(config.api_url(), "https://btcpay.domain.tld");
    }

    #[test]
    fn test_transaction_speed_values() {
        assert_eq!(ConfirmationPolicy::High.transaction_speed(), "high");
        assert_eq!(ConfirmationPolicy::Medium.transaction_speed(), "medium");
        assert_eq!(ConfirmationPolicy::Low.transaction_speed(), "low");
    }

    #[test]
    fn test_privacy_toggles() {
        let config = GatewayConfig::test("h", "Store", "https://shop/notify").with_buyer_privacy();
        assert!(!config.send_buyer_email);
        assert!(!config.send_buyer_address);
    }
}
