//! # Payments Configuration
//!
//! Gateway credentials, webhook secret and reconciler timing.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TURNSTILE_GATEWAY_PROVIDER=http                                    │
//! │     TURNSTILE_GATEWAY_SECRET_KEY=sk_live_...                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/turnstile/payments.toml (Linux)                          │
//! │     ~/Library/Application Support/com.turnstile.turnstile/... (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     Mock gateway, 5 minute sweep, 1 hour pending expiry                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # payments.toml
//! [gateway]
//! provider = "http"            # http | mock
//! base_url = "https://api.paystack.co"
//! secret_key = "sk_test_..."
//! callback_url = "https://tickets.example.com/payments/return"
//! request_timeout_secs = 10
//! max_retry_elapsed_secs = 20
//!
//! [webhook]
//! signing_secret = "sk_test_..."   # defaults to gateway.secret_key
//!
//! [reconciler]
//! sweep_interval_secs = 300
//! grace_period_secs = 600
//! pending_expiry_mins = 60
//! batch_size = 100
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{PaymentError, PaymentResult};

// =============================================================================
// Gateway Provider
// =============================================================================

/// Which gateway implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayProvider {
    /// Hosted checkout over HTTPS.
    Http,

    /// In-process gateway that approves every checkout. Development only.
    #[default]
    Mock,
}

impl std::fmt::Display for GatewayProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayProvider::Http => write!(f, "http"),
            GatewayProvider::Mock => write!(f, "mock"),
        }
    }
}

impl std::str::FromStr for GatewayProvider {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" | "paystack" => Ok(GatewayProvider::Http),
            "mock" => Ok(GatewayProvider::Mock),
            other => Err(PaymentError::InvalidConfig(format!(
                "Unknown gateway provider: '{}'. Valid options: http, mock",
                other
            ))),
        }
    }
}

// =============================================================================
// Gateway Settings
// =============================================================================

/// Connection settings for the payment gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default)]
    pub provider: GatewayProvider,

    /// API root, without a trailing path.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer secret for the gateway API. Required for `http`.
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Where the hosted checkout sends the buyer afterwards.
    #[serde(default)]
    pub callback_url: Option<String>,

    /// Timeout for a single HTTP attempt (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Total time spent retrying one call (seconds). 0 disables retries.
    #[serde(default = "default_max_retry_elapsed")]
    pub max_retry_elapsed_secs: u64,

    /// First retry delay (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Longest delay between retries (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_base_url() -> String {
    "https://api.paystack.co".to_string()
}
fn default_request_timeout() -> u64 {
    10
}
fn default_max_retry_elapsed() -> u64 {
    20
}
fn default_initial_backoff() -> u64 {
    250
}
fn default_max_backoff() -> u64 {
    5
}

impl Default for GatewaySettings {
    fn default() -> Self {
        GatewaySettings {
            provider: GatewayProvider::default(),
            base_url: default_base_url(),
            secret_key: None,
            callback_url: None,
            request_timeout_secs: default_request_timeout(),
            max_retry_elapsed_secs: default_max_retry_elapsed(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl GatewaySettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn max_retry_elapsed(&self) -> Duration {
        Duration::from_secs(self.max_retry_elapsed_secs)
    }

    /// Upper bound on one gateway operation, retries included.
    ///
    /// The last attempt may start just before the retry budget runs out and
    /// then take a full request timeout.
    pub fn call_timeout(&self) -> Duration {
        self.max_retry_elapsed() + self.request_timeout()
    }
}

// =============================================================================
// Webhook Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookSettings {
    /// HMAC key for `x-paystack-signature`. Falls back to the gateway secret.
    #[serde(default)]
    pub signing_secret: Option<String>,
}

// =============================================================================
// Reconciler Settings
// =============================================================================

/// Timing of the background sweep over pending orders.
///
/// ```text
///  created_at          + grace_period            + pending_expiry
///      │─────── webhook window ───│── sweep re-verifies ──│── abandoned → failed
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerSettings {
    /// Interval between sweeps (seconds). 0 disables the sweep.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Pending orders younger than this are left to the webhook (seconds).
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,

    /// Unpaid orders older than this are failed when the gateway reports
    /// them abandoned (minutes).
    #[serde(default = "default_pending_expiry")]
    pub pending_expiry_mins: u64,

    /// Orders examined per sweep.
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// A refund claim older than this may be taken over by a new refund
    /// request (seconds).
    #[serde(default = "default_refund_claim_ttl")]
    pub refund_claim_ttl_secs: u64,
}

fn default_sweep_interval() -> u64 {
    300
}
fn default_grace_period() -> u64 {
    600
}
fn default_pending_expiry() -> u64 {
    60
}
fn default_batch_size() -> i64 {
    100
}
fn default_refund_claim_ttl() -> u64 {
    300
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        ReconcilerSettings {
            sweep_interval_secs: default_sweep_interval(),
            grace_period_secs: default_grace_period(),
            pending_expiry_mins: default_pending_expiry(),
            batch_size: default_batch_size(),
            refund_claim_ttl_secs: default_refund_claim_ttl(),
        }
    }
}

impl ReconcilerSettings {
    /// `None` when the sweep is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    pub fn grace_period(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.grace_period_secs as i64)
    }

    pub fn pending_expiry(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.pending_expiry_mins as i64)
    }

    pub fn refund_claim_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refund_claim_ttl_secs as i64)
    }
}

// =============================================================================
// Main Payments Configuration
// =============================================================================

/// Complete payments configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentsConfig {
    #[serde(default)]
    pub gateway: GatewaySettings,

    #[serde(default)]
    pub webhook: WebhookSettings,

    #[serde(default)]
    pub reconciler: ReconcilerSettings,
}

impl PaymentsConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (payments.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> PaymentResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading payments config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> PaymentResult<()> {
        let base = Url::parse(&self.gateway.base_url)?;
        if base.scheme() != "https" && base.scheme() != "http" {
            return Err(PaymentError::InvalidUrl(format!(
                "Gateway URL must start with http:// or https://, got: {}",
                self.gateway.base_url
            )));
        }

        if let Some(ref callback) = self.gateway.callback_url {
            Url::parse(callback)?;
        }

        if self.gateway.provider == GatewayProvider::Http {
            if self.gateway.secret_key.as_deref().map_or(true, str::is_empty) {
                return Err(PaymentError::InvalidConfig(
                    "gateway.secret_key is required for the http provider".into(),
                ));
            }
            if self.signing_secret().is_none() {
                return Err(PaymentError::InvalidConfig(
                    "webhook.signing_secret is required for the http provider".into(),
                ));
            }
        }

        if self.gateway.request_timeout_secs == 0 {
            return Err(PaymentError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.reconciler.batch_size <= 0 {
            return Err(PaymentError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// The key webhook signatures are checked against.
    pub fn signing_secret(&self) -> Option<&str> {
        self.webhook
            .signing_secret
            .as_deref()
            .or(self.gateway.secret_key.as_deref())
            .filter(|secret| !secret.is_empty())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(provider) = std::env::var("TURNSTILE_GATEWAY_PROVIDER") {
            match provider.parse() {
                Ok(parsed) => {
                    debug!(provider = %provider, "Overriding gateway provider from environment");
                    self.gateway.provider = parsed;
                }
                Err(_) => warn!(provider = %provider, "Unknown gateway provider in environment"),
            }
        }

        if let Ok(url) = std::env::var("TURNSTILE_GATEWAY_URL") {
            debug!(url = %url, "Overriding gateway URL from environment");
            self.gateway.base_url = url;
        }

        if let Ok(key) = std::env::var("TURNSTILE_GATEWAY_SECRET_KEY") {
            self.gateway.secret_key = Some(key);
        }

        if let Ok(url) = std::env::var("TURNSTILE_CALLBACK_URL") {
            self.gateway.callback_url = Some(url);
        }

        if let Ok(secret) = std::env::var("TURNSTILE_WEBHOOK_SECRET") {
            self.webhook.signing_secret = Some(secret);
        }

        if let Ok(interval) = std::env::var("TURNSTILE_SWEEP_INTERVAL_SECS") {
            if let Ok(secs) = interval.parse::<u64>() {
                debug!(secs, "Overriding sweep interval from environment");
                self.reconciler.sweep_interval_secs = secs;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "turnstile", "turnstile")
            .map(|dirs| dirs.config_dir().join("payments.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("http".parse::<GatewayProvider>().unwrap(), GatewayProvider::Http);
        assert_eq!("Paystack".parse::<GatewayProvider>().unwrap(), GatewayProvider::Http);
        assert_eq!("mock".parse::<GatewayProvider>().unwrap(), GatewayProvider::Mock);
        assert!("stripe".parse::<GatewayProvider>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = PaymentsConfig::default();
        assert_eq!(config.gateway.provider, GatewayProvider::Mock);
        assert_eq!(config.reconciler.batch_size, 100);
        assert_eq!(config.reconciler.refund_claim_ttl(), chrono::Duration::minutes(5));
        assert_eq!(config.gateway.call_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_provider_requires_secret() {
        let mut config = PaymentsConfig::default();
        config.gateway.provider = GatewayProvider::Http;
        assert!(config.validate().is_err());

        config.gateway.secret_key = Some("sk_test_abc".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.signing_secret(), Some("sk_test_abc"));

        config.webhook.signing_secret = Some("whsec".to_string());
        assert_eq!(config.signing_secret(), Some("whsec"));
    }

    #[test]
    fn test_invalid_urls() {
        let mut config = PaymentsConfig::default();
        config.gateway.base_url = "ftp://gateway".to_string();
        assert!(config.validate().is_err());

        config.gateway.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(PaymentError::InvalidUrl(_))));
    }

    #[test]
    fn test_sweep_disabled_with_zero_interval() {
        let mut settings = ReconcilerSettings::default();
        assert_eq!(settings.sweep_interval(), Some(Duration::from_secs(300)));
        settings.sweep_interval_secs = 0;
        assert_eq!(settings.sweep_interval(), None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payments.toml");
        std::fs::write(
            &path,
            r#"
[gateway]
provider = "mock"
request_timeout_secs = 3

[reconciler]
batch_size = 25
"#,
        )
        .unwrap();

        let config = PaymentsConfig::load(Some(path)).unwrap();
        assert_eq!(config.gateway.request_timeout_secs, 3);
        assert_eq!(config.reconciler.batch_size, 25);
        assert_eq!(config.reconciler.pending_expiry_mins, 60);
    }
}
