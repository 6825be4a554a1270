// neon_pay/src/config.rs
// Environment-driven configuration

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BKASH_BASE_URL: &str = "https://tokenized.sandbox.bka.sh/v1.2.0-beta";

#[derive(Clone)]
pub struct BkashConfig {
    pub app_key: String,
    pub app_secret: String,
    pub username: String,
    pub password: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl BkashConfig {
    pub fn from_env() -> Self {
        let timeout_secs = std::env::var("BKASH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Self {
            app_key: std::env::var("BKASH_APP_KEY").unwrap_or_default(),
            app_secret: std::env::var("BKASH_APP_SECRET").unwrap_or_default(),
            username: std::env::var("BKASH_USERNAME").unwrap_or_default(),
            password: std::env::var("BKASH_PASSWORD").unwrap_or_default(),
            base_url: std::env::var("BKASH_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BKASH_BASE_URL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Config for a local fake gateway, with fixed dummy credentials. Never
    /// use against a real bKash endpoint.
    pub fn for_fake_gateway(base_url: impl Into<String>) -> Self {
        Self {
            app_key: "test-app-key".to_string(),
            app_secret: "test-app-secret".to_string(),
            username: "test-user".to_string(),
            password: "test-pass".to_string(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.username.is_empty() && !self.app_key.is_empty()
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/tokenized/checkout/{}", self.base_url.trim_end_matches('/'), path)
    }
}

// Hand-written so credentials never reach the logs.
impl std::fmt::Debug for BkashConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BkashConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("configured", &self.is_configured())
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub payments_file: PathBuf,
    pub bkash: BkashConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            payments_file: std::env::var("PAYMENTS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/payments.jsonl")),
            bkash: BkashConfig::from_env(),
        }
    }
}
