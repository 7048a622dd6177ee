//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration (real-time fan-out across instances).
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Media storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Outbound mail configuration.
    #[serde(default)]
    pub mail: Option<MailConfig>,
    /// `PayPal` configuration.
    #[serde(default)]
    pub paypal: Option<PayPalConfig>,
    /// Subscription plan configuration.
    #[serde(default)]
    pub subscription: SubscriptionConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Prefix for pub/sub channel names.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign tokens.
    pub jwt_secret: String,
    /// Access token lifetime in seconds.
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_secs: i64,
    /// Password reset token lifetime in seconds.
    #[serde(default = "default_reset_ttl")]
    pub reset_token_ttl_secs: i64,
}

/// Local media storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory uploaded files are written to.
    #[serde(default = "default_storage_path")]
    pub base_path: PathBuf,
    /// URL prefix files are served from.
    #[serde(default = "default_storage_url")]
    pub base_url: String,
    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_storage_path(),
            base_url: default_storage_url(),
            max_upload_bytes: default_max_upload(),
        }
    }
}

/// SMTP configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// SMTP relay host.
    pub smtp_host: String,
    /// SMTP port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username.
    #[serde(default)]
    pub username: Option<String>,
    /// SMTP password.
    #[serde(default)]
    pub password: Option<String>,
    /// Sender address, e.g. `LiveNest <no-reply@livenest.app>`.
    pub from_address: String,
}

/// `PayPal` REST API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PayPalConfig {
    /// Client ID.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// API base URL (sandbox or live).
    #[serde(default = "default_paypal_url")]
    pub api_base: String,
    /// Where `PayPal` sends the buyer after approval.
    #[serde(default)]
    pub return_url: Option<String>,
    /// Where `PayPal` sends the buyer after cancelling.
    #[serde(default)]
    pub cancel_url: Option<String>,
}

/// Premium plan pricing.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionConfig {
    /// Price of one Premium period in minor units (cents).
    #[serde(default = "default_premium_price")]
    pub premium_price_cents: i64,
    /// ISO 4217 currency code.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Length of one Premium period in days.
    #[serde(default = "default_duration_days")]
    pub duration_days: i64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            premium_price_cents: default_premium_price(),
            currency: default_currency(),
            duration_days: default_duration_days(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    5000
}

const fn default_max_connections() -> u32 {
    50
}

const fn default_min_connections() -> u32 {
    5
}

fn default_redis_prefix() -> String {
    "livenest".to_string()
}

const fn default_access_ttl() -> i64 {
    7 * 24 * 60 * 60
}

const fn default_reset_ttl() -> i64 {
    15 * 60
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./files")
}

fn default_storage_url() -> String {
    "/files".to_string()
}

const fn default_max_upload() -> usize {
    20 * 1024 * 1024
}

const fn default_smtp_port() -> u16 {
    587
}

fn default_paypal_url() -> String {
    "https://api-m.sandbox.paypal.com".to_string()
}

const fn default_premium_price() -> i64 {
    999
}

fn default_currency() -> String {
    "USD".to_string()
}

const fn default_duration_days() -> i64 {
    30
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `LIVENEST_ENV`)
    /// 3. Environment variables with `LIVENEST__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("LIVENEST_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("LIVENEST")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("LIVENEST")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let raw = r#"
            [server]
            url = "http://localhost:5000"

            [database]
            url = "postgres://localhost/livenest"

            [auth]
            jwt_secret = "secret"
        "#;

        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.access_token_ttl_secs, 604_800);
        assert_eq!(config.subscription.premium_price_cents, 999);
        assert_eq!(config.subscription.duration_days, 30);
        assert!(config.redis.is_none());
        assert!(config.mail.is_none());
        assert!(config.paypal.is_none());
    }
}
