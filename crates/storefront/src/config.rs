//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront (`https` enables secure cookies)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `API_BASE_URL` - Backend REST API root (default: <http://localhost:5000/api>)
//! - `POSTCODE_API_URL` - Postcode lookup service root (default: <https://api.postcodes.io>)
//! - `STRIPE_PUBLISHABLE_KEY` - Publishable payment key, exposed to templates
//! - `SHIPPING_FEE` - Flat shipping fee in pounds (default: 3.50)
//! - `HTTP_TIMEOUT_SECS` - Outbound request timeout (default: 10)
//! - `LOG_FORMAT` - `json` for structured log lines (default: human-readable)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate, 0.0 to 1.0 (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate, 0.0 to 1.0 (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use highstreet_core::Price;
use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
const DEFAULT_POSTCODE_API_URL: &str = "https://api.postcodes.io";
const DEFAULT_SHIPPING_FEE: &str = "3.50";
const DEFAULT_HTTP_TIMEOUT_SECS: &str = "10";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Backend REST API root, without a trailing slash
    pub api_base_url: String,
    /// Postcode lookup service root, without a trailing slash
    pub postcode_api_url: String,
    /// Publishable payment key (safe to expose in the browser)
    pub stripe_publishable_key: Option<String>,
    /// Flat shipping fee added at checkout
    pub shipping_fee: Price,
    /// Timeout applied to every outbound HTTP request
    pub http_timeout: Duration,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Sentry DSN for error tracking (embeds a project key)
    pub sentry_dsn: Option<SecretString>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = EnvSource(&lookup);

        let host = env.parsed::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = env.parsed::<u16>("STOREFRONT_PORT", "3000")?;
        let base_url = env.url("STOREFRONT_BASE_URL", None)?;
        let api_base_url = env.url("API_BASE_URL", Some(DEFAULT_API_BASE_URL))?;
        let postcode_api_url = env.url("POSTCODE_API_URL", Some(DEFAULT_POSTCODE_API_URL))?;

        let shipping_fee = env.parsed::<Decimal>("SHIPPING_FEE", DEFAULT_SHIPPING_FEE)?;
        if shipping_fee.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                "SHIPPING_FEE".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let timeout_secs = env.parsed::<u64>("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "HTTP_TIMEOUT_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            host,
            port,
            base_url,
            api_base_url,
            postcode_api_url,
            stripe_publishable_key: env.optional("STRIPE_PUBLISHABLE_KEY"),
            shipping_fee: Price::new(shipping_fee),
            http_timeout: Duration::from_secs(timeout_secs),
            log_json: env
                .optional("LOG_FORMAT")
                .is_some_and(|f| f.eq_ignore_ascii_case("json")),
            sentry_dsn: env.optional("SENTRY_DSN").map(SecretString::from),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env.rate("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: env.rate("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct EnvSource<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> EnvSource<'_, F> {
    /// Get an optional environment variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Get an environment variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Get and parse an environment variable, falling back to a default.
    fn parsed<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    /// Get an absolute http(s) URL, stripped of any trailing slash.
    fn url(&self, key: &str, default: Option<&str>) -> Result<String, ConfigError> {
        let raw = match (self.optional(key), default) {
            (Some(value), _) => value,
            (None, Some(default)) => default.to_string(),
            (None, None) => return Err(ConfigError::MissingEnvVar(key.to_string())),
        };

        let parsed = Url::parse(&raw)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }

        Ok(raw.trim_end_matches('/').to_string())
    }

    /// Get a sampling rate between 0.0 and 1.0.
    fn rate(&self, key: &str, default: &str) -> Result<f32, ConfigError> {
        let rate = self.parsed::<f32>(key, default)?;
        if (0.0..=1.0).contains(&rate) {
            Ok(rate)
        } else {
            Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("must be between 0.0 and 1.0 (got {rate})"),
            ))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("STOREFRONT_BASE_URL", "http://localhost:3000/")]).unwrap();

        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.api_base_url, "http://localhost:5000/api");
        assert_eq!(config.postcode_api_url, "https://api.postcodes.io");
        assert_eq!(config.shipping_fee, Price::from_pence(350));
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert!(config.stripe_publishable_key.is_none());
        assert!(config.sentry_dsn.is_none());
        assert!(!config.is_secure());
    }

    #[test]
    fn test_missing_base_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "STOREFRONT_BASE_URL"));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("STOREFRONT_BASE_URL", "https://shop.example.co.uk"),
            ("STOREFRONT_HOST", "0.0.0.0"),
            ("STOREFRONT_PORT", "8080"),
            ("API_BASE_URL", "https://api.example.co.uk/api/"),
            ("SHIPPING_FEE", "4.95"),
            ("HTTP_TIMEOUT_SECS", "3"),
            ("STRIPE_PUBLISHABLE_KEY", "pk_test_abc"),
        ])
        .unwrap();

        assert!(config.is_secure());
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.api_base_url, "https://api.example.co.uk/api");
        assert_eq!(config.shipping_fee, Price::from_pence(495));
        assert_eq!(config.http_timeout, Duration::from_secs(3));
        assert_eq!(config.stripe_publishable_key.as_deref(), Some("pk_test_abc"));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let base = ("STOREFRONT_BASE_URL", "http://localhost:3000");

        assert!(load(&[base, ("STOREFRONT_PORT", "seventy")]).is_err());
        assert!(load(&[base, ("SHIPPING_FEE", "-1")]).is_err());
        assert!(load(&[base, ("HTTP_TIMEOUT_SECS", "0")]).is_err());
        assert!(load(&[base, ("SENTRY_SAMPLE_RATE", "1.5")]).is_err());
        assert!(load(&[base, ("API_BASE_URL", "ftp://files.example.com")]).is_err());
        assert!(load(&[("STOREFRONT_BASE_URL", "not a url")]).is_err());
    }

    #[test]
    fn test_debug_redacts_sentry_dsn() {
        let config = load(&[
            ("STOREFRONT_BASE_URL", "http://localhost:3000"),
            ("SENTRY_DSN", "https://publickey@o0.ingest.sentry.io/0"),
        ])
        .unwrap();

        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("publickey"));
    }
}
