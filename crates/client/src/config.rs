//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFRONT_API_URL` - Base URL of the storefront REST API
//!
//! ## Optional
//! - `SHOPFRONT_STORAGE_PATH` - Device storage file (default: .shopfront/storage.json)
//! - `SHOPFRONT_SYNC_DEBOUNCE_MS` - Quiet period before cart writes are sent (default: 500)
//! - `SHOPFRONT_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 15)
//! - `SHOPFRONT_SHIPPING_FEE` - Flat shipping fee (default: 10.00)
//! - `SHOPFRONT_FREE_SHIPPING_THRESHOLD` - Subtotal at which shipping is free (default: 100.00)
//! - `SHOPFRONT_TAX_RATE` - Tax rate applied to the subtotal (default: 0.15)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use url::Url;

use crate::checkout::PricingPolicy;

const DEFAULT_STORAGE_PATH: &str = ".shopfront/storage.json";
const DEFAULT_SYNC_DEBOUNCE_MS: &str = "500";
const DEFAULT_REQUEST_TIMEOUT_SECS: &str = "15";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API (always ends with `/`)
    pub api_url: Url,
    /// JSON file backing the device key-value store
    pub storage_path: PathBuf,
    /// Quiet period before pending cart writes are flushed
    pub sync_debounce: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Shipping and tax rules used to draft orders
    pub pricing: PricingPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl ClientConfig {
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

        let api_url = parse_api_url(&get_required_env("SHOPFRONT_API_URL")?)?;
        let storage_path = PathBuf::from(get_env_or_default(
            "SHOPFRONT_STORAGE_PATH",
            DEFAULT_STORAGE_PATH,
        ));
        let sync_debounce = Duration::from_millis(parse_env(
            "SHOPFRONT_SYNC_DEBOUNCE_MS",
            DEFAULT_SYNC_DEBOUNCE_MS,
        )?);
        let request_timeout = Duration::from_secs(parse_env(
            "SHOPFRONT_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);
        let pricing = PricingPolicy::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            api_url,
            storage_path,
            sync_debounce,
            request_timeout,
            pricing,
            sentry_dsn,
        })
    }

    /// Configuration pointing at `api_url` with every optional value at its
    /// default.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `api_url` is not an absolute
    /// http(s) URL.
    pub fn with_api_url(api_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_api_url(api_url)?,
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            sync_debounce: Duration::from_millis(500),
            request_timeout: Duration::from_secs(15),
            pricing: PricingPolicy::default(),
            sentry_dsn: None,
        })
    }
}

impl PricingPolicy {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            shipping_fee: parse_decimal_env("SHOPFRONT_SHIPPING_FEE", defaults.shipping_fee)?,
            free_shipping_threshold: parse_decimal_env(
                "SHOPFRONT_FREE_SHIPPING_THRESHOLD",
                defaults.free_shipping_threshold,
            )?,
            tax_rate: parse_decimal_env("SHOPFRONT_TAX_RATE", defaults.tax_rate)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the API base URL, forcing a trailing slash so relative joins keep
/// any path prefix (e.g. `https://host/v2/`).
fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |msg: String| ConfigError::InvalidEnvVar("SHOPFRONT_API_URL".to_string(), msg);

    let mut url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a non-negative decimal environment variable.
fn parse_decimal_env(key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    let value = Decimal::from_str(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if value.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_url_adds_trailing_slash() {
        let url = parse_api_url("https://shop.example.com/v2").unwrap();
        assert_eq!(url.as_str(), "https://shop.example.com/v2/");
        assert_eq!(
            url.join("api/cart").unwrap().as_str(),
            "https://shop.example.com/v2/api/cart"
        );
    }

    #[test]
    fn test_parse_api_url_root() {
        let url = parse_api_url("http://127.0.0.1:8080").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/");
    }

    #[test]
    fn test_parse_api_url_rejects_other_schemes() {
        let err = parse_api_url("ftp://shop.example.com").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_parse_api_url_rejects_garbage() {
        assert!(parse_api_url("not a url").is_err());
    }

    #[test]
    fn test_with_api_url_defaults() {
        let config = ClientConfig::with_api_url("http://localhost:5000").unwrap();
        assert_eq!(config.sync_debounce, Duration::from_millis(500));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.storage_path, PathBuf::from(DEFAULT_STORAGE_PATH));
        assert_eq!(config.pricing, PricingPolicy::default());
        assert!(config.sentry_dsn.is_none());
    }
}
