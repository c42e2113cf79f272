//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront (PayPay redirects here)
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `PAYPAY_API_KEY` - PayPay Open Payment API key
//! - `PAYPAY_API_SECRET` - PayPay Open Payment API secret
//! - `PAYPAY_MERCHANT_ID` - PayPay merchant id
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `PAYPAY_ENVIRONMENT` - `STAGING` or `PROD` (default: STAGING)
//! - `PAYMENT_POLL_INTERVAL_SECS` - Delay between status polls (default: 5)
//! - `PAYMENT_POLL_ERROR_INTERVAL_SECS` - Delay after a failed poll (default: 10)
//! - `PAYMENT_POLL_MAX_ATTEMPTS` - Polls before giving up (default: 180)
//! - `PAYMENT_POLL_DEADLINE_SECS` - Time before giving up (default: 900)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use seto_core::checkout::PollPolicy;
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// PayPay Open Payment API configuration
    pub paypay: PayPayConfig,
    /// Payment status poll cadence and budget
    pub poll: PollPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// PayPay API environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayPayEnvironment {
    #[default]
    Staging,
    Production,
}

impl PayPayEnvironment {
    /// API host for this environment.
    #[must_use]
    pub const fn api_base_url(self) -> &'static str {
        match self {
            Self::Staging => "https://stg-api.sandbox.paypay.ne.jp",
            Self::Production => "https://api.paypay.ne.jp",
        }
    }
}

impl FromStr for PayPayEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STAGING" => Ok(Self::Staging),
            "PROD" | "PRODUCTION" => Ok(Self::Production),
            other => Err(format!("expected STAGING or PROD, got {other}")),
        }
    }
}

/// PayPay Open Payment API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct PayPayConfig {
    pub environment: PayPayEnvironment,
    /// Overrides the environment's API host (used against local doubles)
    pub api_base_url: Option<String>,
    pub api_key: String,
    pub api_secret: SecretString,
    pub merchant_id: String,
}

impl std::fmt::Debug for PayPayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayPayConfig")
            .field("environment", &self.environment)
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("merchant_id", &self.merchant_id)
            .finish()
    }
}

impl PayPayConfig {
    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.api_base_url())
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = database_url_from_env()?;
        let host = parse_env_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;
        let base_url = base_url.trim_end_matches('/').to_owned();
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        let paypay = PayPayConfig::from_env()?;
        let poll = poll_policy_from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            paypay,
            poll,
            sentry_dsn,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS (secure cookies).
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Where PayPay sends the visitor after paying.
    #[must_use]
    pub fn payment_redirect_url(&self) -> String {
        format!("{}/checkout/complete", self.base_url)
    }
}

impl PayPayConfig {
    /// Load the PayPay credentials on their own (used by the CLI).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a credential is missing or the secret fails
    /// validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            environment: parse_env_or_default("PAYPAY_ENVIRONMENT", "STAGING")?,
            api_base_url: get_optional_env("PAYPAY_API_BASE_URL"),
            api_key: get_required_env("PAYPAY_API_KEY")?,
            api_secret: get_validated_secret("PAYPAY_API_SECRET")?,
            merchant_id: get_required_env("PAYPAY_MERCHANT_ID")?,
        })
    }
}

/// Load the storefront database URL (`STOREFRONT_DATABASE_URL`, then `DATABASE_URL`).
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither variable is set.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    get_database_url("STOREFRONT_DATABASE_URL")
}

/// Load the payment status poll policy.
fn poll_policy_from_env() -> Result<PollPolicy, ConfigError> {
    Ok(PollPolicy {
        interval: Duration::from_secs(parse_env_or_default("PAYMENT_POLL_INTERVAL_SECS", "5")?),
        error_interval: Duration::from_secs(parse_env_or_default(
            "PAYMENT_POLL_ERROR_INTERVAL_SECS",
            "10",
        )?),
        max_attempts: parse_env_or_default("PAYMENT_POLL_MAX_ATTEMPTS", "180")?,
        deadline: Duration::from_secs(parse_env_or_default("PAYMENT_POLL_DEADLINE_SECS", "900")?),
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, using `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn paypay_config() -> PayPayConfig {
        PayPayConfig {
            environment: PayPayEnvironment::Staging,
            api_base_url: None,
            api_key: "a_api_key_value".to_string(),
            api_secret: SecretString::from("super_secret_api_secret"),
            merchant_id: "123456789".to_string(),
        }
    }

    fn config(base_url: &str) -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: base_url.to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            paypay: paypay_config(),
            poll: PollPolicy::default(),
            sentry_dsn: None,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-paypay-secret", "PAYPAY_API_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_paypay_environment_parsing() {
        assert_eq!("STAGING".parse::<PayPayEnvironment>(), Ok(PayPayEnvironment::Staging));
        assert_eq!("prod".parse::<PayPayEnvironment>(), Ok(PayPayEnvironment::Production));
        assert!("sandbox".parse::<PayPayEnvironment>().is_err());
    }

    #[test]
    fn test_paypay_base_url_override() {
        let mut paypay = paypay_config();
        assert_eq!(paypay.base_url(), "https://stg-api.sandbox.paypay.ne.jp");
        paypay.api_base_url = Some("http://127.0.0.1:9999".to_string());
        assert_eq!(paypay.base_url(), "http://127.0.0.1:9999");
    }

    #[test]
    fn test_parse_value_reports_variable() {
        let err = parse_value::<u32>("PAYMENT_POLL_MAX_ATTEMPTS", "many").unwrap_err();
        assert!(err.to_string().contains("PAYMENT_POLL_MAX_ATTEMPTS"));
    }

    #[test]
    fn test_socket_addr_and_redirect() {
        let config = config("https://seto-coffee.jp");
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert!(config.is_https());
        assert_eq!(
            config.payment_redirect_url(),
            "https://seto-coffee.jp/checkout/complete"
        );
        assert!(!self::config("http://localhost:3000").is_https());
    }

    #[test]
    fn test_paypay_config_debug_redacts_secrets() {
        let debug_output = format!("{:?}", paypay_config());
        assert!(debug_output.contains("a_api_key_value"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_api_secret"));
    }
}
