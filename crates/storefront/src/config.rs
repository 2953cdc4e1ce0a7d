//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DRIFTWOOD_DATABASE_URL` - `PostgreSQL` connection string
//! - `DRIFTWOOD_BASE_URL` - Public URL for the storefront
//! - `DRIFTWOOD_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Payment gateway
//! - `PAYMENT_GATEWAY` - `sandbox` (default) or `provider`
//! - `PAYMENT_API_URL` - Provider API base URL (required for `provider`)
//! - `PAYMENT_SECRET_KEY` - Provider secret key (required for `provider`)
//! - `SANDBOX_CONFIRM_DELAY_MS` - Simulated confirmation latency (default: 400)
//!
//! ## Optional
//! - `DRIFTWOOD_HOST` - Bind address (default: 127.0.0.1)
//! - `DRIFTWOOD_PORT` - Listen port (default: 3000)
//! - `CATALOG_API_URL` - Catalog collaborator base URL (default: built-in fixtures)
//! - `ORDER_WEBHOOK_URL` - Confirmation notification webhook
//! - `CART_DEBOUNCE_MS` - Durable cart write coalescing window (default: 500)
//! - `TAX_RATE` - Decimal tax rate applied at checkout (default: 0)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
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
    /// Session signing secret.
    ///
    /// Not consumed yet: sessions are Postgres-backed and the cookie holds
    /// only a random id, so there is nothing to sign. Validated at boot
    /// anyway so deployments already carry a strong secret when cookie
    /// signing is turned on.
    pub session_secret: SecretString,
    /// Payment gateway configuration
    pub payment: PaymentConfig,
    /// Catalog collaborator base URL; `None` uses the in-memory fixture catalog
    pub catalog_api_url: Option<String>,
    /// Order confirmation webhook URL; `None` disables notifications
    pub order_webhook_url: Option<String>,
    /// Cart persistence tuning
    pub cart: CartConfig,
    /// Tax rate applied to the cart subtotal at checkout (e.g., 0.0875)
    pub tax_rate: Decimal,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag (e.g., production, staging)
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry tracing sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Which payment gateway implementation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    /// Deterministic in-process gateway with reserved test card behavior.
    Sandbox,
    /// Real payment provider over HTTP.
    Provider,
}

/// Payment gateway configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct PaymentConfig {
    /// Which gateway implementation to use
    pub mode: GatewayMode,
    /// Provider API base URL (provider mode only)
    pub api_url: Option<String>,
    /// Provider secret API key (provider mode only)
    pub secret_key: Option<SecretString>,
    /// Simulated confirmation latency for the sandbox gateway
    pub sandbox_confirm_delay_ms: u64,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("mode", &self.mode)
            .field("api_url", &self.api_url)
            .field(
                "secret_key",
                &self.secret_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("sandbox_confirm_delay_ms", &self.sandbox_confirm_delay_ms)
            .finish()
    }
}

/// Cart persistence tuning.
#[derive(Debug, Clone, Copy)]
pub struct CartConfig {
    /// Debounce window for durable cart writes, in milliseconds.
    ///
    /// Bursts of mutations inside this window collapse into one write.
    pub debounce_ms: u64,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
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

        let database_url = get_database_url("DRIFTWOOD_DATABASE_URL")?;
        let host = get_env_or_default("DRIFTWOOD_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("DRIFTWOOD_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("DRIFTWOOD_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("DRIFTWOOD_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("DRIFTWOOD_BASE_URL")?;
        let session_secret = get_validated_secret("DRIFTWOOD_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "DRIFTWOOD_SESSION_SECRET")?;

        let payment = PaymentConfig::from_env()?;
        let catalog_api_url = get_optional_env("CATALOG_API_URL");
        let order_webhook_url = get_optional_env("ORDER_WEBHOOK_URL");
        let cart = CartConfig {
            debounce_ms: get_env_or_default("CART_DEBOUNCE_MS", "500")
                .parse::<u64>()
                .map_err(|e| {
                    ConfigError::InvalidEnvVar("CART_DEBOUNCE_MS".to_string(), e.to_string())
                })?,
        };
        let tax_rate = get_env_or_default("TAX_RATE", "0")
            .parse::<Decimal>()
            .map_err(|e| ConfigError::InvalidEnvVar("TAX_RATE".to_string(), e.to_string()))?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_env_or_default("SENTRY_SAMPLE_RATE", "1.0")
            .parse::<f32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SENTRY_SAMPLE_RATE".to_string(), e.to_string())
            })?;
        let sentry_traces_sample_rate = get_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.1")
            .parse::<f32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SENTRY_TRACES_SAMPLE_RATE".to_string(), e.to_string())
            })?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            payment,
            catalog_api_url,
            order_webhook_url,
            cart,
            tax_rate,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mode = match get_env_or_default("PAYMENT_GATEWAY", "sandbox").as_str() {
            "sandbox" => GatewayMode::Sandbox,
            "provider" => GatewayMode::Provider,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "PAYMENT_GATEWAY".to_string(),
                    format!("expected 'sandbox' or 'provider', got '{other}'"),
                ));
            }
        };

        let (api_url, secret_key) = if mode == GatewayMode::Provider {
            (
                Some(get_required_env("PAYMENT_API_URL")?),
                Some(get_validated_secret("PAYMENT_SECRET_KEY")?),
            )
        } else {
            (None, None)
        };

        let sandbox_confirm_delay_ms = get_env_or_default("SANDBOX_CONFIRM_DELAY_MS", "400")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SANDBOX_CONFIRM_DELAY_MS".to_string(), e.to_string())
            })?;

        Ok(Self {
            mode,
            api_url,
            secret_key,
            sandbox_confirm_delay_ms,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by platform postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    // Try primary key first (e.g., DRIFTWOOD_DATABASE_URL)
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    // Fallback to generic DATABASE_URL
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
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

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
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

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_shannon_entropy_high() {
        // Random-looking string should have high entropy
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        // High-entropy random string
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        let result = validate_session_secret(&secret, "TEST_SESSION");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_session_secret_valid_length() {
        let secret = SecretString::from("a".repeat(32));
        let result = validate_session_secret(&secret, "TEST_SESSION");
        assert!(result.is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            payment: PaymentConfig {
                mode: GatewayMode::Sandbox,
                api_url: None,
                secret_key: None,
                sandbox_confirm_delay_ms: 400,
            },
            catalog_api_url: None,
            order_webhook_url: None,
            cart: CartConfig::default(),
            tax_rate: Decimal::ZERO,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_payment_config_debug_redacts_secret() {
        let config = PaymentConfig {
            mode: GatewayMode::Provider,
            api_url: Some("https://api.payments.test".to_string()),
            secret_key: Some(SecretString::from("sk_live_very_private_key")),
            sandbox_confirm_delay_ms: 400,
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("https://api.payments.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_live_very_private_key"));
    }

    #[test]
    fn test_default_cart_debounce() {
        assert_eq!(CartConfig::default().debounce_ms, 500);
    }
}
