//! Startup settings, read once from the environment.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `ADMIN_API_TOKEN` - Bearer token accepted by the `/admin` API (min 16 chars)
//! - `STRIPE_SECRET_KEY` - Stripe secret key (payments disabled when unset)
//! - `STRIPE_WEBHOOK_SECRET` - Webhook endpoint secret (required with `STRIPE_SECRET_KEY`)
//! - `STRIPE_API_BASE` - Stripe API origin (default: <https://api.stripe.com>)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_FROM` - Outgoing mail
//!   (emails are logged instead of sent when `SMTP_HOST` is unset)
//! - `DEV_MODE` - Run the development sweep at startup (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ADMIN_TOKEN_LENGTH: usize = 16;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_SMTP_PORT: &str = "587";

/// Substrings that mark a secret as copied from a template (matched lowercased).
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

/// Reasons the storefront refuses to start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Everything the storefront reads at startup.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront (no trailing slash)
    pub base_url: String,
    /// Session signing secret, also keys email confirmation tokens
    pub session_secret: SecretString,
    /// Bearer token for the admin API
    pub admin_api_token: Option<SecretString>,
    /// Stripe configuration; `None` disables payments
    pub stripe: Option<StripeConfig>,
    /// SMTP configuration; `None` logs emails instead of sending them
    pub smtp: Option<SmtpConfig>,
    /// Run the development sweep at startup
    pub dev_mode: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Stripe Checkout configuration.
///
/// `Debug` prints `[REDACTED]` for the secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_...`)
    pub secret_key: SecretString,
    /// Webhook endpoint signing secret (`whsec_...`)
    pub webhook_secret: SecretString,
    /// API origin, overridable for tests
    pub api_base: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Outgoing mail configuration.
///
/// `Debug` prints `[REDACTED]` for the secret fields.
#[derive(Clone)]
pub struct SmtpConfig {
    /// SMTP relay host
    pub host: String,
    /// SMTP port (STARTTLS)
    pub port: u16,
    /// SMTP username
    pub username: String,
    /// SMTP password
    pub password: SecretString,
    /// Sender address
    pub from_address: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl StorefrontConfig {
    /// Read the process environment, after merging a `.env` file when one
    /// exists in the working directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required variable is missing or malformed,
    /// or when the session secret or admin token looks weak.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host: IpAddr = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port: u16 = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;
        let session_secret =
            get_validated_secret("STOREFRONT_SESSION_SECRET", MIN_SESSION_SECRET_LENGTH)?;

        let admin_api_token = match get_optional_env("ADMIN_API_TOKEN") {
            Some(_) => Some(get_validated_secret("ADMIN_API_TOKEN", MIN_ADMIN_TOKEN_LENGTH)?),
            None => None,
        };

        let stripe = StripeConfig::from_env()?;
        let smtp = SmtpConfig::from_env()?;
        let dev_mode = parse_bool(&get_env_or_default("DEV_MODE", "false"));

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            admin_api_token,
            stripe,
            smtp,
            dev_mode,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Address the listener binds.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the site is served over HTTPS (controls secure cookies).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Absolute URL for a site path.
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl StripeConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(secret_key) = get_optional_env("STRIPE_SECRET_KEY") else {
            return Ok(None);
        };
        Ok(Some(Self {
            secret_key: SecretString::from(secret_key),
            webhook_secret: get_required_secret("STRIPE_WEBHOOK_SECRET")?,
            api_base: get_env_or_default("STRIPE_API_BASE", DEFAULT_STRIPE_API_BASE)
                .trim_end_matches('/')
                .to_string(),
        }))
    }
}

impl SmtpConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };
        let port: u16 = parse_env("SMTP_PORT", DEFAULT_SMTP_PORT)?;
        Ok(Some(Self {
            host,
            port,
            username: get_required_env("SMTP_USERNAME")?,
            password: get_required_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("SMTP_FROM")?,
        }))
    }
}

/// Variable that must be present.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Like [`get_required_env`], wrapped so it never reaches logs.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
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

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a variable (or `default`) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Variable or `default`, verbatim.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Interpret common truthy spellings.
fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Reason a secret is unfit for use, or `None` when it passes.
///
/// Checks run cheapest first: length, then the placeholder blocklist, then
/// character entropy.
fn weakness(value: &str, min_len: usize) -> Option<String> {
    let chars = value.chars().count();
    if chars < min_len {
        return Some(format!("{chars} characters is too short, use at least {min_len}"));
    }

    let lower = value.to_lowercase();
    if let Some(word) = PLACEHOLDER_PATTERNS.iter().find(|word| lower.contains(*word)) {
        return Some(format!("looks like a placeholder (contains {word:?})"));
    }

    let bits = bits_per_char(value);
    if bits < MIN_ENTROPY_BITS_PER_CHAR {
        return Some(format!(
            "only {bits:.2} bits of entropy per character, need {MIN_ENTROPY_BITS_PER_CHAR}; generate it randomly"
        ));
    }
    None
}

/// Shannon entropy of the character distribution.
fn bits_per_char(value: &str) -> f64 {
    let mut counts: HashMap<char, u32> = HashMap::new();
    for c in value.chars() {
        *counts.entry(c).or_default() += 1;
    }
    let total: u32 = counts.values().sum();
    if total == 0 {
        return 0.0;
    }
    let total = f64::from(total);
    counts
        .values()
        .map(|&n| {
            let p = f64::from(n) / total;
            -p * p.log2()
        })
        .sum()
}

/// Read a secret and refuse it if [`weakness`] finds a problem.
fn get_validated_secret(key: &str, min_len: usize) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    match weakness(&value, min_len) {
        Some(reason) => Err(ConfigError::InsecureSecret(key.to_string(), reason)),
        None => Ok(SecretString::from(value)),
    }
}
