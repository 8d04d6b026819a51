//! Configuration for the orchestration engine.
//!
//! Everything is resolved from environment variables (a `.env` file is
//! loaded via dotenvy first). Secrets stay wrapped in `SecretString` so
//! they never land in debug output or logs. There is deliberately no
//! process-wide client or credential singleton: configuration is built
//! once and passed into constructors.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::ConfigError;

/// Main configuration for the engine.
#[derive(Debug, Clone)]
pub struct Config {
    pub remote: RemoteApiConfig,
    pub database: DatabaseConfig,
    pub poll: PollConfig,
    pub search: SearchConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            remote: RemoteApiConfig::resolve()?,
            database: DatabaseConfig::resolve()?,
            poll: PollConfig::resolve()?,
            search: SearchConfig::resolve()?,
        })
    }
}

/// Remote job API configuration.
#[derive(Debug, Clone)]
pub struct RemoteApiConfig {
    /// Base URL of the remote job API, without a trailing slash.
    pub base_url: String,
    /// Bearer token for the remote API.
    pub api_key: SecretString,
    /// Per-request timeout for the HTTP client.
    pub request_timeout: Duration,
}

impl RemoteApiConfig {
    fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_string_env("REMOTE_JOBS_BASE_URL", "https://api.jobs.local")?
                .trim_end_matches('/')
                .to_string(),
            api_key: SecretString::from(required_env("REMOTE_JOBS_API_KEY")?),
            request_timeout: Duration::from_secs(parse_optional_env(
                "REMOTE_JOBS_REQUEST_TIMEOUT_SECS",
                30u64,
            )?),
        })
    }

    /// Expose the API key for request building.
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: SecretString,
    pub pool_size: usize,
}

impl DatabaseConfig {
    fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            url: SecretString::from(required_env("DATABASE_URL")?),
            pool_size: parse_optional_env("DATABASE_POOL_SIZE", 8usize)?,
        })
    }

    /// Expose the connection string for pool construction.
    pub fn url(&self) -> &str {
        self.url.expose_secret()
    }
}

/// Poll-loop configuration.
///
/// The attempt cap (rather than a wall-clock deadline) keeps the loop
/// deterministic and testable; the delay doubles on every pending poll.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Maximum number of poll attempts before giving up.
    pub max_attempts: u32,
    /// Backoff delay for attempt 0; attempt `n` waits `initial_delay * 2^n`.
    pub initial_delay: Duration,
    /// Per-call timeout imposed on tool handlers during dispatch.
    pub tool_timeout: Duration,
}

impl PollConfig {
    fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            max_attempts: parse_optional_env("JOB_POLL_MAX_ATTEMPTS", 10u32)?,
            initial_delay: Duration::from_millis(parse_optional_env(
                "JOB_POLL_INITIAL_DELAY_MS",
                1_000u64,
            )?),
            tool_timeout: Duration::from_secs(parse_optional_env("JOB_TOOL_TIMEOUT_SECS", 5u64)?),
        })
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            tool_timeout: Duration::from_secs(5),
        }
    }
}

/// Web-search tool configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Endpoint of the search backend consumed by the `web_search` tool.
    pub endpoint: String,
    /// Hard cap on returned results.
    pub max_results: usize,
    /// Timeout for a single search request.
    pub timeout: Duration,
}

impl SearchConfig {
    fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: parse_string_env("SEARCH_ENDPOINT", "https://search.local/api")?,
            max_results: parse_optional_env("SEARCH_MAX_RESULTS", 5usize)?,
            timeout: Duration::from_secs(parse_optional_env("SEARCH_TIMEOUT_SECS", 30u64)?),
        })
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://search.local/api".to_string(),
            max_results: 5,
            timeout: Duration::from_secs(30),
        }
    }
}

fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::ParseError(format!(
            "failed to read {key}: {e}"
        ))),
    }
}

fn required_env(key: &str) -> Result<String, ConfigError> {
    optional_env(key)?.ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| {
            s.parse().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{e}"),
            })
        })
        .transpose()
        .map(|opt| opt.unwrap_or(default))
}

fn parse_string_env(key: &str, default: impl Into<String>) -> Result<String, ConfigError> {
    Ok(optional_env(key)?.unwrap_or_else(|| default.into()))
}
