//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;
use theses_core::PollerConfig;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: Url,
    pub token_path: PathBuf,
    pub log_level: Level,
    pub http_timeout: Duration,
    pub poller: PollerConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- API Settings ---
        let api_url_str =
            lookup("THESES_API_URL").ok_or_else(|| ConfigError::MissingVar("THESES_API_URL".to_string()))?;
        let api_url = Url::parse(&api_url_str)
            .map_err(|e| ConfigError::InvalidValue("THESES_API_URL".to_string(), e.to_string()))?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue(
                "THESES_API_URL".to_string(),
                format!("unsupported scheme '{}'", api_url.scheme()),
            ));
        }

        let http_timeout = Duration::from_secs(parse_number(&lookup, "HTTP_TIMEOUT_SECS", 15)?);

        // --- Session Settings ---
        let token_path = lookup("THESES_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.theses_token"));

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Payment Confirmation Settings ---
        let interval_ms = parse_number(&lookup, "PAYMENT_POLL_INTERVAL_MS", 2000)?;
        let max_attempts = parse_number(&lookup, "PAYMENT_POLL_MAX_ATTEMPTS", 10)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "PAYMENT_POLL_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let max_attempts = u32::try_from(max_attempts).map_err(|e| {
            ConfigError::InvalidValue("PAYMENT_POLL_MAX_ATTEMPTS".to_string(), e.to_string())
        })?;

        Ok(Self {
            api_url,
            token_path,
            log_level,
            http_timeout,
            poller: PollerConfig::new(max_attempts, Duration::from_millis(interval_ms)),
        })
    }
}

fn parse_number<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
