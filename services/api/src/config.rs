//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub ai_model_url: Option<String>,
    pub ai_api_secret: Option<String>,
    pub ai_model: Option<String>,
    pub ai_max_tokens: u32,
    pub ai_temperature: f32,
    pub ai_timeout: Duration,
    /// Upper bound on naming a new chat before the default title is used.
    pub title_timeout: Duration,
    pub typing_delay: Duration,
    pub public_base_url: String,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
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
        // Empty values count as unset.
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // --- Load Server and Database Settings ---
        let bind_address = parse_or(&var, "BIND_ADDRESS", "0.0.0.0:3000".parse::<SocketAddr>())?;
        let database_url = var("DATABASE_URL");

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Completion Backend Settings (as optional) ---
        let ai_model_url = var("AI_MODEL_URL").map(|url| url.trim_end_matches('/').to_string());
        let ai_api_secret = var("AI_API_SECRET");
        let ai_model = var("AI_MODEL");
        let ai_max_tokens = parse_or(&var, "AI_MAX_TOKENS", Ok::<u32, ConfigError>(1500))?;
        let ai_temperature = parse_or(&var, "AI_TEMPERATURE", Ok::<f32, ConfigError>(0.7))?;
        let ai_timeout = Duration::from_secs(parse_or(
            &var,
            "AI_TIMEOUT_SECS",
            Ok::<u64, ConfigError>(120),
        )?);
        let title_timeout = Duration::from_millis(parse_or(
            &var,
            "AI_TITLE_TIMEOUT_MS",
            Ok::<u64, ConfigError>(5000),
        )?);
        let typing_delay = Duration::from_millis(parse_or(
            &var,
            "TYPING_DELAY_MS",
            Ok::<u64, ConfigError>(20),
        )?);

        // --- Load Web Settings ---
        let public_base_url = var("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        let cors_origin = var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            ai_model_url,
            ai_api_secret,
            ai_model,
            ai_max_tokens,
            ai_temperature,
            ai_timeout,
            title_timeout,
            typing_delay,
            public_base_url,
            cors_origin,
        })
    }
}

/// Parses `key` when it is set, otherwise falls back to `default`.
fn parse_or<T, E, F>(var: &F, key: &str, default: Result<T, E>) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    E: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => default.map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}
