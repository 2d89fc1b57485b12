//! services/api/src/error.rs
//!
//! Errors that stop the chat studio server from starting or serving.
//! Per-request failures never reach this type; handlers map `PortError`
//! to an HTTP response instead.

use crate::config::ConfigError;
use chat_studio_core::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A completion backend that is configured but cannot be built.
    #[error("Completion backend error: {0}")]
    Port(#[from] PortError),

    /// Connecting to Postgres failed.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Binding the listener or serving connections failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A start-up value that parsed but is unusable, such as a malformed CORS origin.
    #[error("Invalid startup setting: {0}")]
    Internal(String),
}
