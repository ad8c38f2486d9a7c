//! Driftnet: an incremental, resumable harvester for a social platform's mobile API
//!
//! This crate pages through creator timelines, keyword searches and comment
//! threads, keeping only what changed since the last run and persisting it
//! through an idempotent store.

pub mod config;
pub mod crawler;
pub mod model;
pub mod notify;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Driftnet operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Store error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Provider rejected {url}: {message}")]
    Provider { url: String, message: String },

    #[error("{label} failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        label: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Could not resolve container id for creator {creator_id}")]
    MissingContainer { creator_id: String },

    #[error("Session refresh failed: {0}")]
    Session(String),

    #[error("Harvest cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Returns true if this error came from a shutdown request rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Driftnet operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Harvester, PlatformClient};
pub use model::{Comment, CommentBatch, ContentItem};
pub use storage::{SqliteStore, Store};
