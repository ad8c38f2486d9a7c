//! Configuration module for Driftnet
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use driftnet::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("driftnet.toml")).unwrap();
//! println!("Harvesting {} creators", config.creators.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, CreatorEntry, NotificationConfig, OutputConfig, PlatformConfig,
    RetryConfig, SearchConfig, SearchType,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
