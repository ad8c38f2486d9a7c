use crate::config::types::{
    Config, CrawlerConfig, CreatorEntry, NotificationConfig, OutputConfig, PlatformConfig,
    RetryConfig, SearchConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_platform_config(&config.platform)?;
    validate_retry_config(&config.retry)?;
    validate_notification_config(&config.notification)?;
    validate_output_config(&config.output)?;
    validate_search_config(&config.search)?;
    validate_creators(&config.creators)?;
    Ok(())
}

/// Validates crawl loop configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.min_interval > config.crawl_interval {
        return Err(ConfigError::Validation(format!(
            "min_interval ({}ms) cannot exceed crawl_interval ({}ms)",
            config.min_interval, config.crawl_interval
        )));
    }

    if !(0.0..=1.0).contains(&config.interval_jitter) {
        return Err(ConfigError::Validation(format!(
            "interval_jitter must be between 0.0 and 1.0, got {}",
            config.interval_jitter
        )));
    }

    if config.max_comments_per_note < 1 {
        return Err(ConfigError::Validation(
            "max_comments_per_note must be >= 1".to_string(),
        ));
    }

    if config.max_concurrent_tasks < 1 || config.max_concurrent_tasks > 32 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_tasks must be between 1 and 32, got {}",
            config.max_concurrent_tasks
        )));
    }

    Ok(())
}

/// Validates platform connection settings
fn validate_platform_config(config: &PlatformConfig) -> Result<(), ConfigError> {
    validate_http_url("host", &config.host)?;
    validate_http_url("image_proxy_host", &config.image_proxy_host)?;

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the retry policy
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 20 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 20, got {}",
            config.max_attempts
        )));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "base_delay_ms ({}) cannot exceed max_delay_ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}

/// Validates notification settings
fn validate_notification_config(config: &NotificationConfig) -> Result<(), ConfigError> {
    if let Some(webhook) = &config.webhook_url {
        validate_http_url("webhook_url", webhook)?;
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.media_dir.is_empty() {
        return Err(ConfigError::Validation(
            "media_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates keyword search settings
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.keywords.iter().any(|k| k.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "search keywords cannot be blank".to_string(),
        ));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "search max_pages must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates creator entries
fn validate_creators(creators: &[CreatorEntry]) -> Result<(), ConfigError> {
    for entry in creators {
        validate_numeric_id(&entry.id)?;

        if let Some(container) = &entry.container_id {
            if container.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Creator '{}' has an empty container-id",
                    entry.id
                )));
            }
        }
    }
    Ok(())
}

/// Platform user ids are plain decimal strings
fn validate_numeric_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::Validation(format!(
            "Creator id must be numeric, got '{}'",
            id
        )));
    }
    Ok(())
}

/// Validates an absolute http(s) URL
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", field, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    Ok(())
}
