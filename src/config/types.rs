use serde::Deserialize;

/// Main configuration structure for Driftnet
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default, rename = "creator")]
    pub creators: Vec<CreatorEntry>,
}

/// Crawl loop behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Base delay between successive page requests (milliseconds)
    #[serde(rename = "crawl-interval")]
    pub crawl_interval: u64,

    /// Floor the jittered delay never drops below (milliseconds)
    #[serde(rename = "min-interval", default)]
    pub min_interval: u64,

    /// Relative jitter applied around the crawl interval (0.0 - 1.0)
    #[serde(rename = "interval-jitter", default = "default_interval_jitter")]
    pub interval_jitter: f64,

    /// Whether comment threads are harvested for stored notes
    #[serde(rename = "enable-comments", default = "default_true")]
    pub enable_comments: bool,

    /// Whether sub-comments embedded in comment pages are expanded
    #[serde(rename = "enable-sub-comments", default)]
    pub enable_sub_comments: bool,

    /// Whether note pictures are downloaded
    #[serde(rename = "enable-media", default)]
    pub enable_media: bool,

    /// Comment cap per note (sub-comment expansion may overshoot it)
    #[serde(rename = "max-comments-per-note", default = "default_max_comments")]
    pub max_comments_per_note: usize,

    /// Number of creator/keyword tasks allowed to run at once
    #[serde(rename = "max-concurrent-tasks", default = "default_concurrency")]
    pub max_concurrent_tasks: usize,
}

/// Remote platform connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Base URL of the mobile API
    #[serde(default = "default_host")]
    pub host: String,

    /// Proxy host used to fetch pictures past hotlink protection
    #[serde(rename = "image-proxy-host", default = "default_image_proxy")]
    pub image_proxy_host: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout")]
    pub timeout_secs: u64,

    /// User agent sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Initial cookie string, `name=value; name2=value2`
    #[serde(default)]
    pub cookies: String,

    /// Pause after refreshing a garbled session before retrying (milliseconds)
    #[serde(rename = "recovery-delay-ms", default = "default_recovery_delay")]
    pub recovery_delay_ms: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            image_proxy_host: default_image_proxy(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
            cookies: String::new(),
            recovery_delay_ms: default_recovery_delay(),
        }
    }
}

/// Retry/backoff policy for outbound requests
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay; doubles on every further failure (milliseconds)
    #[serde(rename = "base-delay-ms", default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff delay (milliseconds)
    #[serde(rename = "max-delay-ms", default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            jitter: true,
        }
    }
}

/// Escalation webhook configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationConfig {
    /// Webhook receiving markdown alerts; alerts are only logged when unset
    #[serde(rename = "webhook-url")]
    pub webhook_url: Option<String>,

    /// Log alerts instead of sending them
    #[serde(rename = "debug-mode", default)]
    pub debug_mode: bool,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory downloaded pictures are written to
    #[serde(rename = "media-dir", default = "default_media_dir")]
    pub media_dir: String,
}

/// Keyword search configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(rename = "search-type", default)]
    pub search_type: SearchType,

    /// Result pages requested per keyword
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            search_type: SearchType::default(),
            max_pages: default_max_pages(),
        }
    }
}

/// Search result ordering offered by the platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchType {
    #[default]
    Default,
    RealTime,
    Popular,
    Video,
}

impl SearchType {
    /// Numeric code the search container expects
    pub fn code(self) -> u32 {
        match self {
            Self::Default => 1,
            Self::RealTime => 61,
            Self::Popular => 60,
            Self::Video => 64,
        }
    }
}

/// Creator whose timeline is harvested incrementally
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatorEntry {
    pub id: String,

    /// Timeline container id; discovered from the platform when absent
    #[serde(rename = "container-id", default)]
    pub container_id: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_interval_jitter() -> f64 {
    0.3
}

fn default_max_comments() -> usize {
    10
}

fn default_concurrency() -> usize {
    1
}

fn default_host() -> String {
    "https://m.weibo.cn".to_string()
}

fn default_image_proxy() -> String {
    "https://i1.wp.com/".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1".to_string()
}

fn default_recovery_delay() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay() -> u64 {
    5_000
}

fn default_max_delay() -> u64 {
    300_000
}

fn default_media_dir() -> String {
    "./media".to_string()
}

fn default_max_pages() -> u32 {
    10
}
