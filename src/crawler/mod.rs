//! Crawler module for paging through the platform's mobile API
//!
//! This module contains the core harvesting logic, including:
//! - HTTP transport with session headers and envelope decoding
//! - Retry/backoff with a single escalation on exhaustion
//! - Jittered, cancellable pacing between pages
//! - Creator timelines gated by per-creator checkpoints
//! - Keyword search pages
//! - Comment threads as a stream of batches
//! - Overall run coordination

mod client;
mod comments;
mod coordinator;
mod creator;
mod decode;
mod keyword;
mod markup;
mod pipeline;
mod rate_limit;
mod retry;

pub use client::{build_http_client, proxied_image_url, ContainerIds, PlatformClient};
pub use comments::{comment_batches, store_note_comments, CommentOptions};
pub use coordinator::{Harvester, HarvestSummary, WorkUnit};
pub use creator::crawl_creator;
pub use decode::{decode_envelope, value_as_i64, ProviderOutcome};
pub use keyword::crawl_keyword;
pub use markup::{extract_note_detail, extract_render_data};
pub use pipeline::{decode_cards, store_note, CrawlContext, CrawlOptions, CrawlReport, StopReason, StoredNote};
pub use rate_limit::RateLimiter;
pub use retry::{AttemptError, Retrier, RetryAttempt, RetryPolicy, ESCALATION_TIMEOUT};

use crate::config::Config;
use tokio_util::sync::CancellationToken;

/// Runs a complete harvest
///
/// This is the main entry point for a harvest. It will:
/// 1. Open the store and build the client
/// 2. Probe the session
/// 3. Harvest every creator and keyword
/// 4. Record the run outcome
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `config_hash` - Hash of the configuration file, recorded with the run
/// * `cancel` - Token that stops the harvest at the next wait
pub async fn harvest(
    config: Config,
    config_hash: &str,
    cancel: CancellationToken,
) -> crate::Result<HarvestSummary> {
    Harvester::from_config(config, config_hash, cancel)?
        .run()
        .await
}
