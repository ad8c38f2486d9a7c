//! Shared per-note processing
//!
//! Timeline and search loops hand every kept entry to `store_note`, which
//! completes the body of truncated notes, downloads pictures when enabled,
//! upserts the note and then drains its comment thread.

use crate::config::CrawlerConfig;
use crate::crawler::client::PlatformClient;
use crate::crawler::comments::{store_note_comments, CommentOptions};
use crate::crawler::rate_limit::RateLimiter;
use crate::model::{strip_tags, Card, ContentItem, Mblog};
use crate::storage::Store;
use crate::Result;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

/// Feature switches applied to every stored note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlOptions {
    pub enable_comments: bool,
    pub enable_media: bool,
    pub comments: CommentOptions,
}

impl CrawlOptions {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            enable_comments: config.enable_comments,
            enable_media: config.enable_media,
            comments: CommentOptions {
                max_count: config.max_comments_per_note,
                expand_sub_comments: config.enable_sub_comments,
            },
        }
    }
}

/// Everything a harvest loop needs
#[derive(Clone)]
pub struct CrawlContext {
    pub client: PlatformClient,
    pub store: Arc<dyn Store>,
    pub limiter: RateLimiter,
    pub options: CrawlOptions,
}

/// Why a harvest loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// A page came back without entries
    #[default]
    EmptyPage,
    /// A stale, unpinned entry was reached
    ReachedCheckpoint,
    /// A page had nothing worth storing
    NothingNew,
    /// The provider declared the last page
    LastPage,
    /// The provider repeated a cursor
    StalledCursor,
    /// The provider's declared total was reached
    TotalReached,
    /// The configured page limit was reached
    PageLimit,
    /// Shutdown was requested
    Cancelled,
}

/// Outcome of one harvest loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub pages: usize,
    pub notes_stored: usize,
    pub comments_stored: usize,
    pub stop: StopReason,
}

impl CrawlReport {
    pub fn interrupted(&self) -> bool {
        self.stop == StopReason::Cancelled
    }
}

/// Result of storing one note
#[derive(Debug, Clone)]
pub struct StoredNote {
    pub item: ContentItem,
    pub comments: usize,
}

/// Decodes a page's `cards` array, skipping entries that do not parse
pub fn decode_cards(cards: &[Value]) -> Vec<Card> {
    cards
        .iter()
        .filter_map(|card| match serde_json::from_value(card.clone()) {
            Ok(card) => Some(card),
            Err(e) => {
                tracing::debug!("Skipping undecodable card: {}", e);
                None
            }
        })
        .collect()
}

fn image_extension(url: &str) -> &str {
    url.rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 5)
        .unwrap_or("jpg")
}

/// Stores one note together with its full text, pictures and comments
pub async fn store_note(
    ctx: &CrawlContext,
    mblog: &Mblog,
    source_keyword: Option<&str>,
) -> Result<StoredNote> {
    let mut item = ContentItem::from_mblog(mblog, ctx.client.host(), Utc::now().timestamp());
    item.source_keyword = source_keyword.map(str::to_string);

    // a detail page that loads without render data leaves the listing body
    if mblog.is_truncated() {
        if let Some(detail) = ctx.client.get_note_detail(&item.note_id).await? {
            item.full_text = Some(strip_tags(&detail.text));
        }
    }

    if ctx.options.enable_media {
        for (index, pic) in item.pics.iter_mut().enumerate() {
            let Some(bytes) = ctx.client.get_note_image(&pic.url).await else {
                continue;
            };
            let media_id = if pic.pic_id.is_empty() {
                format!("{}_{}", item.note_id, index)
            } else {
                pic.pic_id.clone()
            };
            pic.local_path = ctx
                .store
                .save_media(&media_id, image_extension(&pic.url), &bytes)?;
        }
    }

    ctx.store.upsert_content(&item)?;
    tracing::info!("Stored note {}: {}", item.note_id, item.preview());

    let comments = if ctx.options.enable_comments {
        store_note_comments(
            &ctx.client,
            &ctx.limiter,
            ctx.store.as_ref(),
            &item.note_id,
            ctx.options.comments,
        )
        .await?
    } else {
        0
    };

    Ok(StoredNote { item, comments })
}
