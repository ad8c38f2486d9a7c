//! Comment thread pager
//!
//! Comments are exposed as a stream of `CommentBatch` values: one batch per
//! provider page and, when reply expansion is on, one extra batch per comment
//! that embeds replies. The stream stops on the `max_id` sentinel, on a cursor
//! the provider already handed out, or once the per-note cap is reached.
//!
//! The cap bounds top-level comments; replies are never truncated and may push
//! the total past it.

use crate::crawler::client::PlatformClient;
use crate::crawler::decode::value_as_i64;
use crate::crawler::rate_limit::RateLimiter;
use crate::model::{Comment, CommentBatch, RawComment};
use crate::state::{CommentCursor, CursorStep};
use crate::storage::Store;
use crate::Result;
use futures::stream::{self, Stream, TryStreamExt};
use serde_json::Value;
use std::collections::VecDeque;

/// Per-note comment limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentOptions {
    /// Stop requesting pages once this many comments were collected
    pub max_count: usize,
    /// Emit each comment's embedded replies as their own batch
    pub expand_sub_comments: bool,
}

struct Pager<'a> {
    client: &'a PlatformClient,
    limiter: &'a RateLimiter,
    note_id: &'a str,
    options: CommentOptions,
    cursor: CommentCursor,
    collected: usize,
    pages: usize,
    finished: bool,
    pending: VecDeque<CommentBatch>,
}

impl Pager<'_> {
    async fn fetch_page(&mut self) -> Result<()> {
        if self.pages > 0 {
            self.limiter.pause().await?;
        }

        let data = self
            .client
            .get_note_comments(self.note_id, self.cursor.max_id(), self.cursor.max_id_type())
            .await?;
        self.pages += 1;

        let mut raw: Vec<RawComment> = match data.get("data") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        };

        let step = self.cursor.advance(
            data.get("max_id").and_then(value_as_i64),
            data.get("max_id_type").and_then(value_as_i64),
        );
        if step == CursorStep::Stalled {
            tracing::warn!(
                "Comment cursor for note {} did not advance, stopping",
                self.note_id
            );
        }
        self.finished = !step.has_more();

        let remaining = self.options.max_count.saturating_sub(self.collected);
        raw.truncate(remaining);
        self.collected += raw.len();

        let crawled_at = chrono::Utc::now().timestamp();
        if !raw.is_empty() {
            self.pending.push_back(CommentBatch {
                note_id: self.note_id.to_string(),
                comments: raw
                    .iter()
                    .map(|c| Comment::from_raw(c, self.note_id, None, crawled_at))
                    .collect(),
            });
        }

        if self.options.expand_sub_comments {
            for parent in &raw {
                let replies = parent.sub_comments();
                if replies.is_empty() {
                    continue;
                }
                self.collected += replies.len();
                self.pending.push_back(CommentBatch {
                    note_id: self.note_id.to_string(),
                    comments: replies
                        .iter()
                        .map(|c| Comment::from_raw(c, self.note_id, Some(&parent.id), crawled_at))
                        .collect(),
                });
            }
        }

        Ok(())
    }
}

/// Streams a note's comments batch by batch
///
/// The stream is single-pass; a new call starts again from the first page.
pub fn comment_batches<'a>(
    client: &'a PlatformClient,
    limiter: &'a RateLimiter,
    note_id: &'a str,
    options: CommentOptions,
) -> impl Stream<Item = Result<CommentBatch>> + 'a {
    let pager = Pager {
        client,
        limiter,
        note_id,
        options,
        cursor: CommentCursor::new(),
        collected: 0,
        pages: 0,
        finished: false,
        pending: VecDeque::new(),
    };

    stream::try_unfold(pager, |mut pager| async move {
        loop {
            if let Some(batch) = pager.pending.pop_front() {
                return Ok(Some((batch, pager)));
            }
            if pager.finished || pager.collected >= pager.options.max_count {
                tracing::debug!(
                    "Comment thread for note {} done after {} pages, {} comments",
                    pager.note_id,
                    pager.pages,
                    pager.collected
                );
                return Ok(None);
            }
            pager.fetch_page().await?;
        }
    })
}

/// Streams a note's comments straight into the store
///
/// # Returns
///
/// The number of comments stored
pub async fn store_note_comments(
    client: &PlatformClient,
    limiter: &RateLimiter,
    store: &dyn Store,
    note_id: &str,
    options: CommentOptions,
) -> Result<usize> {
    let batches = comment_batches(client, limiter, note_id, options);
    futures::pin_mut!(batches);

    let mut stored = 0;
    while let Some(batch) = batches.try_next().await? {
        store.upsert_comments(&batch)?;
        stored += batch.len();
    }

    tracing::info!("Stored {} comments for note {}", stored, note_id);
    Ok(stored)
}
