//! Creator timeline harvesting
//!
//! Timelines are served newest first, so the scan walks pages until it meets
//! the first entry at or below the creator's checkpoint and stops there.
//! Pinned entries sit at the top regardless of age; they are always stored
//! and never end the scan.
//!
//! # Termination
//!
//! | Condition | Stop reason |
//! |-----------|-------------|
//! | Page without `cards` or without note cards | `EmptyPage` |
//! | First entry on the page is stale | `NothingNew` |
//! | A stale entry after some kept ones | `ReachedCheckpoint` |
//! | `since_id` missing or `"0"` | `LastPage` |
//! | `since_id` already requested | `StalledCursor` |
//! | Cards seen reach `cardlistInfo.total` | `TotalReached` |
//! | Shutdown requested | `Cancelled` |

use crate::crawler::decode::value_as_i64;
use crate::crawler::pipeline::{decode_cards, store_note, CrawlContext, CrawlReport, StopReason};
use crate::model::{value_to_string, Mblog, NOTE_CARD_TYPE};
use crate::state::{CheckpointGate, CursorStep, SinceIdCursor};
use crate::Result;
use chrono::Utc;
use serde_json::Value;

/// Harvests a creator's timeline down to the stored checkpoint
///
/// The checkpoint is raised to the newest stored note only once the scan
/// stops on its own. A cancelled or failed scan leaves it untouched, so the
/// next run walks the same window again and re-upserts what it already has.
///
/// # Returns
///
/// * `Ok(CrawlReport)` - The scan stopped normally or was cancelled
/// * `Err(HarvestError)` - A request exhausted its retries or the store failed
pub async fn crawl_creator(
    ctx: &CrawlContext,
    creator_id: &str,
    container_id: &str,
) -> Result<CrawlReport> {
    let gate = CheckpointGate::new(
        creator_id,
        ctx.store.get_checkpoint(creator_id)?,
        Utc::now().timestamp(),
    );
    tracing::info!(
        "Harvesting creator {} newer than {}",
        gate.owner_id(),
        gate.watermark()
    );

    let mut report = CrawlReport::default();
    let mut cursor = SinceIdCursor::new();
    let mut cards_seen = 0usize;
    let mut newest: Option<i64> = None;

    report.stop = 'pages: loop {
        let data = match ctx
            .client
            .get_notes_by_creator(creator_id, container_id, cursor.current())
            .await
        {
            Ok(data) => data,
            Err(e) if e.is_cancelled() => break StopReason::Cancelled,
            Err(e) => return Err(e),
        };
        report.pages += 1;

        let cards = match data.get("cards") {
            Some(Value::Array(cards)) => decode_cards(cards),
            _ => break StopReason::EmptyPage,
        };
        cards_seen += cards.len();

        let notes: Vec<Mblog> = cards
            .into_iter()
            .filter(|card| card.card_type == NOTE_CARD_TYPE)
            .filter_map(|card| card.mblog)
            .collect();
        if notes.is_empty() {
            break StopReason::EmptyPage;
        }

        let mut kept = 0usize;
        let mut reached_checkpoint = false;
        for mblog in &notes {
            if !gate.classify(mblog).keep() {
                reached_checkpoint = true;
                break;
            }

            let stored = match store_note(ctx, mblog, None).await {
                Ok(stored) => stored,
                Err(e) if e.is_cancelled() => break 'pages StopReason::Cancelled,
                Err(e) => return Err(e),
            };
            newest = newest.max(Some(stored.item.create_time));

            kept += 1;
            report.notes_stored += 1;
            report.comments_stored += stored.comments;
        }

        tracing::debug!(
            "Creator {} page {}: {} entries, {} kept",
            creator_id,
            report.pages,
            notes.len(),
            kept
        );

        if kept == 0 {
            break StopReason::NothingNew;
        }
        if reached_checkpoint {
            break StopReason::ReachedCheckpoint;
        }

        let info = data.get("cardlistInfo");
        let next = info
            .and_then(|info| info.get("since_id"))
            .map(value_to_string);
        match cursor.advance(next.as_deref()) {
            CursorStep::Advanced => {}
            CursorStep::Exhausted => break StopReason::LastPage,
            CursorStep::Stalled => {
                tracing::warn!(
                    "Creator {} timeline repeated since_id {:?}, stopping",
                    creator_id,
                    next
                );
                break StopReason::StalledCursor;
            }
        }

        let total = info
            .and_then(|info| info.get("total"))
            .and_then(value_as_i64);
        if let Some(total) = total {
            if cards_seen as i64 >= total {
                break StopReason::TotalReached;
            }
        }

        if ctx.limiter.pause().await.is_err() {
            break StopReason::Cancelled;
        }
    };

    match newest {
        Some(ts) if !report.interrupted() => ctx.store.advance_checkpoint(creator_id, ts)?,
        Some(_) => tracing::info!(
            "Creator {} interrupted, checkpoint stays at {}",
            creator_id,
            gate.watermark()
        ),
        None => {}
    }

    tracing::info!(
        "Creator {} done: {} notes, {} comments over {} pages ({:?})",
        creator_id,
        report.notes_stored,
        report.comments_stored,
        report.pages,
        report.stop
    );
    Ok(report)
}
