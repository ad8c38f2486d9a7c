//! Keyword search harvesting
//!
//! Search results are paged by number rather than by cursor and carry no
//! checkpoint; every page up to the configured limit is stored, tagged with
//! the keyword that found it.

use crate::config::SearchType;
use crate::crawler::pipeline::{decode_cards, store_note, CrawlContext, CrawlReport, StopReason};
use crate::model::Card;
use crate::Result;
use serde_json::Value;

/// Harvests up to `max_pages` pages of search results for one keyword
pub async fn crawl_keyword(
    ctx: &CrawlContext,
    keyword: &str,
    search_type: SearchType,
    max_pages: u32,
) -> Result<CrawlReport> {
    tracing::info!("Searching for {:?} ({:?})", keyword, search_type);

    let mut report = CrawlReport::default();
    let mut page = 1;

    report.stop = 'pages: loop {
        if page > max_pages {
            break StopReason::PageLimit;
        }

        let data = match ctx
            .client
            .get_note_by_keyword(keyword, page, search_type)
            .await
        {
            Ok(data) => data,
            Err(e) if e.is_cancelled() => break StopReason::Cancelled,
            Err(e) => return Err(e),
        };
        report.pages += 1;

        let notes = match data.get("cards") {
            Some(Value::Array(cards)) => Card::notes(decode_cards(cards)),
            _ => break StopReason::EmptyPage,
        };
        if notes.is_empty() {
            break StopReason::EmptyPage;
        }

        for mblog in &notes {
            match store_note(ctx, mblog, Some(keyword)).await {
                Ok(stored) => {
                    report.notes_stored += 1;
                    report.comments_stored += stored.comments;
                }
                Err(e) if e.is_cancelled() => break 'pages StopReason::Cancelled,
                Err(e) => return Err(e),
            }
        }

        page += 1;
        if page > max_pages {
            break StopReason::PageLimit;
        }
        if ctx.limiter.pause().await.is_err() {
            break StopReason::Cancelled;
        }
    };

    tracing::info!(
        "Keyword {:?} done: {} notes, {} comments over {} pages ({:?})",
        keyword,
        report.notes_stored,
        report.comments_stored,
        report.pages,
        report.stop
    );
    Ok(report)
}
