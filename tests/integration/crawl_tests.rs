//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the platform's mobile API and
//! drive the timeline, search and comment loops end-to-end.

use async_trait::async_trait;
use chrono::Utc;
use driftnet::config::{parse_config, PlatformConfig, SearchType};
use driftnet::crawler::{
    comment_batches, crawl_creator, crawl_keyword, store_note_comments, CommentOptions,
    CrawlContext, CrawlOptions, Harvester, PlatformClient, RateLimiter, Retrier, RetryPolicy,
    StopReason,
};
use driftnet::model::{CommentBatch, ContentItem, CreatorProfile};
use driftnet::notify::{Notifier, NotifyError};
use driftnet::state::{Session, SessionProvider, SessionState};
use driftnet::storage::{RunStats, RunStatus, SqliteStore, Store, StoreResult};
use driftnet::HarvestError;
use futures::TryStreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CREATOR: &str = "1001";
const CONTAINER: &str = "1076031001";

// ===== Test doubles =====

/// SQLite store that counts every write and keeps the last copy of each note
struct RecordingStore {
    inner: SqliteStore,
    media: TempDir,
    items: Mutex<HashMap<String, ContentItem>>,
    content_writes: AtomicUsize,
    comment_writes: AtomicUsize,
    checkpoint_writes: AtomicUsize,
}

impl RecordingStore {
    fn new() -> Self {
        let media = TempDir::new().unwrap();
        Self {
            inner: SqliteStore::new_in_memory()
                .unwrap()
                .with_media_dir(media.path()),
            media,
            items: Mutex::new(HashMap::new()),
            content_writes: AtomicUsize::new(0),
            comment_writes: AtomicUsize::new(0),
            checkpoint_writes: AtomicUsize::new(0),
        }
    }

    fn item(&self, note_id: &str) -> ContentItem {
        self.items.lock().unwrap()[note_id].clone()
    }

    fn writes(&self) -> usize {
        self.content_writes.load(Ordering::SeqCst)
            + self.comment_writes.load(Ordering::SeqCst)
            + self.checkpoint_writes.load(Ordering::SeqCst)
    }
}

impl Store for RecordingStore {
    fn upsert_content(&self, item: &ContentItem) -> StoreResult<()> {
        self.content_writes.fetch_add(1, Ordering::SeqCst);
        self.items
            .lock()
            .unwrap()
            .insert(item.note_id.clone(), item.clone());
        self.inner.upsert_content(item)
    }

    fn upsert_comments(&self, batch: &CommentBatch) -> StoreResult<()> {
        self.comment_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert_comments(batch)
    }

    fn upsert_creator(&self, profile: &CreatorProfile) -> StoreResult<()> {
        self.inner.upsert_creator(profile)
    }

    fn get_checkpoint(&self, owner_id: &str) -> StoreResult<Option<i64>> {
        self.inner.get_checkpoint(owner_id)
    }

    fn advance_checkpoint(&self, owner_id: &str, ts: i64) -> StoreResult<()> {
        self.checkpoint_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.advance_checkpoint(owner_id, ts)
    }

    fn save_media(&self, media_id: &str, extension: &str, bytes: &[u8]) -> StoreResult<String> {
        self.inner.save_media(media_id, extension, bytes)
    }

    fn begin_run(&self, config_hash: &str) -> StoreResult<i64> {
        self.inner.begin_run(config_hash)
    }

    fn finish_run(&self, run_id: i64, status: RunStatus, stats: &RunStats) -> StoreResult<()> {
        self.inner.finish_run(run_id, status, stats)
    }
}

#[derive(Default)]
struct CountingNotifier {
    calls: AtomicUsize,
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn escalate(&self, _message: &str) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct CountingProvider {
    refreshes: AtomicUsize,
}

#[async_trait]
impl SessionProvider for CountingProvider {
    async fn cookies(
        &self,
        _url_filter: Option<&[String]>,
    ) -> Result<Vec<(String, String)>, HarvestError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(vec![("SUB".to_string(), "fresh".to_string())])
    }
}

// ===== Harness =====

struct Harness {
    server: MockServer,
    store: Arc<RecordingStore>,
    notifier: Arc<CountingNotifier>,
    provider: Arc<CountingProvider>,
    ctx: CrawlContext,
}

fn no_comments() -> CrawlOptions {
    CrawlOptions {
        enable_comments: false,
        enable_media: false,
        comments: CommentOptions {
            max_count: 10,
            expand_sub_comments: false,
        },
    }
}

async fn harness(options: CrawlOptions) -> Harness {
    harness_with_cancel(options, CancellationToken::new()).await
}

async fn harness_with_cancel(options: CrawlOptions, cancel: CancellationToken) -> Harness {
    let server = MockServer::start().await;
    let platform = PlatformConfig {
        host: server.uri(),
        image_proxy_host: server.uri(),
        cookies: "SUB=abc".to_string(),
        recovery_delay_ms: 0,
        ..PlatformConfig::default()
    };

    let notifier = Arc::new(CountingNotifier::default());
    let provider = Arc::new(CountingProvider::default());
    let policy = RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        jitter: false,
    };
    let retrier = Retrier::new(policy, notifier.clone(), cancel.clone());
    let session = SessionState::new(
        Session::new(&platform.user_agent, &platform.cookies),
        provider.clone(),
    );
    let http = driftnet::crawler::build_http_client(&platform).unwrap();
    let client = PlatformClient::new(http, &platform, session, Arc::new(retrier));

    let store = Arc::new(RecordingStore::new());
    let ctx = CrawlContext {
        client,
        store: store.clone(),
        limiter: RateLimiter::new(Duration::ZERO, Duration::ZERO, 0.0, cancel),
        options,
    };

    Harness {
        server,
        store,
        notifier,
        provider,
        ctx,
    }
}

// ===== Payload builders =====

fn created_at(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .unwrap()
        .format("%a %b %d %H:%M:%S %z %Y")
        .to_string()
}

fn note_card(id: &str, ts: i64, pinned: bool) -> Value {
    let mut mblog = json!({
        "id": id,
        "text": format!("note <span>{}</span>", id),
        "created_at": created_at(ts),
        "attitudes_count": 1,
        "comments_count": 0,
        "reposts_count": 0,
        "pic_num": 0,
        "user": {"id": 1001, "screen_name": "tester", "gender": "f"}
    });
    if pinned {
        mblog["title"] = json!({"text": "置顶", "base_color": 1});
    }
    json!({"card_type": 9, "mblog": mblog})
}

fn timeline_page(cards: Vec<Value>, since_id: &str, total: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "ok": 1,
        "data": {
            "cards": cards,
            "cardlistInfo": {"since_id": since_id, "total": total}
        }
    }))
}

fn comment(id: &str, replies: Vec<Value>) -> Value {
    json!({
        "id": id,
        "text": format!("comment {}", id),
        "created_at": created_at(Utc::now().timestamp()),
        "like_count": 0,
        "total_number": replies.len(),
        "source": "来自北京",
        "user": {"id": 2002, "screen_name": "reader"},
        "comments": replies
    })
}

fn comment_page(comments: Vec<Value>, max_id: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "ok": 1,
        "data": {"data": comments, "max_id": max_id, "max_id_type": 0}
    }))
}

async fn mount_timeline(server: &MockServer, since_id: &str, page: ResponseTemplate, times: u64) {
    Mock::given(method("GET"))
        .and(path("/api/container/getIndex"))
        .and(query_param("containerid", CONTAINER))
        .and(query_param("since_id", since_id))
        .respond_with(page)
        .expect(times)
        .mount(server)
        .await;
}

// ===== Timeline =====

#[tokio::test]
async fn test_early_stop_keeps_pinned_and_fresh() {
    let h = harness(no_comments()).await;
    let now = Utc::now().timestamp();
    let checkpoint = now - 1000;
    h.store.inner.advance_checkpoint(CREATOR, checkpoint).unwrap();

    let cards = vec![
        note_card("p1", now - 5000, true),
        note_card("p2", now - 6000, true),
        note_card("f1", now - 100, false),
        note_card("f2", now - 200, false),
        note_card("f3", now - 300, false),
        note_card("f4", now - 400, false),
        note_card("f5", now - 500, false),
        note_card("s1", now - 2000, false),
        note_card("s2", now - 2100, false),
        note_card("s3", now - 2200, false),
    ];
    mount_timeline(&h.server, "", timeline_page(cards, "next", 100), 1).await;
    mount_timeline(&h.server, "next", timeline_page(vec![], "0", 100), 0).await;

    let report = crawl_creator(&h.ctx, CREATOR, CONTAINER).await.unwrap();

    assert_eq!(report.notes_stored, 7);
    assert_eq!(report.pages, 1);
    assert_eq!(report.stop, StopReason::ReachedCheckpoint);
    assert_eq!(h.store.content_writes.load(Ordering::SeqCst), 7);
    assert_eq!(h.store.inner.count_notes().unwrap(), 7);
    assert_eq!(h.store.get_checkpoint(CREATOR).unwrap(), Some(now - 100));
}

#[tokio::test]
async fn test_second_run_without_new_content_writes_nothing() {
    let h = harness(no_comments()).await;
    let now = Utc::now().timestamp();

    let cards = vec![
        note_card("a", now - 10, false),
        note_card("b", now - 20, false),
        note_card("c", now - 30, false),
    ];
    mount_timeline(&h.server, "", timeline_page(cards, "0", 3), 2).await;

    let first = crawl_creator(&h.ctx, CREATOR, CONTAINER).await.unwrap();
    assert_eq!(first.notes_stored, 3);
    let writes_after_first = h.store.writes();

    let second = crawl_creator(&h.ctx, CREATOR, CONTAINER).await.unwrap();
    assert_eq!(second.notes_stored, 0);
    assert_eq!(second.stop, StopReason::NothingNew);
    assert_eq!(h.store.writes(), writes_after_first);
    assert_eq!(h.store.inner.count_notes().unwrap(), 3);
}

#[tokio::test]
async fn test_pinned_entry_older_than_checkpoint_is_stored() {
    let h = harness(no_comments()).await;
    let now = Utc::now().timestamp();
    let checkpoint = now - 100;
    h.store.inner.advance_checkpoint(CREATOR, checkpoint).unwrap();

    let cards = vec![
        note_card("pinned", now - 90_000, true),
        note_card("old", now - 500, false),
    ];
    mount_timeline(&h.server, "", timeline_page(cards, "next", 100), 1).await;

    let report = crawl_creator(&h.ctx, CREATOR, CONTAINER).await.unwrap();

    assert_eq!(report.notes_stored, 1);
    assert_eq!(report.stop, StopReason::ReachedCheckpoint);
    assert_eq!(h.store.inner.note_ids_for_creator(CREATOR).unwrap(), vec!["pinned"]);
    // storing an old pinned entry never lowers the watermark
    assert_eq!(h.store.get_checkpoint(CREATOR).unwrap(), Some(checkpoint));
}

#[tokio::test]
async fn test_repeated_cursor_terminates() {
    let h = harness(no_comments()).await;
    let now = Utc::now().timestamp();

    mount_timeline(
        &h.server,
        "",
        timeline_page(vec![note_card("a", now - 10, false)], "A", 1000),
        1,
    )
    .await;
    mount_timeline(
        &h.server,
        "A",
        timeline_page(vec![note_card("b", now - 20, false)], "A", 1000),
        1,
    )
    .await;

    let report = crawl_creator(&h.ctx, CREATOR, CONTAINER).await.unwrap();

    assert_eq!(report.pages, 2);
    assert_eq!(report.notes_stored, 2);
    assert_eq!(report.stop, StopReason::StalledCursor);
}

#[tokio::test]
async fn test_declared_total_bounds_the_scan() {
    let h = harness(no_comments()).await;
    let now = Utc::now().timestamp();

    let cards = vec![note_card("a", now - 10, false), note_card("b", now - 20, false)];
    mount_timeline(&h.server, "", timeline_page(cards, "next", 2), 1).await;
    mount_timeline(&h.server, "next", timeline_page(vec![], "0", 2), 0).await;

    let report = crawl_creator(&h.ctx, CREATOR, CONTAINER).await.unwrap();

    assert_eq!(report.notes_stored, 2);
    assert_eq!(report.stop, StopReason::TotalReached);
}

#[tokio::test]
async fn test_soft_status_ends_scan_quietly() {
    let h = harness(no_comments()).await;

    Mock::given(method("GET"))
        .and(path("/api/container/getIndex"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": 0, "msg": "这里还没有内容"})),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let report = crawl_creator(&h.ctx, CREATOR, CONTAINER).await.unwrap();

    assert_eq!(report.stop, StopReason::EmptyPage);
    assert_eq!(report.notes_stored, 0);
    assert_eq!(h.notifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_response_refreshes_session_then_succeeds() {
    let h = harness(no_comments()).await;
    let now = Utc::now().timestamp();

    Mock::given(method("GET"))
        .and(path("/api/container/getIndex"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    mount_timeline(
        &h.server,
        "",
        timeline_page(vec![note_card("a", now - 10, false)], "0", 1),
        1,
    )
    .await;

    let report = crawl_creator(&h.ctx, CREATOR, CONTAINER).await.unwrap();

    assert_eq!(report.notes_stored, 1);
    assert_eq!(h.provider.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(h.notifier.calls.load(Ordering::SeqCst), 0);
    let session = h.ctx.client.session().snapshot().await;
    assert_eq!(session.cookie_header(), "SUB=fresh");
}

#[tokio::test]
async fn test_exhausted_retries_escalate_once_and_fail_the_unit() {
    let h = harness(no_comments()).await;

    Mock::given(method("GET"))
        .and(path("/api/container/getIndex"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": -100})))
        .expect(5)
        .mount(&h.server)
        .await;

    let err = crawl_creator(&h.ctx, CREATOR, CONTAINER).await.unwrap_err();

    assert!(matches!(err, HarvestError::RetryExhausted { attempts: 5, .. }));
    assert_eq!(h.notifier.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn test_cancellation_keeps_stored_items() {
    let cancel = CancellationToken::new();
    let h = harness_with_cancel(no_comments(), cancel.clone()).await;
    let now = Utc::now().timestamp();

    mount_timeline(
        &h.server,
        "",
        timeline_page(vec![note_card("a", now - 10, false)], "next", 100),
        1,
    )
    .await;
    mount_timeline(&h.server, "next", timeline_page(vec![], "0", 100), 0).await;

    cancel.cancel();
    let report = crawl_creator(&h.ctx, CREATOR, CONTAINER).await.unwrap();

    assert!(report.interrupted());
    assert_eq!(report.notes_stored, 1);
    assert_eq!(h.store.inner.count_notes().unwrap(), 1);
    assert_eq!(h.store.get_checkpoint(CREATOR).unwrap(), None);
}

#[tokio::test]
async fn test_interrupted_scan_is_resumed_by_next_run() {
    let cancel = CancellationToken::new();
    let h = harness_with_cancel(no_comments(), cancel.clone()).await;
    let now = Utc::now().timestamp();

    mount_timeline(
        &h.server,
        "",
        timeline_page(
            vec![note_card("a", now - 10, false), note_card("b", now - 20, false)],
            "next",
            100,
        ),
        2,
    )
    .await;
    mount_timeline(
        &h.server,
        "next",
        timeline_page(vec![note_card("c", now - 30, false)], "0", 100),
        1,
    )
    .await;

    cancel.cancel();
    let first = crawl_creator(&h.ctx, CREATOR, CONTAINER).await.unwrap();
    assert_eq!(first.stop, StopReason::Cancelled);
    assert_eq!(first.notes_stored, 2);
    assert_eq!(h.store.get_checkpoint(CREATOR).unwrap(), None);

    let resumed = CrawlContext {
        limiter: RateLimiter::new(Duration::ZERO, Duration::ZERO, 0.0, CancellationToken::new()),
        ..h.ctx.clone()
    };
    let second = crawl_creator(&resumed, CREATOR, CONTAINER).await.unwrap();

    assert_eq!(second.stop, StopReason::LastPage);
    assert_eq!(second.pages, 2);
    assert_eq!(
        h.store.inner.note_ids_for_creator(CREATOR).unwrap(),
        vec!["a", "b", "c"]
    );
    assert_eq!(h.store.get_checkpoint(CREATOR).unwrap(), Some(now - 10));
}

// ===== Truncated notes and media =====

fn truncated_card(id: &str, ts: i64, mblog_extra: Value) -> Value {
    let mut card = note_card(id, ts, false);
    for (key, value) in mblog_extra.as_object().unwrap() {
        card["mblog"][key] = value.clone();
    }
    card
}

fn detail_page(id: &str, text: &str) -> ResponseTemplate {
    let render = json!([{"status": {"id": id, "text": text}}]);
    ResponseTemplate::new(200).set_body_string(format!(
        "<html><body><script>var $render_data = {}[0] || {{}};</script></body></html>",
        render
    ))
}

#[tokio::test]
async fn test_truncated_notes_get_full_text_from_detail_page() {
    let h = harness(no_comments()).await;
    let now = Utc::now().timestamp();

    mount_timeline(
        &h.server,
        "",
        timeline_page(
            vec![
                truncated_card("long", now - 10, json!({"isLongText": true})),
                truncated_card("gallery", now - 20, json!({"pic_num": 12})),
                note_card("short", now - 30, false),
            ],
            "0",
            3,
        ),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/detail/long"))
        .respond_with(detail_page("long", "the <a href=\"/n/x\">whole</a> story"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/detail/gallery"))
        .respond_with(detail_page("gallery", "twelve pictures"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/detail/short"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let report = crawl_creator(&h.ctx, CREATOR, CONTAINER).await.unwrap();

    assert_eq!(report.notes_stored, 3);
    assert_eq!(
        h.store.item("long").full_text.as_deref(),
        Some("the whole story")
    );
    assert_eq!(
        h.store.item("gallery").full_text.as_deref(),
        Some("twelve pictures")
    );
    assert_eq!(h.store.item("short").full_text, None);
}

#[tokio::test]
async fn test_detail_page_without_note_keeps_listing_body() {
    let h = harness(no_comments()).await;
    let now = Utc::now().timestamp();

    mount_timeline(
        &h.server,
        "",
        timeline_page(
            vec![truncated_card("long", now - 10, json!({"isLongText": true}))],
            "0",
            1,
        ),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/detail/long"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>deleted</html>"))
        .expect(1)
        .mount(&h.server)
        .await;

    let report = crawl_creator(&h.ctx, CREATOR, CONTAINER).await.unwrap();

    assert_eq!(report.notes_stored, 1);
    assert_eq!(h.store.item("long").full_text, None);
    assert_eq!(h.store.get_checkpoint(CREATOR).unwrap(), Some(now - 10));
}

#[tokio::test]
async fn test_failed_detail_page_fails_the_unit_without_checkpoint() {
    let h = harness(no_comments()).await;
    let now = Utc::now().timestamp();

    mount_timeline(
        &h.server,
        "",
        timeline_page(
            vec![
                note_card("first", now - 10, false),
                truncated_card("long", now - 20, json!({"isLongText": true})),
            ],
            "0",
            2,
        ),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/detail/long"))
        .respond_with(ResponseTemplate::new(500))
        .expect(5)
        .mount(&h.server)
        .await;

    let err = crawl_creator(&h.ctx, CREATOR, CONTAINER).await.unwrap_err();

    assert!(matches!(err, HarvestError::RetryExhausted { attempts: 5, .. }));
    assert_eq!(h.notifier.calls.load(Ordering::SeqCst), 1);
    // the note before the failure stays, the truncated one is not stored half-done
    assert_eq!(h.store.inner.note_ids_for_creator(CREATOR).unwrap(), vec!["first"]);
    assert_eq!(h.store.checkpoint_writes.load(Ordering::SeqCst), 0);
    assert_eq!(h.store.get_checkpoint(CREATOR).unwrap(), None);
}

#[tokio::test]
async fn test_pictures_are_saved_through_image_proxy() {
    let options = CrawlOptions {
        enable_media: true,
        ..no_comments()
    };
    let h = harness(options).await;
    let now = Utc::now().timestamp();

    let pics = json!({
        "pic_num": 2,
        "pics": [
            {"pid": "p1", "url": "https://wx1.sinaimg.cn/orj360/p1.jpg"},
            {"pid": "p2", "url": "https://wx1.sinaimg.cn/orj360/p2.png"}
        ]
    });
    mount_timeline(
        &h.server,
        "",
        timeline_page(vec![truncated_card("pics", now - 10, pics)], "0", 1),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/wx1.sinaimg.cn/large/p1.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg-bytes".to_vec()))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wx1.sinaimg.cn/large/p2.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&h.server)
        .await;

    let report = crawl_creator(&h.ctx, CREATOR, CONTAINER).await.unwrap();
    assert_eq!(report.notes_stored, 1);

    let item = h.store.item("pics");
    assert_eq!(item.pics.len(), 2);

    let saved = &item.pics[0];
    assert!(saved.local_path.starts_with(h.store.media.path().to_str().unwrap()));
    assert!(saved.local_path.ends_with("p1.jpg"));
    assert_eq!(std::fs::read(&saved.local_path).unwrap(), b"jpeg-bytes");

    // a missing picture never fails the note
    assert_eq!(item.pics[1].local_path, "");
}

// ===== Comments =====

fn comment_options(max_count: usize, expand: bool) -> CrawlOptions {
    CrawlOptions {
        enable_comments: true,
        enable_media: false,
        comments: CommentOptions {
            max_count,
            expand_sub_comments: expand,
        },
    }
}

#[tokio::test]
async fn test_comment_cap_keeps_reply_overshoot() {
    let h = harness(comment_options(10, true)).await;

    let replies: Vec<Value> = (1..=5).map(|i| comment(&format!("r{}", i), vec![])).collect();
    let mut comments: Vec<Value> = (1..=7).map(|i| comment(&format!("c{}", i), vec![])).collect();
    comments.push(comment("c8", replies));

    Mock::given(method("GET"))
        .and(path("/comments/hotflow"))
        .and(query_param("id", "42"))
        .respond_with(comment_page(comments, 0))
        .expect(2)
        .mount(&h.server)
        .await;

    let batches: Vec<CommentBatch> =
        comment_batches(&h.ctx.client, &h.ctx.limiter, "42", h.ctx.options.comments)
            .try_collect()
            .await
            .unwrap();

    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 8);
    assert_eq!(batches[1].len(), 5);
    assert!(batches[1]
        .comments
        .iter()
        .all(|c| c.parent_comment_id.as_deref() == Some("c8")));

    let stored = store_note_comments(
        &h.ctx.client,
        &h.ctx.limiter,
        h.store.as_ref(),
        "42",
        h.ctx.options.comments,
    )
    .await
    .unwrap();
    assert_eq!(stored, 13);
    assert_eq!(h.store.inner.count_comments_for_note("42").unwrap(), 13);
}

#[tokio::test]
async fn test_comment_pages_stop_at_cap() {
    let h = harness(comment_options(10, false)).await;

    let comments: Vec<Value> = (1..=12).map(|i| comment(&format!("c{}", i), vec![])).collect();
    Mock::given(method("GET"))
        .and(path("/comments/hotflow"))
        .and(query_param("max_id_type", "0"))
        .respond_with(comment_page(comments, 99))
        .expect(1)
        .mount(&h.server)
        .await;

    let stored = store_note_comments(
        &h.ctx.client,
        &h.ctx.limiter,
        h.store.as_ref(),
        "42",
        h.ctx.options.comments,
    )
    .await
    .unwrap();

    assert_eq!(stored, 10);
    assert_eq!(h.store.inner.count_comments_for_note("42").unwrap(), 10);
}

#[tokio::test]
async fn test_comment_cursor_follows_max_id() {
    let h = harness(comment_options(100, false)).await;

    Mock::given(method("GET"))
        .and(path("/comments/hotflow"))
        .and(query_param("max_id", "555"))
        .respond_with(comment_page(vec![comment("c3", vec![])], 0))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/comments/hotflow"))
        .respond_with(comment_page(
            vec![comment("c1", vec![]), comment("c2", vec![])],
            555,
        ))
        .expect(1)
        .mount(&h.server)
        .await;

    let stored = store_note_comments(
        &h.ctx.client,
        &h.ctx.limiter,
        h.store.as_ref(),
        "42",
        h.ctx.options.comments,
    )
    .await
    .unwrap();

    assert_eq!(stored, 3);
}

#[tokio::test]
async fn test_stored_note_pulls_its_comments() {
    let h = harness(comment_options(10, false)).await;
    let now = Utc::now().timestamp();

    mount_timeline(
        &h.server,
        "",
        timeline_page(vec![note_card("n1", now - 10, false)], "0", 1),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/comments/hotflow"))
        .and(query_param("id", "n1"))
        .respond_with(comment_page(vec![comment("c1", vec![]), comment("c2", vec![])], 0))
        .expect(1)
        .mount(&h.server)
        .await;

    let report = crawl_creator(&h.ctx, CREATOR, CONTAINER).await.unwrap();

    assert_eq!(report.notes_stored, 1);
    assert_eq!(report.comments_stored, 2);
    assert_eq!(h.store.inner.count_comments_for_note("n1").unwrap(), 2);
}

// ===== Search =====

#[tokio::test]
async fn test_keyword_search_tags_notes() {
    let h = harness(no_comments()).await;
    let now = Utc::now().timestamp();

    Mock::given(method("GET"))
        .and(path("/api/container/getIndex"))
        .and(query_param("containerid", "100103type=1&q=rust"))
        .and(query_param("page_type", "searchall"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": 1,
            "data": {"cards": [
                note_card("k1", now - 10, false),
                {"card_type": 11, "card_group": [
                    note_card("k2", now - 20, false),
                    note_card("k3", now - 30, false),
                    {"card_type": 42}
                ]}
            ]}
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let report = crawl_keyword(&h.ctx, "rust", SearchType::Default, 1).await.unwrap();

    assert_eq!(report.notes_stored, 3);
    assert_eq!(report.stop, StopReason::PageLimit);
    assert_eq!(
        h.store.inner.note_source_keyword("k2").unwrap().as_deref(),
        Some("rust")
    );
}

#[tokio::test]
async fn test_keyword_search_stops_on_empty_page() {
    let h = harness(no_comments()).await;
    let now = Utc::now().timestamp();

    Mock::given(method("GET"))
        .and(path("/api/container/getIndex"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": 1,
            "data": {"cards": [note_card("k1", now - 10, false)]}
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/container/getIndex"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": 1, "data": {"cards": []}})))
        .expect(1)
        .mount(&h.server)
        .await;

    let report = crawl_keyword(&h.ctx, "rust", SearchType::RealTime, 5).await.unwrap();

    assert_eq!(report.pages, 2);
    assert_eq!(report.notes_stored, 1);
    assert_eq!(report.stop, StopReason::EmptyPage);
}

// ===== Full run =====

#[tokio::test]
async fn test_full_run_records_outcome() {
    let server = MockServer::start().await;
    let now = Utc::now().timestamp();

    Mock::given(method("GET"))
        .and(path("/api/config"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": 1, "data": {"login": true}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/container/getIndex"))
        .and(query_param("containerid", "1005051001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": 1,
            "data": {"userInfo": {
                "id": 1001, "screen_name": "tester", "gender": "f",
                "follow_count": 3, "followers_count": "1.2万"
            }}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/container/getIndex"))
        .and(query_param("containerid", CONTAINER))
        .respond_with(timeline_page(
            vec![note_card("a", now - 10, false), note_card("b", now - 20, false)],
            "0",
            2,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/container/getIndex"))
        .and(query_param("containerid", "100103type=1&q=rust"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": 1,
            "data": {"cards": [note_card("k1", now - 30, false)]}
        })))
        .mount(&server)
        .await;
    // the second creator's profile page never yields a container cookie
    Mock::given(method("GET"))
        .and(path("/u/2002"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let toml = format!(
        r#"
[crawler]
crawl-interval = 0
enable-comments = false
max-concurrent-tasks = 2

[platform]
host = "{host}"
recovery-delay-ms = 0

[retry]
base-delay-ms = 1
max-delay-ms = 5
jitter = false

[output]
database-path = "unused.db"

[search]
keywords = ["rust"]
max-pages = 1

[[creator]]
id = "1001"
container-id = "{container}"

[[creator]]
id = "2002"
"#,
        host = server.uri(),
        container = CONTAINER
    );
    let config = parse_config(&toml).unwrap();

    let cancel = CancellationToken::new();
    let retrier = Retrier::new(
        RetryPolicy::from_config(&config.retry),
        Arc::new(CountingNotifier::default()),
        cancel.clone(),
    );
    let client = PlatformClient::from_config(&config.platform, retrier).unwrap();
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());

    let harvester =
        Harvester::new(config, client, store.clone(), cancel).with_config_hash("abc123");
    assert_eq!(harvester.work_units().len(), 3);

    let summary = harvester.run().await.unwrap();

    assert_eq!(summary.units_ok, 2);
    assert_eq!(summary.units_failed, 1);
    assert_eq!(summary.notes_stored, 3);
    assert!(!summary.cancelled);
    assert_eq!(store.count_creators().unwrap(), 1);

    let run = store.get_latest_run().unwrap().unwrap();
    assert_eq!(run.id, summary.run_id);
    assert_eq!(run.config_hash, "abc123");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.stats.notes_stored, 3);
    assert_eq!(run.stats.units_failed, 1);
}
