//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Store trait.

use crate::model::{CommentBatch, ContentItem, CreatorProfile};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Store, StoreError, StoreResult};
use crate::storage::{RunRecord, RunStats, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
///
/// The connection sits behind a mutex so concurrent harvest tasks can share
/// one store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    media_dir: PathBuf,
}

impl SqliteStore {
    /// Opens (or creates) the database file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `media_dir` - Directory downloaded pictures are written to
    pub fn new(path: &Path, media_dir: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            media_dir: media_dir.to_path_buf(),
        })
    }

    /// Creates an in-memory database; pictures go to the system temp directory
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            media_dir: std::env::temp_dir().join("driftnet-media"),
        })
    }

    /// Redirects picture writes to `media_dir`
    pub fn with_media_dir(mut self, media_dir: &Path) -> Self {
        self.media_dir = media_dir.to_path_buf();
        self
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn count(&self, sql: &str) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn count_notes(&self) -> StoreResult<u64> {
        self.count("SELECT COUNT(*) FROM notes")
    }

    pub fn count_comments(&self) -> StoreResult<u64> {
        self.count("SELECT COUNT(*) FROM comments")
    }

    pub fn count_creators(&self) -> StoreResult<u64> {
        self.count("SELECT COUNT(*) FROM creators")
    }

    /// Number of stored comments (replies included) for one note
    pub fn count_comments_for_note(&self, note_id: &str) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE note_id = ?1",
            params![note_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Ids of every stored note by one creator, newest first
    pub fn note_ids_for_creator(&self, user_id: &str) -> StoreResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT note_id FROM notes WHERE user_id = ?1 ORDER BY create_time DESC, note_id",
        )?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Keyword that led to a stored note, if any
    pub fn note_source_keyword(&self, note_id: &str) -> StoreResult<Option<String>> {
        let conn = self.lock()?;
        let keyword = conn
            .query_row(
                "SELECT source_keyword FROM notes WHERE note_id = ?1",
                params![note_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(keyword.flatten())
    }

    /// Every stored checkpoint as `(owner_id, watermark)`
    pub fn list_checkpoints(&self) -> StoreResult<Vec<(String, i64)>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT owner_id, last_modify_ts FROM checkpoints ORDER BY owner_id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_run(&self, run_id: i64) -> StoreResult<RunRecord> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, started_at, finished_at, config_hash, status,
                    notes_stored, comments_stored, units_failed
             FROM runs WHERE id = ?1",
            params![run_id],
            run_from_row,
        )
        .optional()?
        .ok_or(StoreError::RunNotFound(run_id))
    }

    pub fn get_latest_run(&self) -> StoreResult<Option<RunRecord>> {
        let conn = self.lock()?;
        let run = conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status,
                        notes_stored, comments_stored, units_failed
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
        stats: RunStats {
            notes_stored: row.get::<_, i64>(5)? as u64,
            comments_stored: row.get::<_, i64>(6)? as u64,
            units_failed: row.get::<_, i64>(7)? as u64,
        },
    })
}

/// Keeps picture file names to a safe character set
fn media_file_name(media_id: &str, extension: &str) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .collect()
    };

    let stem = match clean(media_id) {
        s if s.is_empty() => "media".to_string(),
        s => s,
    };
    match clean(extension.trim_start_matches('.')) {
        ext if ext.is_empty() => stem,
        ext => format!("{}.{}", stem, ext),
    }
}

impl Store for SqliteStore {
    // ===== Harvested records =====

    fn upsert_content(&self, item: &ContentItem) -> StoreResult<()> {
        let pics = serde_json::to_string(&item.pics)?;
        let media_info = item
            .media_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notes (
                note_id, user_id, nickname, gender, profile_url, avatar,
                content, full_text, is_long, liked_count, comments_count, shared_count,
                create_time, add_ts, last_modify_ts, ip_location, pics, media_info,
                pinned, note_url, source_keyword
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                      ?13, ?14, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
            ON CONFLICT(note_id) DO UPDATE SET
                user_id = excluded.user_id,
                nickname = excluded.nickname,
                gender = excluded.gender,
                profile_url = excluded.profile_url,
                avatar = excluded.avatar,
                content = excluded.content,
                full_text = COALESCE(excluded.full_text, notes.full_text),
                is_long = excluded.is_long,
                liked_count = excluded.liked_count,
                comments_count = excluded.comments_count,
                shared_count = excluded.shared_count,
                create_time = excluded.create_time,
                last_modify_ts = excluded.last_modify_ts,
                ip_location = excluded.ip_location,
                pics = excluded.pics,
                media_info = excluded.media_info,
                pinned = excluded.pinned,
                note_url = excluded.note_url,
                source_keyword = COALESCE(excluded.source_keyword, notes.source_keyword)",
            params![
                item.note_id,
                item.user_id,
                item.nickname,
                item.gender,
                item.profile_url,
                item.avatar,
                item.content,
                item.full_text,
                item.is_long,
                item.liked_count,
                item.comments_count,
                item.shared_count,
                item.create_time,
                item.last_modify_ts,
                item.ip_location,
                pics,
                media_info,
                item.pinned,
                item.note_url,
                item.source_keyword,
            ],
        )?;
        Ok(())
    }

    fn upsert_comments(&self, batch: &CommentBatch) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO comments (
                    comment_id, note_id, parent_comment_id, user_id, nickname, gender,
                    profile_url, avatar, content, create_time, like_count, sub_comment_count,
                    ip_location, add_ts, last_modify_ts
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
                ON CONFLICT(comment_id) DO UPDATE SET
                    note_id = excluded.note_id,
                    parent_comment_id = COALESCE(excluded.parent_comment_id, comments.parent_comment_id),
                    user_id = excluded.user_id,
                    nickname = excluded.nickname,
                    gender = excluded.gender,
                    profile_url = excluded.profile_url,
                    avatar = excluded.avatar,
                    content = excluded.content,
                    create_time = excluded.create_time,
                    like_count = excluded.like_count,
                    sub_comment_count = excluded.sub_comment_count,
                    ip_location = excluded.ip_location,
                    last_modify_ts = excluded.last_modify_ts",
            )?;

            for comment in &batch.comments {
                stmt.execute(params![
                    comment.comment_id,
                    comment.note_id,
                    comment.parent_comment_id,
                    comment.user_id,
                    comment.nickname,
                    comment.gender,
                    comment.profile_url,
                    comment.avatar,
                    comment.content,
                    comment.create_time,
                    comment.like_count,
                    comment.sub_comment_count,
                    comment.ip_location,
                    comment.last_modify_ts,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn upsert_creator(&self, profile: &CreatorProfile) -> StoreResult<()> {
        let now = Utc::now().timestamp();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO creators (
                user_id, nickname, avatar, gender, description, follows, fans, add_ts, last_modify_ts
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ON CONFLICT(user_id) DO UPDATE SET
                nickname = excluded.nickname,
                avatar = excluded.avatar,
                gender = excluded.gender,
                description = excluded.description,
                follows = excluded.follows,
                fans = excluded.fans,
                last_modify_ts = excluded.last_modify_ts",
            params![
                profile.id,
                profile.nickname,
                profile.avatar,
                profile.gender,
                profile.description,
                profile.follows,
                profile.fans,
                now,
            ],
        )?;
        Ok(())
    }

    // ===== Checkpoints =====

    fn get_checkpoint(&self, owner_id: &str) -> StoreResult<Option<i64>> {
        let conn = self.lock()?;
        let ts = conn
            .query_row(
                "SELECT last_modify_ts FROM checkpoints WHERE owner_id = ?1",
                params![owner_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(ts)
    }

    fn advance_checkpoint(&self, owner_id: &str, ts: i64) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO checkpoints (owner_id, last_modify_ts, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(owner_id) DO UPDATE SET
                last_modify_ts = MAX(checkpoints.last_modify_ts, excluded.last_modify_ts),
                updated_at = excluded.updated_at",
            params![owner_id, ts, now],
        )?;
        Ok(())
    }

    // ===== Media =====

    fn save_media(&self, media_id: &str, extension: &str, bytes: &[u8]) -> StoreResult<String> {
        std::fs::create_dir_all(&self.media_dir)?;
        let path = self.media_dir.join(media_file_name(media_id, extension));
        std::fs::write(&path, bytes)?;
        Ok(path.to_string_lossy().into_owned())
    }

    // ===== Run bookkeeping =====

    fn begin_run(&self, config_hash: &str) -> StoreResult<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn finish_run(&self, run_id: i64, status: RunStatus, stats: &RunStats) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2,
                notes_stored = ?3, comments_stored = ?4, units_failed = ?5
             WHERE id = ?6",
            params![
                status.to_db_string(),
                now,
                stats.notes_stored as i64,
                stats.comments_stored as i64,
                stats.units_failed as i64,
                run_id,
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::RunNotFound(run_id));
        }
        Ok(())
    }
}
