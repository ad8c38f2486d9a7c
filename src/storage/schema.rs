//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Driftnet database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    notes_stored INTEGER NOT NULL DEFAULT 0,
    comments_stored INTEGER NOT NULL DEFAULT 0,
    units_failed INTEGER NOT NULL DEFAULT 0
);

-- Harvested notes, keyed by platform id
CREATE TABLE IF NOT EXISTS notes (
    note_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    nickname TEXT NOT NULL,
    gender TEXT NOT NULL,
    profile_url TEXT NOT NULL,
    avatar TEXT NOT NULL,
    content TEXT NOT NULL,
    full_text TEXT,
    is_long INTEGER NOT NULL DEFAULT 0,
    liked_count TEXT NOT NULL,
    comments_count TEXT NOT NULL,
    shared_count TEXT NOT NULL,
    create_time INTEGER NOT NULL,
    add_ts INTEGER NOT NULL,
    last_modify_ts INTEGER NOT NULL,
    ip_location TEXT NOT NULL,
    pics TEXT NOT NULL,
    media_info TEXT,
    pinned INTEGER NOT NULL DEFAULT 0,
    note_url TEXT NOT NULL,
    source_keyword TEXT
);

CREATE INDEX IF NOT EXISTS idx_notes_user ON notes(user_id);
CREATE INDEX IF NOT EXISTS idx_notes_create_time ON notes(create_time);

-- Harvested comments and replies
CREATE TABLE IF NOT EXISTS comments (
    comment_id TEXT PRIMARY KEY,
    note_id TEXT NOT NULL,
    parent_comment_id TEXT,
    user_id TEXT NOT NULL,
    nickname TEXT NOT NULL,
    gender TEXT NOT NULL,
    profile_url TEXT NOT NULL,
    avatar TEXT NOT NULL,
    content TEXT NOT NULL,
    create_time INTEGER NOT NULL,
    like_count TEXT NOT NULL,
    sub_comment_count TEXT NOT NULL,
    ip_location TEXT NOT NULL,
    add_ts INTEGER NOT NULL,
    last_modify_ts INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comments_note ON comments(note_id);

-- Creator profiles
CREATE TABLE IF NOT EXISTS creators (
    user_id TEXT PRIMARY KEY,
    nickname TEXT NOT NULL,
    avatar TEXT NOT NULL,
    gender TEXT NOT NULL,
    description TEXT NOT NULL,
    follows TEXT NOT NULL,
    fans TEXT NOT NULL,
    add_ts INTEGER NOT NULL,
    last_modify_ts INTEGER NOT NULL
);

-- Per-creator watermark: newest published time already stored
CREATE TABLE IF NOT EXISTS checkpoints (
    owner_id TEXT PRIMARY KEY,
    last_modify_ts INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
