//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `SessionState`: shared, refreshable auth headers and cookies
//! - `CheckpointGate`: per-creator watermark deciding which entries are new
//! - `SinceIdCursor` / `CommentCursor`: paging tokens with termination rules

mod checkpoint;
mod cursor;
mod session;

// Re-export main types
pub use checkpoint::{CheckpointGate, Classification, DEFAULT_LOOKBACK_SECS};
pub use cursor::{CommentCursor, CursorStep, SinceIdCursor, MAX_ID_SENTINEL, SINCE_ID_SENTINEL};
pub use session::{
    parse_cookie_string, Session, SessionProvider, SessionState, StaticCookieProvider,
};
