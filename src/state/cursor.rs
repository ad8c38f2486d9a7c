use std::collections::HashSet;

/// `since_id` value meaning the timeline has no further pages
pub const SINCE_ID_SENTINEL: &str = "0";

/// `max_id` value meaning the comment thread has no further pages
pub const MAX_ID_SENTINEL: i64 = 0;

/// Outcome of feeding a page's next-token into a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStep {
    /// A new token is ready for the next request
    Advanced,
    /// The provider declared the last page
    Exhausted,
    /// The provider handed back a token that was already requested
    Stalled,
}

impl CursorStep {
    pub fn has_more(self) -> bool {
        matches!(self, Self::Advanced)
    }
}

/// Paging token for creator timelines
#[derive(Debug, Clone, Default)]
pub struct SinceIdCursor {
    current: String,
    requested: HashSet<String>,
}

impl SinceIdCursor {
    /// Starts at the first page (empty token)
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to send with the next request
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Advances to `next`, a missing token counting as the sentinel
    pub fn advance(&mut self, next: Option<&str>) -> CursorStep {
        self.requested.insert(self.current.clone());

        let next = next.unwrap_or(SINCE_ID_SENTINEL);
        if next == SINCE_ID_SENTINEL || next.is_empty() {
            return CursorStep::Exhausted;
        }
        if self.requested.contains(next) {
            return CursorStep::Stalled;
        }

        self.current = next.to_string();
        CursorStep::Advanced
    }
}

/// Paging token for comment threads: `(max_id, max_id_type)`
#[derive(Debug, Clone, Default)]
pub struct CommentCursor {
    max_id: Option<i64>,
    max_id_type: i64,
    requested: HashSet<(Option<i64>, i64)>,
}

impl CommentCursor {
    /// Starts at the first page (no `max_id`)
    pub fn new() -> Self {
        Self::default()
    }

    /// `max_id` to send, if any; only positive ids are sent
    pub fn max_id(&self) -> Option<i64> {
        self.max_id.filter(|id| *id > 0)
    }

    pub fn max_id_type(&self) -> i64 {
        self.max_id_type
    }

    /// Advances from a page's declared `max_id`/`max_id_type`
    pub fn advance(&mut self, max_id: Option<i64>, max_id_type: Option<i64>) -> CursorStep {
        self.requested.insert((self.max_id, self.max_id_type));

        let max_id = max_id.unwrap_or(MAX_ID_SENTINEL);
        let max_id_type = max_id_type.unwrap_or(0);
        if max_id == MAX_ID_SENTINEL {
            return CursorStep::Exhausted;
        }
        if self.requested.contains(&(Some(max_id), max_id_type)) {
            return CursorStep::Stalled;
        }

        self.max_id = Some(max_id);
        self.max_id_type = max_id_type;
        CursorStep::Advanced
    }
}
