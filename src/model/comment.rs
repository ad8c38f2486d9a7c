use super::content::RawUser;
use super::{count_text, parse_created_at, string_or_number, strip_tags};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw comment payload from a comment page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawComment {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub created_at: String,

    #[serde(default)]
    pub like_count: Value,

    #[serde(default)]
    pub total_number: Value,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub user: Option<RawUser>,

    /// Embedded first-level replies; `false` when there are none
    #[serde(default)]
    pub comments: Value,
}

impl RawComment {
    /// Replies bundled with this comment on the same page
    pub fn sub_comments(&self) -> Vec<RawComment> {
        match &self.comments {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// A stored comment or sub-comment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub comment_id: String,
    pub note_id: String,
    /// Set for sub-comments only
    pub parent_comment_id: Option<String>,
    pub user_id: String,
    pub nickname: String,
    pub gender: String,
    pub profile_url: String,
    pub avatar: String,
    pub content: String,
    pub create_time: i64,
    pub like_count: String,
    pub sub_comment_count: String,
    pub ip_location: String,
    pub last_modify_ts: i64,
}

impl Comment {
    pub fn from_raw(
        raw: &RawComment,
        note_id: &str,
        parent_comment_id: Option<&str>,
        crawled_at: i64,
    ) -> Self {
        let user = raw.user.clone().unwrap_or_default();

        Self {
            comment_id: raw.id.clone(),
            note_id: note_id.to_string(),
            parent_comment_id: parent_comment_id.map(str::to_string),
            user_id: user.id,
            nickname: user.screen_name,
            gender: user.gender,
            profile_url: user.profile_url,
            avatar: user.profile_image_url,
            content: strip_tags(&raw.text),
            create_time: parse_created_at(&raw.created_at).unwrap_or_default(),
            like_count: count_text(&raw.like_count),
            sub_comment_count: count_text(&raw.total_number),
            ip_location: raw
                .source
                .as_deref()
                .unwrap_or_default()
                .replace("来自", ""),
            last_modify_ts: crawled_at,
        }
    }
}

/// One page of comments (or one comment's replies) for a note
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentBatch {
    pub note_id: String,
    pub comments: Vec<Comment>,
}

impl CommentBatch {
    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}
