use super::{count_text, parse_created_at, string_or_number, strip_tags, value_to_string};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `card_type` of cards carrying a single note
pub const NOTE_CARD_TYPE: i64 = 9;

/// Title marker the platform attaches to pinned notes
pub const PINNED_MARKER: &str = "置顶";

/// Notes with more pictures than this are only complete on the detail page
const INLINE_PIC_LIMIT: u32 = 9;

/// One entry of a `cards` array
#[derive(Debug, Clone, Deserialize)]
pub struct Card {
    #[serde(default)]
    pub card_type: i64,

    #[serde(default)]
    pub mblog: Option<Mblog>,

    /// Search results nest note cards inside group cards
    #[serde(default)]
    pub card_group: Vec<Card>,
}

impl Card {
    /// Collects note cards, descending one level into card groups
    pub fn notes(cards: Vec<Card>) -> Vec<Mblog> {
        let mut notes = Vec::new();
        for card in cards {
            if card.card_type == NOTE_CARD_TYPE {
                notes.extend(card.mblog);
            } else {
                notes.extend(
                    card.card_group
                        .into_iter()
                        .filter(|c| c.card_type == NOTE_CARD_TYPE)
                        .filter_map(|c| c.mblog),
                );
            }
        }
        notes
    }
}

/// Raw note payload as the mobile API returns it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Mblog {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub created_at: String,

    #[serde(default)]
    pub title: Option<Value>,

    #[serde(default)]
    pub attitudes_count: Value,

    #[serde(default)]
    pub comments_count: Value,

    #[serde(default)]
    pub reposts_count: Value,

    #[serde(default, rename = "isLongText")]
    pub is_long_text: bool,

    #[serde(default)]
    pub pic_num: u32,

    #[serde(default)]
    pub pics: Option<Value>,

    #[serde(default)]
    pub user: Option<RawUser>,

    #[serde(default)]
    pub region_name: Option<String>,

    #[serde(default)]
    pub page_info: Option<Value>,
}

impl Mblog {
    /// Whether the platform pinned this note to the top of the timeline
    pub fn is_pinned(&self) -> bool {
        match &self.title {
            Some(Value::String(text)) => text.contains(PINNED_MARKER),
            Some(Value::Object(map)) => map
                .get("text")
                .and_then(Value::as_str)
                .map(|text| text.contains(PINNED_MARKER))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Published time in unix seconds, if the timestamp parses
    pub fn published_at(&self) -> Option<i64> {
        parse_created_at(&self.created_at)
    }

    /// Whether the listing only carries a truncated body
    pub fn is_truncated(&self) -> bool {
        self.pic_num > INLINE_PIC_LIMIT || self.is_long_text
    }

    /// Picture references in display order
    pub fn media_refs(&self) -> Vec<MediaRef> {
        let Some(Value::Array(pics)) = &self.pics else {
            return Vec::new();
        };

        pics.iter()
            .filter_map(|pic| {
                let url = pic.get("url").and_then(Value::as_str)?;
                if url.is_empty() {
                    return None;
                }
                Some(MediaRef {
                    pic_id: pic.get("pid").map(value_to_string).unwrap_or_default(),
                    url: url.to_string(),
                    local_path: String::new(),
                })
            })
            .collect()
    }
}

/// Author block embedded in notes and comments
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUser {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,

    #[serde(default)]
    pub screen_name: String,

    #[serde(default)]
    pub gender: String,

    #[serde(default)]
    pub profile_url: String,

    #[serde(default)]
    pub profile_image_url: String,
}

/// A picture attached to a note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub pic_id: String,
    pub url: String,
    /// Empty until the picture has been downloaded
    pub local_path: String,
}

/// A note ready to be stored
#[derive(Debug, Clone, Serialize)]
pub struct ContentItem {
    pub note_id: String,
    pub user_id: String,
    pub nickname: String,
    pub gender: String,
    pub profile_url: String,
    pub avatar: String,

    /// Listing body with tags stripped
    pub content: String,
    /// Detail-page body, only fetched for truncated notes
    pub full_text: Option<String>,
    pub is_long: bool,

    pub liked_count: String,
    pub comments_count: String,
    pub shared_count: String,

    pub create_time: i64,
    /// When the crawler produced this record (unix seconds)
    pub last_modify_ts: i64,

    pub ip_location: String,
    pub pics: Vec<MediaRef>,
    pub media_info: Option<Value>,
    pub pinned: bool,
    pub note_url: String,
    pub source_keyword: Option<String>,
}

impl ContentItem {
    /// Builds a record from one listing entry
    pub fn from_mblog(mblog: &Mblog, host: &str, crawled_at: i64) -> Self {
        let user = mblog.user.clone().unwrap_or_default();

        Self {
            note_id: mblog.id.clone(),
            user_id: user.id,
            nickname: user.screen_name,
            gender: user.gender,
            profile_url: user.profile_url,
            avatar: user.profile_image_url,
            content: strip_tags(&mblog.text),
            full_text: None,
            is_long: mblog.is_truncated(),
            liked_count: count_text(&mblog.attitudes_count),
            comments_count: count_text(&mblog.comments_count),
            shared_count: count_text(&mblog.reposts_count),
            create_time: mblog.published_at().unwrap_or_default(),
            last_modify_ts: crawled_at,
            ip_location: mblog
                .region_name
                .as_deref()
                .unwrap_or_default()
                .replace("发布于 ", ""),
            pics: mblog.media_refs(),
            media_info: mblog
                .page_info
                .as_ref()
                .and_then(|info| info.get("media_info"))
                .cloned(),
            pinned: mblog.is_pinned(),
            note_url: format!("{}/detail/{}", host.trim_end_matches('/'), mblog.id),
            source_keyword: None,
        }
    }

    /// Short preview of the body for log lines
    pub fn preview(&self) -> String {
        self.content.chars().take(24).collect()
    }
}
