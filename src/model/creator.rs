use super::string_or_number;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Profile details for a harvested creator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatorProfile {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,

    #[serde(default, rename = "screen_name")]
    pub nickname: String,

    #[serde(default, rename = "profile_image_url")]
    pub avatar: String,

    #[serde(default)]
    pub gender: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, rename = "follow_count", deserialize_with = "string_or_number")]
    pub follows: String,

    #[serde(default, rename = "followers_count", deserialize_with = "string_or_number")]
    pub fans: String,
}

impl CreatorProfile {
    /// Extracts the profile from a `100505{id}` container response
    pub fn from_container(data: &Value) -> Option<Self> {
        let info = data.get("userInfo")?;
        let profile: CreatorProfile = serde_json::from_value(info.clone()).ok()?;
        (!profile.id.is_empty()).then_some(profile)
    }
}
