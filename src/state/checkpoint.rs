use crate::model::Mblog;

/// Look-back window used for creators that have never been harvested (seconds)
pub const DEFAULT_LOOKBACK_SECS: i64 = 60 * 60;

/// How a timeline entry relates to the creator's checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub pinned: bool,
    pub fresh: bool,
}

impl Classification {
    /// Pinned and fresh entries are stored; anything else ends the scan
    pub fn keep(&self) -> bool {
        self.pinned || self.fresh
    }
}

/// Per-creator watermark deciding which entries are new
#[derive(Debug, Clone)]
pub struct CheckpointGate {
    owner_id: String,
    watermark: i64,
}

impl CheckpointGate {
    /// Creates a gate from the stored checkpoint
    ///
    /// A missing or zero checkpoint falls back to `now - DEFAULT_LOOKBACK_SECS`.
    pub fn new(owner_id: &str, stored: Option<i64>, now: i64) -> Self {
        let watermark = stored
            .filter(|ts| *ts > 0)
            .unwrap_or(now - DEFAULT_LOOKBACK_SECS);

        Self {
            owner_id: owner_id.to_string(),
            watermark,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    /// Classifies one entry; entries without a readable timestamp are never fresh
    pub fn classify(&self, mblog: &Mblog) -> Classification {
        Classification {
            pinned: mblog.is_pinned(),
            fresh: mblog
                .published_at()
                .map(|ts| ts > self.watermark)
                .unwrap_or(false),
        }
    }
}
