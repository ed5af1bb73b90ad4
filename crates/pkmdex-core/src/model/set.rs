use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cached set metadata used for discovery (`pkm sets`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetInfo {
    pub set_id: String,
    pub name: String,
    pub card_count: u32,
    pub release_date: Option<String>,
    pub serie_id: Option<String>,
    pub serie_name: Option<String>,
    pub cached_at: DateTime<Utc>,
}

/// Size and age of the set cache (`pkm cache`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCacheStats {
    pub count: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}
