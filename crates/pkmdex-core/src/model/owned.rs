use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{CardId, Category, Language, Variant};

/// One (card, variant, language) the user owns. `quantity` is always >= 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedEntry {
    pub card_id: CardId,
    pub variant: Variant,
    pub language: Language,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of removing copies of an owned entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The row reached zero and was deleted.
    Removed,
    /// The row survives with this quantity.
    Remaining(u32),
}

/// Conjunctive filter for listing owned cards. `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedFilter {
    pub language: Option<Language>,
    pub set_id: Option<String>,
}

impl OwnedFilter {
    #[must_use]
    pub fn language(language: Language) -> Self {
        Self {
            language: Some(language),
            set_id: None,
        }
    }

    #[must_use]
    pub fn set(set_id: impl Into<String>) -> Self {
        Self {
            language: None,
            set_id: Some(set_id.into()),
        }
    }
}

/// An owned entry joined with the display fields of its card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnedCardView {
    pub entry: OwnedEntry,
    pub set_id: String,
    pub card_number: String,
    /// Name in the entry's language, or the English name when no
    /// localized name is stored.
    pub display_name: String,
    pub english_name: String,
    pub rarity: Option<String>,
    pub category: Category,
    pub image_url: Option<String>,
    pub price_eur: Option<f64>,
}
