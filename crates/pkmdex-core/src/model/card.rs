use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::model::{CardId, CardVariants, Language};

/// Top-level card category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Pokemon,
    Trainer,
    Energy,
}

impl Category {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pokemon => "Pokemon",
            Self::Trainer => "Trainer",
            Self::Energy => "Energy",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // The catalog spells it "Pokemon", older dumps sometimes "Pokémon".
        match s.trim().to_lowercase().as_str() {
            "pokemon" | "pokémon" => Ok(Self::Pokemon),
            "trainer" => Ok(Self::Trainer),
            "energy" => Ok(Self::Energy),
            other => Err(Error::Input(format!(
                "invalid category: {other} (expected Pokemon, Trainer or Energy)"
            ))),
        }
    }
}

/// The English, language-independent facts about a card.
///
/// Every descriptive field is stored in English regardless of which
/// language the user owns, so filters behave the same for every language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalCard {
    pub card_id: CardId,
    pub set_id: String,
    pub card_number: String,
    pub name: String,
    pub rarity: Option<String>,
    /// Energy types in catalog order.
    #[serde(default)]
    pub types: Vec<String>,
    pub hp: Option<u32>,
    pub stage: Option<String>,
    pub category: Category,
    pub illustrator: Option<String>,
    pub regulation_mark: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub variants: CardVariants,
    pub price_eur: Option<f64>,
    pub price_usd: Option<f64>,
    pub legal_standard: bool,
    pub legal_expanded: bool,
    pub last_synced: DateTime<Utc>,
}

impl CanonicalCard {
    /// Whether this row was synced longer ago than `max_age`.
    #[must_use]
    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_synced > max_age
    }
}

/// A card's display name in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedName {
    pub card_id: CardId,
    pub language: Language,
    pub name: String,
}

impl LocalizedName {
    #[must_use]
    pub fn new(card_id: CardId, language: Language, name: impl Into<String>) -> Self {
        Self {
            card_id,
            language,
            name: name.into(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A fully populated English card for store tests.
    pub fn canonical(id: &str, name: &str) -> CanonicalCard {
        let card_id = CardId::parse(id).unwrap();
        CanonicalCard {
            set_id: card_id.set_id().to_string(),
            card_number: card_id.card_number().to_string(),
            card_id,
            name: name.to_string(),
            rarity: Some("Common".to_string()),
            types: vec!["Grass".to_string()],
            hp: Some(70),
            stage: Some("Basic".to_string()),
            category: Category::Pokemon,
            illustrator: Some("Ken Sugimori".to_string()),
            regulation_mark: Some("I".to_string()),
            image_url: Some(format!("https://assets.tcgdex.net/en/me/{id}/high.png")),
            variants: CardVariants {
                normal: true,
                reverse: true,
                holo: false,
                first_edition: false,
            },
            price_eur: Some(0.25),
            price_usd: Some(0.31),
            legal_standard: true,
            legal_expanded: true,
            last_synced: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!("Pokemon".parse::<Category>().unwrap(), Category::Pokemon);
        assert_eq!("Pokémon".parse::<Category>().unwrap(), Category::Pokemon);
        assert_eq!("trainer".parse::<Category>().unwrap(), Category::Trainer);
        assert!("Stadium".parse::<Category>().is_err());
    }

    #[test]
    fn test_is_stale() {
        let now = Utc::now();
        let mut card = fixtures::canonical("me01-136", "Bulbasaur");
        card.last_synced = now - Duration::days(8);
        assert!(card.is_stale(Duration::days(7), now));
        assert!(!card.is_stale(Duration::days(10), now));
    }
}
