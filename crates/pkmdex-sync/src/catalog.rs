//! The card catalog seam and its validated card type.
//!
//! Anything that can answer "give me card X in language L" implements
//! [`CardCatalog`]. The HTTP implementation lives in [`crate::tcgdex`];
//! tests substitute an in-memory stub.
//!
//! Responses (and the flat JSON documents written by pkmdex 1.x, which use
//! the same shape) are deserialized into [`RawCard`] and then validated into
//! a [`CatalogCard`]. A card that fails validation is never written.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use pkmdex_core::model::{
    CanonicalCard, CardId, CardVariants, Category, Language, LocalizedName, SetInfo,
};

use crate::error::{SyncError, SyncResult};

/// Source of card and set metadata.
#[async_trait]
pub trait CardCatalog: Send + Sync {
    /// Fetch one card in one language.
    ///
    /// # Errors
    /// `SyncError::NotFound` when the catalog has no such card, a
    /// validation error for incomplete data, or a transport error.
    async fn fetch_card(&self, language: Language, card_id: &CardId) -> SyncResult<CatalogCard>;

    /// Summaries of every set.
    async fn list_sets(&self, language: Language) -> SyncResult<Vec<SetInfo>>;

    /// Full details of one set.
    async fn fetch_set(&self, language: Language, set_id: &str) -> SyncResult<SetInfo>;
}

/// A complete, validated card as reported by the catalog in one language.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogCard {
    pub card_id: CardId,
    pub language: Language,
    pub name: String,
    pub category: Category,
    pub rarity: Option<String>,
    pub types: Vec<String>,
    pub hp: Option<u32>,
    pub stage: Option<String>,
    pub illustrator: Option<String>,
    pub regulation_mark: Option<String>,
    pub image_url: Option<String>,
    pub variants: CardVariants,
    pub price_eur: Option<f64>,
    pub price_usd: Option<f64>,
    pub legal_standard: bool,
    pub legal_expanded: bool,
}

impl CatalogCard {
    /// Parse and validate a card document.
    ///
    /// `source_name` only labels errors. When `expected` is given, a
    /// document describing a different card is rejected.
    pub fn from_json(
        source_name: &str,
        json: &str,
        language: Language,
        expected: Option<&CardId>,
    ) -> SyncResult<Self> {
        let raw: RawCard = serde_json::from_str(json).map_err(|e| SyncError::Parse {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;
        raw.validate(language, expected)
    }

    /// The canonical row for this card. Only meaningful for English data.
    #[must_use]
    pub fn into_canonical(self, synced_at: DateTime<Utc>) -> CanonicalCard {
        CanonicalCard {
            set_id: self.card_id.set_id().to_string(),
            card_number: self.card_id.card_number().to_string(),
            card_id: self.card_id,
            name: self.name,
            rarity: self.rarity,
            types: self.types,
            hp: self.hp,
            stage: self.stage,
            category: self.category,
            illustrator: self.illustrator,
            regulation_mark: self.regulation_mark,
            image_url: self.image_url,
            variants: self.variants,
            price_eur: self.price_eur,
            price_usd: self.price_usd,
            legal_standard: self.legal_standard,
            legal_expanded: self.legal_expanded,
            last_synced: synced_at,
        }
    }

    #[must_use]
    pub fn localized_name(&self) -> LocalizedName {
        LocalizedName::new(self.card_id.clone(), self.language, self.name.clone())
    }
}

/// Card JSON as served by TCGdex. Everything is optional here; required
/// fields are enforced by [`RawCard::validate`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCard {
    pub id: Option<String>,
    pub local_id: Option<serde_json::Value>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub rarity: Option<String>,
    #[serde(default)]
    pub types: Option<Vec<String>>,
    pub hp: Option<serde_json::Value>,
    pub stage: Option<String>,
    pub illustrator: Option<String>,
    pub regulation_mark: Option<String>,
    pub image: Option<String>,
    pub variants: Option<CardVariants>,
    pub legal: Option<RawLegal>,
    pub pricing: Option<RawPricing>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawLegal {
    #[serde(default)]
    pub standard: bool,
    #[serde(default)]
    pub expanded: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawPricing {
    pub cardmarket: Option<RawCardmarket>,
    pub tcgplayer: Option<RawTcgplayer>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawCardmarket {
    pub trend: Option<f64>,
    pub avg: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawTcgplayer {
    pub normal: Option<RawTcgplayerPrice>,
    pub holofoil: Option<RawTcgplayerPrice>,
    #[serde(rename = "reverse-holofoil")]
    pub reverse_holofoil: Option<RawTcgplayerPrice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTcgplayerPrice {
    pub market_price: Option<f64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Append the high-quality PNG suffix to bare TCGdex asset URLs.
pub fn image_url_with_quality(url: &str) -> String {
    let lower = url.to_lowercase();
    if [".png", ".jpg", ".webp"].iter().any(|ext| lower.ends_with(ext)) {
        url.to_string()
    } else {
        format!("{}/high.png", url.trim_end_matches('/'))
    }
}

fn parse_hp(value: Option<serde_json::Value>) -> Option<u32> {
    match value? {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl RawCard {
    /// Check required fields and build a [`CatalogCard`].
    pub fn validate(self, language: Language, expected: Option<&CardId>) -> SyncResult<CatalogCard> {
        let label = expected.map_or_else(|| "<unknown>".to_string(), ToString::to_string);
        let invalid = |reason: String| SyncError::Validation {
            card_id: label.clone(),
            reason,
        };

        let id = non_empty(self.id).ok_or_else(|| invalid("missing id".to_string()))?;
        let card_id = CardId::parse(&id).map_err(|e| invalid(e.to_string()))?;
        if let Some(expected) = expected {
            if &card_id != expected {
                return Err(invalid(format!("document describes {card_id}")));
            }
        }

        let name = non_empty(self.name).ok_or_else(|| invalid("missing name".to_string()))?;
        let category = non_empty(self.category)
            .ok_or_else(|| invalid("missing category".to_string()))?
            .parse::<Category>()
            .map_err(|e| invalid(e.to_string()))?;

        let legal = self.legal.unwrap_or_default();
        let pricing = self.pricing.unwrap_or_default();
        let price_eur = pricing
            .cardmarket
            .and_then(|cm| cm.trend.or(cm.avg));
        let price_usd = pricing.tcgplayer.and_then(|tp| {
            [tp.normal, tp.holofoil, tp.reverse_holofoil]
                .into_iter()
                .flatten()
                .find_map(|p| p.market_price)
        });

        Ok(CatalogCard {
            card_id,
            language,
            name,
            category,
            rarity: non_empty(self.rarity),
            types: self.types.unwrap_or_default(),
            hp: parse_hp(self.hp),
            stage: non_empty(self.stage),
            illustrator: non_empty(self.illustrator),
            regulation_mark: non_empty(self.regulation_mark),
            image_url: non_empty(self.image).map(|url| image_url_with_quality(&url)),
            variants: self.variants.unwrap_or_default(),
            price_eur,
            price_usd,
            legal_standard: legal.standard,
            legal_expanded: legal.expanded,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// A catalog card document in TCGdex shape.
    pub fn card_json(id: &str, name: &str) -> String {
        serde_json::json!({
            "id": id,
            "localId": id.split_once('-').map_or("", |(_, n)| n),
            "name": name,
            "category": "Pokemon",
            "rarity": "Common",
            "types": ["Grass"],
            "hp": 70,
            "stage": "Basic",
            "illustrator": "Ken Sugimori",
            "regulationMark": "I",
            "image": format!("https://assets.tcgdex.net/en/me/me01/{id}"),
            "variants": {"normal": true, "reverse": true, "holo": false, "firstEdition": false},
            "legal": {"standard": true, "expanded": true},
            "pricing": {
                "cardmarket": {"trend": 0.25, "avg": 0.2},
                "tcgplayer": {"normal": {"marketPrice": 0.31}}
            }
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> CardId {
        CardId::parse(s).unwrap()
    }

    #[test]
    fn test_parse_complete_card() {
        let json = fixtures::card_json("me01-136", "Bulbasaur");
        let card =
            CatalogCard::from_json("tcgdex", &json, Language::English, Some(&id("me01-136")))
                .unwrap();
        assert_eq!(card.name, "Bulbasaur");
        assert_eq!(card.category, Category::Pokemon);
        assert_eq!(card.hp, Some(70));
        assert_eq!(card.price_eur, Some(0.25));
        assert_eq!(card.price_usd, Some(0.31));
        assert!(card.legal_standard);
        assert!(card.variants.reverse);
        assert_eq!(
            card.image_url.as_deref(),
            Some("https://assets.tcgdex.net/en/me/me01/me01-136/high.png")
        );
    }

    #[test]
    fn test_missing_required_fields_fail_validation() {
        for json in [
            r#"{"name": "Bulbasaur", "category": "Pokemon"}"#,
            r#"{"id": "me01-136", "category": "Pokemon"}"#,
            r#"{"id": "me01-136", "name": "Bulbasaur"}"#,
            r#"{"id": "me01-136", "name": "Bulbasaur", "category": "Stadium"}"#,
        ] {
            let err = CatalogCard::from_json("tcgdex", json, Language::English, None).unwrap_err();
            assert!(matches!(err, SyncError::Validation { .. }), "{json}");
        }
    }

    #[test]
    fn test_mismatched_id_is_rejected() {
        let json = fixtures::card_json("me01-137", "Ivysaur");
        let err = CatalogCard::from_json("tcgdex", &json, Language::English, Some(&id("me01-136")))
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation { .. }));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = CatalogCard::from_json("tcgdex", "{not json", Language::English, None).unwrap_err();
        assert!(matches!(err, SyncError::Parse { .. }));
    }

    #[test]
    fn test_price_fallbacks() {
        let json = r#"{
            "id": "sv01-1", "name": "X", "category": "Trainer", "hp": "120",
            "pricing": {
                "cardmarket": {"avg": 1.5},
                "tcgplayer": {"reverse-holofoil": {"marketPrice": 2.0}}
            }
        }"#;
        let card = CatalogCard::from_json("tcgdex", json, Language::English, None).unwrap();
        assert_eq!(card.price_eur, Some(1.5));
        assert_eq!(card.price_usd, Some(2.0));
        assert_eq!(card.hp, Some(120));
        assert!(card.variants.is_unknown());
    }

    #[test]
    fn test_image_suffix() {
        assert_eq!(
            image_url_with_quality("https://assets.tcgdex.net/de/me/me01/136"),
            "https://assets.tcgdex.net/de/me/me01/136/high.png"
        );
        assert_eq!(
            image_url_with_quality("https://example.com/card.webp"),
            "https://example.com/card.webp"
        );
    }

    #[test]
    fn test_into_canonical() {
        let json = fixtures::card_json("me01-136", "Bulbasaur");
        let card = CatalogCard::from_json("tcgdex", &json, Language::English, None).unwrap();
        let now = Utc::now();
        let canonical = card.into_canonical(now);
        assert_eq!(canonical.set_id, "me01");
        assert_eq!(canonical.card_number, "136");
        assert_eq!(canonical.last_synced, now);
    }
}
