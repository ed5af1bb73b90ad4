//! Filtering and summarising the owned collection by card attributes.
//!
//! Every predicate runs against the English canonical data, so a filter
//! such as `--type Fire` matches the same cards whichever language they
//! were collected in.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::{CanonicalCard, Category, Language, Variant};
use crate::schema::Database;

/// Conjunctive filter; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisFilter {
    pub stage: Option<String>,
    pub card_type: Option<String>,
    pub rarity: Option<String>,
    pub hp_min: Option<u32>,
    pub hp_max: Option<u32>,
    pub category: Option<Category>,
    pub language: Option<Language>,
    pub set_id: Option<String>,
    pub regulation_mark: Option<String>,
    /// Case-insensitive substring of the illustrator.
    pub artist: Option<String>,
    /// Case-insensitive substring of the English or any localized name.
    pub name: Option<String>,
}

/// One owned `(card, language)` pair with its variants rolled up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzedCard {
    pub card: CanonicalCard,
    pub language: Language,
    pub display_name: String,
    pub quantity: u32,
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisStats {
    pub total_cards: usize,
    pub total_quantity: u64,
    pub by_stage: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub by_rarity: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub by_set: BTreeMap<String, usize>,
    pub average_hp: Option<f64>,
}

fn eq_ignore_case(expected: Option<&String>, actual: Option<&String>) -> bool {
    match (expected, actual) {
        (None, _) => true,
        (Some(expected), Some(actual)) => expected.eq_ignore_ascii_case(actual),
        (Some(_), None) => false,
    }
}

impl AnalysisFilter {
    /// Test the card-level predicates (everything but language and name).
    pub fn matches_card(&self, card: &CanonicalCard) -> bool {
        if let Some(set_id) = &self.set_id {
            if !set_id.eq_ignore_ascii_case(&card.set_id) {
                return false;
            }
        }
        if !eq_ignore_case(self.stage.as_ref(), card.stage.as_ref())
            || !eq_ignore_case(self.rarity.as_ref(), card.rarity.as_ref())
            || !eq_ignore_case(
                self.regulation_mark.as_ref(),
                card.regulation_mark.as_ref(),
            )
        {
            return false;
        }
        if let Some(card_type) = &self.card_type {
            if !card.types.iter().any(|t| t.eq_ignore_ascii_case(card_type)) {
                return false;
            }
        }
        if let Some(min) = self.hp_min {
            if card.hp.is_none_or(|hp| hp < min) {
                return false;
            }
        }
        if let Some(max) = self.hp_max {
            if card.hp.is_none_or(|hp| hp > max) {
                return false;
            }
        }
        if let Some(category) = self.category {
            if card.category != category {
                return false;
            }
        }
        if let Some(artist) = &self.artist {
            let artist = artist.to_lowercase();
            if !card
                .illustrator
                .as_ref()
                .is_some_and(|i| i.to_lowercase().contains(&artist))
            {
                return false;
            }
        }
        true
    }
}

impl Database {
    /// Owned cards matching `filter`, grouped per `(card, language)`.
    pub fn analyze(&self, filter: &AnalysisFilter) -> Result<Vec<AnalyzedCard>> {
        let mut stmt = self.conn().prepare(
            "SELECT o.card_id, o.language, o.variant, o.quantity
             FROM owned_cards o
             WHERE ?1 IS NULL OR o.language = ?1
             ORDER BY o.card_id, o.language, o.variant",
        )?;
        let rows: Vec<(String, String, String, u32)> = stmt
            .query_map([filter.language.map(Language::code)], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let needle = filter.name.as_ref().map(|n| n.to_lowercase());
        let mut results: Vec<AnalyzedCard> = Vec::new();

        for (card_id, language, variant, quantity) in rows {
            let language: Language = language.parse()?;
            let variant: Variant = variant.parse()?;

            if let Some(last) = results.last_mut() {
                if last.card.card_id.as_str() == card_id && last.language == language {
                    last.quantity += quantity;
                    last.variants.push(variant);
                    continue;
                }
            }

            let card_id = card_id.parse()?;
            let Some(card) = self.get_canonical_card(&card_id)? else {
                continue;
            };
            if !filter.matches_card(&card) {
                continue;
            }

            let names = self.localized_names(&card_id)?;
            if let Some(needle) = &needle {
                let hit = card.name.to_lowercase().contains(needle)
                    || names.iter().any(|n| n.name.to_lowercase().contains(needle));
                if !hit {
                    continue;
                }
            }

            let display_name = names
                .iter()
                .find(|n| n.language == language)
                .map_or_else(|| card.name.clone(), |n| n.name.clone());

            results.push(AnalyzedCard {
                card,
                language,
                display_name,
                quantity,
                variants: vec![variant],
            });
        }

        Ok(results)
    }
}

/// Aggregate counts over an analysis result.
pub fn analysis_stats(cards: &[AnalyzedCard]) -> AnalysisStats {
    let mut stats = AnalysisStats {
        total_cards: cards.len(),
        total_quantity: cards.iter().map(|c| u64::from(c.quantity)).sum(),
        ..AnalysisStats::default()
    };

    let mut hp_total = 0u64;
    let mut hp_count = 0u32;
    for analyzed in cards {
        let card = &analyzed.card;
        if let Some(stage) = &card.stage {
            *stats.by_stage.entry(stage.clone()).or_default() += 1;
        }
        for card_type in &card.types {
            *stats.by_type.entry(card_type.clone()).or_default() += 1;
        }
        if let Some(rarity) = &card.rarity {
            *stats.by_rarity.entry(rarity.clone()).or_default() += 1;
        }
        *stats
            .by_category
            .entry(card.category.to_string())
            .or_default() += 1;
        *stats.by_set.entry(card.set_id.clone()).or_default() += 1;
        if let Some(hp) = card.hp {
            hp_total += u64::from(hp);
            hp_count += 1;
        }
    }
    if hp_count > 0 {
        #[allow(clippy::cast_precision_loss)]
        let average = hp_total as f64 / f64::from(hp_count);
        stats.average_hp = Some(average);
    }
    stats
}
