use serde::Serialize;

use crate::error::Result;
use crate::model::{Language, Variant};

use super::db::{parsed_column, Database};

/// Summary numbers for `pkm stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionStats {
    /// Distinct canonical cards owned in any variant or language.
    pub unique_cards: u64,
    pub total_quantity: u64,
    pub sets_count: u64,
    /// Set with the most copies, and that count.
    pub most_collected_set: Option<(String, u64)>,
    pub by_variant: Vec<(Variant, u64)>,
    pub by_language: Vec<(Language, u64)>,
    pub by_rarity: Vec<(String, u64)>,
    pub total_value_eur: f64,
    pub total_value_usd: f64,
}

impl Database {
    pub fn collection_stats(&self) -> Result<CollectionStats> {
        let conn = self.conn();

        let (unique_cards, total_quantity, sets_count, total_value_eur, total_value_usd) = conn
            .query_row(
                "SELECT COUNT(DISTINCT o.card_id),
                        COALESCE(SUM(o.quantity), 0),
                        COUNT(DISTINCT c.set_id),
                        COALESCE(SUM(o.quantity * c.price_eur), 0.0),
                        COALESCE(SUM(o.quantity * c.price_usd), 0.0)
                 FROM owned_cards o
                 JOIN cards c ON c.card_id = o.card_id",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                    ))
                },
            )?;

        let most_collected_set = {
            let mut stmt = conn.prepare(
                "SELECT c.set_id, SUM(o.quantity) AS qty
                 FROM owned_cards o
                 JOIN cards c ON c.card_id = o.card_id
                 GROUP BY c.set_id
                 ORDER BY qty DESC, c.set_id
                 LIMIT 1",
            )?;
            let mut rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.unsigned_abs()))
            })?;
            rows.next().transpose()?
        };

        let mut stmt = conn.prepare(
            "SELECT variant, SUM(quantity) FROM owned_cards
             GROUP BY variant ORDER BY variant",
        )?;
        let by_variant = stmt
            .query_map([], |row| {
                Ok((parsed_column(row, 0)?, row.get::<_, i64>(1)?.unsigned_abs()))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT language, SUM(quantity) FROM owned_cards
             GROUP BY language ORDER BY language",
        )?;
        let by_language = stmt
            .query_map([], |row| {
                Ok((parsed_column(row, 0)?, row.get::<_, i64>(1)?.unsigned_abs()))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT c.rarity, SUM(o.quantity) AS qty
             FROM owned_cards o
             JOIN cards c ON c.card_id = o.card_id
             WHERE c.rarity IS NOT NULL
             GROUP BY c.rarity
             ORDER BY qty DESC, c.rarity",
        )?;
        let by_rarity = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.unsigned_abs()))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(CollectionStats {
            unique_cards: unique_cards.unsigned_abs(),
            total_quantity: total_quantity.unsigned_abs(),
            sets_count: sets_count.unsigned_abs(),
            most_collected_set,
            by_variant,
            by_language,
            by_rarity,
            total_value_eur,
            total_value_usd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::card::fixtures::canonical;

    #[test]
    fn test_empty_collection() {
        let db = Database::open_in_memory().unwrap();
        let stats = db.collection_stats().unwrap();
        assert_eq!(stats, CollectionStats::default());
    }

    #[test]
    fn test_stats_breakdowns() {
        let db = Database::open_in_memory().unwrap();
        let bulbasaur = canonical("me01-1", "Bulbasaur");
        let mut ivysaur = canonical("me01-2", "Ivysaur");
        ivysaur.rarity = Some("Uncommon".to_string());
        ivysaur.price_eur = Some(1.0);
        let mut pikachu = canonical("sv01-25", "Pikachu");
        pikachu.price_eur = None;
        for card in [&bulbasaur, &ivysaur, &pikachu] {
            db.upsert_canonical_card(card).unwrap();
        }

        db.add_variant(&bulbasaur.card_id, Variant::Normal, Language::German, 2)
            .unwrap();
        db.add_variant(&bulbasaur.card_id, Variant::Reverse, Language::English, 1)
            .unwrap();
        db.add_variant(&ivysaur.card_id, Variant::Normal, Language::German, 1)
            .unwrap();
        db.add_variant(&pikachu.card_id, Variant::Holo, Language::German, 1)
            .unwrap();

        let stats = db.collection_stats().unwrap();
        assert_eq!(stats.unique_cards, 3);
        assert_eq!(stats.total_quantity, 5);
        assert_eq!(stats.sets_count, 2);
        assert_eq!(stats.most_collected_set, Some(("me01".to_string(), 4)));
        assert_eq!(
            stats.by_language,
            vec![(Language::German, 4), (Language::English, 1)]
        );
        assert!(stats.by_variant.contains(&(Variant::Normal, 3)));
        assert_eq!(stats.by_rarity[0], ("Common".to_string(), 4));
        // 3 x 0.25 + 1 x 1.0
        assert!((stats.total_value_eur - 1.75).abs() < 1e-9);
    }
}
