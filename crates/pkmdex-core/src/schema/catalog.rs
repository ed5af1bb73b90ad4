use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::model::{CanonicalCard, CardId, Language, LocalizedName, OwnedEntry, SetCacheStats, SetInfo};

use super::db::{
    format_timestamp, json_column, optional_timestamp_column, parsed_column, timestamp_column,
    Database,
};
use super::ownership::insert_owned_row;

const CARD_COLUMNS: &str = "card_id, set_id, card_number, name, rarity, types, hp, stage,
    category, illustrator, regulation_mark, image_url, variants, price_eur, price_usd,
    legal_standard, legal_expanded, last_synced";

/// An owned card whose canonical data needs refreshing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleCard {
    pub card_id: CardId,
    /// `None` when no canonical row exists yet.
    pub last_synced: Option<DateTime<Utc>>,
    /// Every language the card is owned in.
    pub languages: Vec<Language>,
}

// Canonical card CRUD
impl Database {
    /// Insert or fully replace a canonical card.
    pub fn upsert_canonical_card(&self, card: &CanonicalCard) -> Result<()> {
        upsert_card_row(self.conn(), card)
    }

    pub fn get_canonical_card(&self, card_id: &CardId) -> Result<Option<CanonicalCard>> {
        let card = self
            .conn()
            .query_row(
                &format!("SELECT {CARD_COLUMNS} FROM cards WHERE card_id = ?1"),
                [card_id.as_str()],
                row_to_canonical_card,
            )
            .optional()?;
        Ok(card)
    }

    /// Every canonical card, ordered by id.
    pub fn all_canonical_cards(&self) -> Result<Vec<CanonicalCard>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {CARD_COLUMNS} FROM cards ORDER BY card_id"))?;
        let cards = stmt
            .query_map([], row_to_canonical_card)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    /// Delete a card together with its names and ownership rows.
    /// Returns false when there was nothing to delete.
    pub fn delete_canonical_card(&self, card_id: &CardId) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM cards WHERE card_id = ?1", [card_id.as_str()])?;
        Ok(deleted > 0)
    }

    /// Write a card, its names and (optionally) ownership rows atomically.
    pub fn save_card_bundle(
        &self,
        card: &CanonicalCard,
        names: &[LocalizedName],
        owned: &[OwnedEntry],
    ) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        upsert_card_row(&tx, card)?;
        for name in names {
            upsert_name_row(&tx, name)?;
        }
        for entry in owned {
            insert_owned_row(&tx, entry)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Owned cards whose canonical row is missing or was synced before
    /// `cutoff`. `None` selects every owned card. Oldest first, missing
    /// rows before everything else.
    pub fn stale_owned_cards(&self, cutoff: Option<DateTime<Utc>>) -> Result<Vec<StaleCard>> {
        let cutoff = cutoff.map(|ts| format_timestamp(&ts));
        let mut stmt = self.conn().prepare(
            "SELECT o.card_id, c.last_synced, GROUP_CONCAT(DISTINCT o.language)
             FROM owned_cards o
             LEFT JOIN cards c ON c.card_id = o.card_id
             WHERE ?1 IS NULL OR c.last_synced IS NULL OR c.last_synced < ?1
             GROUP BY o.card_id
             ORDER BY c.last_synced IS NOT NULL, c.last_synced, o.card_id",
        )?;
        let stale = stmt
            .query_map([cutoff], |row| {
                let languages: String = row.get(2)?;
                let mut languages = languages
                    .split(',')
                    .map(str::parse::<Language>)
                    .collect::<Result<Vec<_>>>()
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            2,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                languages.sort();
                Ok(StaleCard {
                    card_id: parsed_column(row, 0)?,
                    last_synced: optional_timestamp_column(row, 1)?,
                    languages,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stale)
    }
}

// Localized name CRUD
impl Database {
    pub fn upsert_localized_name(&self, name: &LocalizedName) -> Result<()> {
        upsert_name_row(self.conn(), name)
    }

    pub fn get_localized_name(&self, card_id: &CardId, language: Language) -> Result<Option<String>> {
        let name = self
            .conn()
            .query_row(
                "SELECT name FROM card_names WHERE card_id = ?1 AND language = ?2",
                params![card_id.as_str(), language.code()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }

    /// All stored names for one card, by language code.
    pub fn localized_names(&self, card_id: &CardId) -> Result<Vec<LocalizedName>> {
        let mut stmt = self.conn().prepare(
            "SELECT card_id, language, name FROM card_names
             WHERE card_id = ?1 ORDER BY language",
        )?;
        let names = stmt
            .query_map([card_id.as_str()], row_to_localized_name)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    pub fn all_localized_names(&self) -> Result<Vec<LocalizedName>> {
        let mut stmt = self.conn().prepare(
            "SELECT card_id, language, name FROM card_names ORDER BY card_id, language",
        )?;
        let names = stmt
            .query_map([], row_to_localized_name)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }
}

// Set cache CRUD
impl Database {
    /// Insert or replace cached set summaries.
    pub fn cache_sets(&self, sets: &[SetInfo]) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        for set in sets {
            tx.execute(
                "INSERT OR REPLACE INTO set_cache
                 (set_id, name, card_count, release_date, serie_id, serie_name, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    set.set_id,
                    set.name,
                    set.card_count,
                    set.release_date,
                    set.serie_id,
                    set.serie_name,
                    format_timestamp(&set.cached_at)
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Cached sets whose name or id contains `query` (case-insensitive).
    pub fn search_sets(&self, query: Option<&str>) -> Result<Vec<SetInfo>> {
        let pattern = query.map(|q| format!("%{}%", q.to_lowercase()));
        let mut stmt = self.conn().prepare(
            "SELECT set_id, name, card_count, release_date, serie_id, serie_name, cached_at
             FROM set_cache
             WHERE ?1 IS NULL OR LOWER(name) LIKE ?1 OR LOWER(set_id) LIKE ?1
             ORDER BY set_id",
        )?;
        let sets = stmt
            .query_map([pattern], |row| {
                Ok(SetInfo {
                    set_id: row.get(0)?,
                    name: row.get(1)?,
                    card_count: row.get(2)?,
                    release_date: row.get(3)?,
                    serie_id: row.get(4)?,
                    serie_name: row.get(5)?,
                    cached_at: timestamp_column(row, 6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sets)
    }

    /// When the oldest cached set was stored; `None` for an empty cache.
    pub fn set_cache_age(&self) -> Result<Option<DateTime<Utc>>> {
        let oldest = self
            .conn()
            .query_row("SELECT MIN(cached_at) FROM set_cache", [], |row| {
                optional_timestamp_column(row, 0)
            })?;
        Ok(oldest)
    }

    pub fn set_cache_stats(&self) -> Result<SetCacheStats> {
        let stats = self.conn().query_row(
            "SELECT COUNT(*), MIN(cached_at), MAX(cached_at) FROM set_cache",
            [],
            |row| {
                Ok(SetCacheStats {
                    count: row.get::<_, i64>(0)?.unsigned_abs(),
                    oldest: optional_timestamp_column(row, 1)?,
                    newest: optional_timestamp_column(row, 2)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Empty the set cache, returning how many sets were dropped.
    pub fn clear_set_cache(&self) -> Result<usize> {
        Ok(self.conn().execute("DELETE FROM set_cache", [])?)
    }
}

pub(crate) fn upsert_card_row(conn: &Connection, card: &CanonicalCard) -> Result<()> {
    conn.execute(
        "INSERT INTO cards (
            card_id, set_id, card_number, name, rarity, types, hp, stage,
            category, illustrator, regulation_mark, image_url, variants,
            price_eur, price_usd, legal_standard, legal_expanded, last_synced
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        ON CONFLICT (card_id) DO UPDATE SET
            set_id = excluded.set_id, card_number = excluded.card_number,
            name = excluded.name, rarity = excluded.rarity, types = excluded.types,
            hp = excluded.hp, stage = excluded.stage, category = excluded.category,
            illustrator = excluded.illustrator, regulation_mark = excluded.regulation_mark,
            image_url = excluded.image_url, variants = excluded.variants,
            price_eur = excluded.price_eur, price_usd = excluded.price_usd,
            legal_standard = excluded.legal_standard, legal_expanded = excluded.legal_expanded,
            last_synced = excluded.last_synced",
        params![
            card.card_id.as_str(),
            card.set_id,
            card.card_number,
            card.name,
            card.rarity,
            serde_json::to_string(&card.types)?,
            card.hp,
            card.stage,
            card.category.as_str(),
            card.illustrator,
            card.regulation_mark,
            card.image_url,
            serde_json::to_string(&card.variants)?,
            card.price_eur,
            card.price_usd,
            card.legal_standard,
            card.legal_expanded,
            format_timestamp(&card.last_synced)
        ],
    )?;
    Ok(())
}

pub(crate) fn upsert_name_row(conn: &Connection, name: &LocalizedName) -> Result<()> {
    conn.execute(
        "INSERT INTO card_names (card_id, language, name) VALUES (?1, ?2, ?3)
         ON CONFLICT (card_id, language) DO UPDATE SET name = excluded.name",
        params![name.card_id.as_str(), name.language.code(), name.name],
    )?;
    Ok(())
}

fn row_to_canonical_card(row: &Row) -> rusqlite::Result<CanonicalCard> {
    Ok(CanonicalCard {
        card_id: parsed_column(row, 0)?,
        set_id: row.get(1)?,
        card_number: row.get(2)?,
        name: row.get(3)?,
        rarity: row.get(4)?,
        types: json_column(row, 5)?,
        hp: row.get(6)?,
        stage: row.get(7)?,
        category: parsed_column(row, 8)?,
        illustrator: row.get(9)?,
        regulation_mark: row.get(10)?,
        image_url: row.get(11)?,
        variants: json_column(row, 12)?,
        price_eur: row.get(13)?,
        price_usd: row.get(14)?,
        legal_standard: row.get(15)?,
        legal_expanded: row.get(16)?,
        last_synced: timestamp_column(row, 17)?,
    })
}

fn row_to_localized_name(row: &Row) -> rusqlite::Result<LocalizedName> {
    Ok(LocalizedName {
        card_id: parsed_column(row, 0)?,
        language: parsed_column(row, 1)?,
        name: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::card::fixtures::canonical;
    use crate::model::Variant;
    use chrono::Duration;

    #[test]
    fn test_canonical_card_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let card = canonical("me01-136", "Bulbasaur");
        db.upsert_canonical_card(&card).unwrap();

        let loaded = db.get_canonical_card(&card.card_id).unwrap().unwrap();
        assert_eq!(loaded.name, "Bulbasaur");
        assert_eq!(loaded.types, vec!["Grass".to_string()]);
        assert!(loaded.variants.reverse);
        assert_eq!(
            format_timestamp(&loaded.last_synced),
            format_timestamp(&card.last_synced)
        );
    }

    #[test]
    fn test_upsert_replaces_all_fields() {
        let db = Database::open_in_memory().unwrap();
        let mut card = canonical("me01-136", "Bulbasaur");
        db.upsert_canonical_card(&card).unwrap();

        card.price_eur = None;
        card.legal_standard = false;
        card.types = vec!["Grass".to_string(), "Psychic".to_string()];
        db.upsert_canonical_card(&card).unwrap();

        let loaded = db.get_canonical_card(&card.card_id).unwrap().unwrap();
        assert_eq!(loaded.price_eur, None);
        assert!(!loaded.legal_standard);
        assert_eq!(loaded.types.len(), 2);
    }

    #[test]
    fn test_delete_cascades() {
        let db = Database::open_in_memory().unwrap();
        let card = canonical("me01-136", "Bulbasaur");
        db.save_card_bundle(
            &card,
            &[LocalizedName::new(card.card_id.clone(), Language::German, "Bisasam")],
            &[],
        )
        .unwrap();
        db.add_variant(&card.card_id, Variant::Normal, Language::German, 2)
            .unwrap();

        assert!(db.delete_canonical_card(&card.card_id).unwrap());
        assert!(db.all_localized_names().unwrap().is_empty());
        assert!(db.all_owned_entries().unwrap().is_empty());
        assert!(!db.delete_canonical_card(&card.card_id).unwrap());
    }

    #[test]
    fn test_localized_names() {
        let db = Database::open_in_memory().unwrap();
        let card = canonical("me01-136", "Bulbasaur");
        db.upsert_canonical_card(&card).unwrap();
        let id = card.card_id;

        db.upsert_localized_name(&LocalizedName::new(id.clone(), Language::German, "Bisasam"))
            .unwrap();
        db.upsert_localized_name(&LocalizedName::new(id.clone(), Language::German, "Bisasam!"))
            .unwrap();

        assert_eq!(
            db.get_localized_name(&id, Language::German).unwrap().as_deref(),
            Some("Bisasam!")
        );
        assert_eq!(db.get_localized_name(&id, Language::French).unwrap(), None);
        assert_eq!(db.localized_names(&id).unwrap().len(), 1);
    }

    #[test]
    fn test_name_requires_card() {
        let db = Database::open_in_memory().unwrap();
        let id = CardId::parse("me01-999").unwrap();
        let result = db.upsert_localized_name(&LocalizedName::new(id, Language::German, "X"));
        assert!(result.is_err());
    }

    #[test]
    fn test_stale_owned_cards_ordering() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();

        let mut old = canonical("me01-1", "Old");
        old.last_synced = now - Duration::days(30);
        let mut older = canonical("me01-2", "Older");
        older.last_synced = now - Duration::days(60);
        let fresh = canonical("me01-3", "Fresh");

        for card in [&old, &older, &fresh] {
            db.upsert_canonical_card(card).unwrap();
            db.add_variant(&card.card_id, Variant::Normal, Language::German, 1)
                .unwrap();
        }
        db.add_variant(&old.card_id, Variant::Holo, Language::French, 1)
            .unwrap();

        let stale = db
            .stale_owned_cards(Some(now - Duration::days(7)))
            .unwrap();
        let ids: Vec<_> = stale.iter().map(|s| s.card_id.as_str()).collect();
        assert_eq!(ids, ["me01-2", "me01-1"]);
        assert_eq!(stale[1].languages, vec![Language::German, Language::French]);

        assert_eq!(db.stale_owned_cards(None).unwrap().len(), 3);
    }

    #[test]
    fn test_set_cache_search() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.set_cache_age().unwrap().is_none());

        let now = Utc::now();
        let set = |id: &str, name: &str| SetInfo {
            set_id: id.to_string(),
            name: name.to_string(),
            card_count: 100,
            release_date: Some("2025-01-01".to_string()),
            serie_id: Some("me".to_string()),
            serie_name: Some("Mega Evolution".to_string()),
            cached_at: now,
        };
        db.cache_sets(&[set("me01", "Mega Evolution"), set("sv01", "Scarlet & Violet")])
            .unwrap();

        assert_eq!(db.search_sets(None).unwrap().len(), 2);
        let found = db.search_sets(Some("MEGA")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].set_id, "me01");
        assert_eq!(db.search_sets(Some("sv0")).unwrap().len(), 1);
        assert!(db.set_cache_age().unwrap().is_some());
    }

    #[test]
    fn test_set_cache_stats_and_clear() {
        let db = Database::open_in_memory().unwrap();
        let empty = db.set_cache_stats().unwrap();
        assert_eq!(empty.count, 0);
        assert!(empty.oldest.is_none() && empty.newest.is_none());

        let now = Utc::now();
        let set = |id: &str, cached_at| SetInfo {
            set_id: id.to_string(),
            name: id.to_uppercase(),
            card_count: 10,
            release_date: None,
            serie_id: None,
            serie_name: None,
            cached_at,
        };
        let old = now - Duration::days(30);
        db.cache_sets(&[set("me01", old), set("sv01", now)]).unwrap();

        let stats = db.set_cache_stats().unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.oldest, Some(old));
        assert_eq!(stats.newest, Some(now));
        assert_eq!(db.set_cache_age().unwrap(), Some(old));

        assert_eq!(db.clear_set_cache().unwrap(), 2);
        assert_eq!(db.set_cache_stats().unwrap().count, 0);
        assert!(db.search_sets(None).unwrap().is_empty());
    }
}
