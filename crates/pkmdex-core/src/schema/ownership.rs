use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Error, Result};
use crate::model::{
    CardId, Language, OwnedCardView, OwnedEntry, OwnedFilter, RemoveOutcome, Variant,
};

use super::db::{format_timestamp, parsed_column, timestamp_column, Database};

const OWNED_COLUMNS: &str = "o.card_id, o.variant, o.language, o.quantity, o.added_at, o.updated_at";

fn owned_key(card_id: &CardId, variant: Variant, language: Language) -> String {
    format!(
        "{}:{}:{}:{}",
        language,
        card_id.set_id(),
        card_id.card_number(),
        variant
    )
}

// Ownership CRUD
impl Database {
    /// Add `count` copies of a variant, accumulating onto any existing row.
    ///
    /// The canonical card must already be stored; the sync engine makes sure
    /// of that before the CLI calls this.
    pub fn add_variant(
        &self,
        card_id: &CardId,
        variant: Variant,
        language: Language,
        count: u32,
    ) -> Result<OwnedEntry> {
        if count == 0 {
            return Err(Error::Input("count must be at least 1".to_string()));
        }

        let tx = self.conn().unchecked_transaction()?;
        let known: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM cards WHERE card_id = ?1)",
            [card_id.as_str()],
            |row| row.get(0),
        )?;
        if !known {
            return Err(Error::not_found("card", card_id.as_str()));
        }

        let now = format_timestamp(&Utc::now());
        let entry = tx.query_row(
            "INSERT INTO owned_cards (card_id, variant, language, quantity, added_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT (card_id, variant, language)
             DO UPDATE SET quantity = quantity + excluded.quantity,
                           updated_at = excluded.updated_at
             RETURNING card_id, variant, language, quantity, added_at, updated_at",
            params![
                card_id.as_str(),
                variant.as_str(),
                language.code(),
                count,
                now
            ],
            row_to_owned_entry,
        )?;
        tx.commit()?;

        log::debug!(
            "Added {} x {} (now {})",
            count,
            owned_key(card_id, variant, language),
            entry.quantity
        );
        Ok(entry)
    }

    /// Remove `count` copies of a variant. The row is deleted once it
    /// would drop to zero or below.
    pub fn remove_variant(
        &self,
        card_id: &CardId,
        variant: Variant,
        language: Language,
        count: u32,
    ) -> Result<RemoveOutcome> {
        if count == 0 {
            return Err(Error::Input("count must be at least 1".to_string()));
        }

        let tx = self.conn().unchecked_transaction()?;
        let current: Option<u32> = tx
            .query_row(
                "SELECT quantity FROM owned_cards
                 WHERE card_id = ?1 AND variant = ?2 AND language = ?3",
                params![card_id.as_str(), variant.as_str(), language.code()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(current) = current else {
            return Err(Error::not_found(
                "owned card",
                owned_key(card_id, variant, language),
            ));
        };

        let outcome = if count >= current {
            tx.execute(
                "DELETE FROM owned_cards
                 WHERE card_id = ?1 AND variant = ?2 AND language = ?3",
                params![card_id.as_str(), variant.as_str(), language.code()],
            )?;
            RemoveOutcome::Removed
        } else {
            let remaining = current - count;
            tx.execute(
                "UPDATE owned_cards SET quantity = ?4, updated_at = ?5
                 WHERE card_id = ?1 AND variant = ?2 AND language = ?3",
                params![
                    card_id.as_str(),
                    variant.as_str(),
                    language.code(),
                    remaining,
                    format_timestamp(&Utc::now())
                ],
            )?;
            RemoveOutcome::Remaining(remaining)
        };
        tx.commit()?;
        Ok(outcome)
    }

    /// Delete every variant owned for `(card_id, language)`. Returns how
    /// many rows went away; zero is not an error.
    pub fn remove_all_variants(&self, card_id: &CardId, language: Language) -> Result<usize> {
        let deleted = self.conn().execute(
            "DELETE FROM owned_cards WHERE card_id = ?1 AND language = ?2",
            params![card_id.as_str(), language.code()],
        )?;
        Ok(deleted)
    }

    /// Owned rows joined with their card, optionally filtered.
    ///
    /// The display name is the localized name for the row's language when
    /// one is stored, otherwise the English name.
    pub fn list_owned(&self, filter: &OwnedFilter) -> Result<Vec<OwnedCardView>> {
        let sql = format!(
            "SELECT {OWNED_COLUMNS},
                    c.set_id, c.card_number, COALESCE(n.name, c.name), c.name,
                    c.rarity, c.category, c.image_url, c.price_eur
             FROM owned_cards o
             JOIN cards c ON c.card_id = o.card_id
             LEFT JOIN card_names n ON n.card_id = o.card_id AND n.language = o.language
             WHERE (?1 IS NULL OR o.language = ?1)
               AND (?2 IS NULL OR c.set_id = ?2)
             ORDER BY c.set_id, CAST(c.card_number AS INTEGER), c.card_number,
                      o.variant, o.language"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let views = stmt
            .query_map(
                params![
                    filter.language.map(Language::code),
                    filter.set_id.as_deref()
                ],
                |row| {
                    Ok(OwnedCardView {
                        entry: row_to_owned_entry(row)?,
                        set_id: row.get(6)?,
                        card_number: row.get(7)?,
                        display_name: row.get(8)?,
                        english_name: row.get(9)?,
                        rarity: row.get(10)?,
                        category: parsed_column(row, 11)?,
                        image_url: row.get(12)?,
                        price_eur: row.get(13)?,
                    })
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(views)
    }

    /// Distinct `(card_id, language)` pairs currently owned.
    pub fn owned_card_keys(&self) -> Result<Vec<(CardId, Language)>> {
        let mut stmt = self.conn().prepare(
            "SELECT DISTINCT card_id, language FROM owned_cards
             ORDER BY card_id, language",
        )?;
        let keys = stmt
            .query_map([], |row| Ok((parsed_column(row, 0)?, parsed_column(row, 1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    /// Copies owned of one variant; zero when the row does not exist.
    pub fn quantity(&self, card_id: &CardId, variant: Variant, language: Language) -> Result<u32> {
        let quantity: Option<u32> = self
            .conn()
            .query_row(
                "SELECT quantity FROM owned_cards
                 WHERE card_id = ?1 AND variant = ?2 AND language = ?3",
                params![card_id.as_str(), variant.as_str(), language.code()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(quantity.unwrap_or(0))
    }

    /// Every owned row, in key order.
    pub fn all_owned_entries(&self) -> Result<Vec<OwnedEntry>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {OWNED_COLUMNS} FROM owned_cards o
             ORDER BY o.card_id, o.variant, o.language"
        ))?;
        let entries = stmt
            .query_map([], row_to_owned_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

/// Insert an owned row keeping its timestamps. A row that already exists
/// accumulates the quantity.
pub(crate) fn insert_owned_row(conn: &Connection, entry: &OwnedEntry) -> Result<()> {
    if entry.quantity == 0 {
        return Err(Error::InvalidData(format!(
            "owned entry {} has quantity 0",
            owned_key(&entry.card_id, entry.variant, entry.language)
        )));
    }
    conn.execute(
        "INSERT INTO owned_cards (card_id, variant, language, quantity, added_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (card_id, variant, language)
         DO UPDATE SET quantity = quantity + excluded.quantity,
                       updated_at = excluded.updated_at",
        params![
            entry.card_id.as_str(),
            entry.variant.as_str(),
            entry.language.code(),
            entry.quantity,
            format_timestamp(&entry.added_at),
            format_timestamp(&entry.updated_at)
        ],
    )?;
    Ok(())
}

fn row_to_owned_entry(row: &Row) -> rusqlite::Result<OwnedEntry> {
    Ok(OwnedEntry {
        card_id: parsed_column(row, 0)?,
        variant: parsed_column(row, 1)?,
        language: parsed_column(row, 2)?,
        quantity: row.get(3)?,
        added_at: timestamp_column(row, 4)?,
        updated_at: timestamp_column(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::card::fixtures::canonical;

    fn db_with_card(id: &str) -> (Database, CardId) {
        let db = Database::open_in_memory().unwrap();
        let card = canonical(id, "Bulbasaur");
        db.upsert_canonical_card(&card).unwrap();
        (db, card.card_id)
    }

    #[test]
    fn test_add_accumulates() {
        let (db, id) = db_with_card("me01-136");
        db.add_variant(&id, Variant::Normal, Language::German, 2).unwrap();
        let entry = db.add_variant(&id, Variant::Normal, Language::German, 3).unwrap();
        assert_eq!(entry.quantity, 5);
        assert_eq!(db.quantity(&id, Variant::Normal, Language::German).unwrap(), 5);
    }

    #[test]
    fn test_add_keeps_added_at() {
        let (db, id) = db_with_card("me01-136");
        let first = db.add_variant(&id, Variant::Holo, Language::German, 1).unwrap();
        let second = db.add_variant(&id, Variant::Holo, Language::German, 1).unwrap();
        assert_eq!(first.added_at, second.added_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn test_add_rejects_zero_count() {
        let (db, id) = db_with_card("me01-136");
        let err = db.add_variant(&id, Variant::Normal, Language::German, 0).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[test]
    fn test_add_requires_canonical_card() {
        let db = Database::open_in_memory().unwrap();
        let id = CardId::parse("me01-999").unwrap();
        let err = db.add_variant(&id, Variant::Normal, Language::German, 1).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_add_then_remove_restores_empty_state() {
        let (db, id) = db_with_card("me01-136");
        db.add_variant(&id, Variant::Reverse, Language::French, 4).unwrap();
        let outcome = db.remove_variant(&id, Variant::Reverse, Language::French, 4).unwrap();
        assert_eq!(outcome, RemoveOutcome::Removed);
        assert!(db.all_owned_entries().unwrap().is_empty());
    }

    #[test]
    fn test_remove_partial_and_over_removal() {
        let (db, id) = db_with_card("me01-136");
        db.add_variant(&id, Variant::Normal, Language::German, 3).unwrap();

        let outcome = db.remove_variant(&id, Variant::Normal, Language::German, 1).unwrap();
        assert_eq!(outcome, RemoveOutcome::Remaining(2));

        let outcome = db.remove_variant(&id, Variant::Normal, Language::German, 10).unwrap();
        assert_eq!(outcome, RemoveOutcome::Removed);
        assert_eq!(db.quantity(&id, Variant::Normal, Language::German).unwrap(), 0);
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let (db, id) = db_with_card("me01-136");
        let err = db.remove_variant(&id, Variant::Holo, Language::German, 1).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("de:me01:136:holo"));
        assert!(err.to_string().contains("pkm sets"));
    }

    #[test]
    fn test_remove_all_variants() {
        let (db, id) = db_with_card("me01-136");
        db.add_variant(&id, Variant::Normal, Language::German, 1).unwrap();
        db.add_variant(&id, Variant::Holo, Language::German, 2).unwrap();
        db.add_variant(&id, Variant::Holo, Language::English, 1).unwrap();

        assert_eq!(db.remove_all_variants(&id, Language::German).unwrap(), 2);
        assert_eq!(db.remove_all_variants(&id, Language::German).unwrap(), 0);
        assert_eq!(db.all_owned_entries().unwrap().len(), 1);
    }

    #[test]
    fn test_list_owned_uses_localized_name_with_fallback() {
        let (db, id) = db_with_card("me01-136");
        db.upsert_localized_name(&crate::model::LocalizedName::new(
            id.clone(),
            Language::German,
            "Bisasam",
        ))
        .unwrap();
        db.add_variant(&id, Variant::Normal, Language::German, 1).unwrap();
        db.add_variant(&id, Variant::Normal, Language::French, 1).unwrap();

        let views = db.list_owned(&OwnedFilter::default()).unwrap();
        assert_eq!(views.len(), 2);
        let german = views.iter().find(|v| v.entry.language == Language::German).unwrap();
        let french = views.iter().find(|v| v.entry.language == Language::French).unwrap();
        assert_eq!(german.display_name, "Bisasam");
        assert_eq!(french.display_name, "Bulbasaur");
    }

    #[test]
    fn test_list_owned_filters_and_orders() {
        let db = Database::open_in_memory().unwrap();
        for (id, name) in [("me01-10", "Ten"), ("me01-2", "Two"), ("sv01-1", "One")] {
            let card = canonical(id, name);
            db.upsert_canonical_card(&card).unwrap();
            db.add_variant(&card.card_id, Variant::Normal, Language::German, 1)
                .unwrap();
        }
        let sv = CardId::parse("sv01-1").unwrap();
        db.add_variant(&sv, Variant::Normal, Language::English, 1).unwrap();

        let me01 = db.list_owned(&OwnedFilter::set("me01")).unwrap();
        let numbers: Vec<_> = me01.iter().map(|v| v.card_number.as_str()).collect();
        assert_eq!(numbers, ["2", "10"]);

        let english = db.list_owned(&OwnedFilter::language(Language::English)).unwrap();
        assert_eq!(english.len(), 1);
        assert_eq!(english[0].entry.card_id, sv);
    }

    #[test]
    fn test_owned_card_keys_are_distinct() {
        let (db, id) = db_with_card("me01-136");
        db.add_variant(&id, Variant::Normal, Language::German, 1).unwrap();
        db.add_variant(&id, Variant::Holo, Language::German, 1).unwrap();
        db.add_variant(&id, Variant::Normal, Language::English, 1).unwrap();

        let keys = db.owned_card_keys().unwrap();
        assert_eq!(
            keys,
            vec![(id.clone(), Language::German), (id, Language::English)]
        );
    }

    #[test]
    fn test_quantity_check_constraint() {
        let (db, id) = db_with_card("me01-136");
        let result = db.conn().execute(
            "INSERT INTO owned_cards VALUES (?1, 'normal', 'de', 0, 'x', 'x')",
            [id.as_str()],
        );
        assert!(result.is_err());
    }
}
