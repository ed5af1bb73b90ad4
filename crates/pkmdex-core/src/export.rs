//! Versioned JSON snapshot of the whole collection.
//!
//! An export carries the ownership rows together with every canonical card
//! and localized name, so a restore never needs the network.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{CanonicalCard, LocalizedName, OwnedEntry};
use crate::schema::{insert_owned_row, upsert_card_row, upsert_name_row, Database};

/// Version written by [`Database::export`].
pub const EXPORT_VERSION: &str = "2.0";

/// Versions [`Database::import`] accepts.
pub const SUPPORTED_VERSIONS: &[&str] = &[EXPORT_VERSION];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub owned_entries: Vec<OwnedEntry>,
    pub canonical_cards: Vec<CanonicalCard>,
    pub localized_names: Vec<LocalizedName>,
}

impl ExportDocument {
    /// Parse a document from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject versions this build does not understand.
    pub fn check_version(&self) -> Result<()> {
        if SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            Ok(())
        } else {
            Err(Error::Version {
                found: self.version.clone(),
                supported: SUPPORTED_VERSIONS.join(", "),
            })
        }
    }
}

/// Row counts written by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub owned_entries: usize,
    pub canonical_cards: usize,
    pub localized_names: usize,
}

impl Database {
    /// Snapshot all three collection tables, in key order.
    pub fn export(&self) -> Result<ExportDocument> {
        Ok(ExportDocument {
            version: EXPORT_VERSION.to_string(),
            exported_at: Utc::now(),
            owned_entries: self.all_owned_entries()?,
            canonical_cards: self.all_canonical_cards()?,
            localized_names: self.all_localized_names()?,
        })
    }

    /// Replace the collection with the document's contents.
    ///
    /// The version is checked before anything is written; the delete and
    /// re-insert run in one transaction, so a failure leaves the previous
    /// collection untouched.
    pub fn import(&self, doc: &ExportDocument) -> Result<ImportSummary> {
        doc.check_version()?;

        let tx = self.conn().unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM owned_cards;
             DELETE FROM card_names;
             DELETE FROM cards;",
        )?;
        for card in &doc.canonical_cards {
            upsert_card_row(&tx, card)?;
        }
        for name in &doc.localized_names {
            upsert_name_row(&tx, name)?;
        }
        for entry in &doc.owned_entries {
            insert_owned_row(&tx, entry)?;
        }
        tx.commit()?;

        log::info!(
            "Imported {} owned entries, {} cards, {} names",
            doc.owned_entries.len(),
            doc.canonical_cards.len(),
            doc.localized_names.len()
        );
        Ok(ImportSummary {
            owned_entries: doc.owned_entries.len(),
            canonical_cards: doc.canonical_cards.len(),
            localized_names: doc.localized_names.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::card::fixtures::canonical;
    use crate::model::{CardId, Language, Variant};
    use chrono::TimeZone;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        let card = canonical("me01-136", "Bulbasaur");
        db.save_card_bundle(
            &card,
            &[
                LocalizedName::new(card.card_id.clone(), Language::English, "Bulbasaur"),
                LocalizedName::new(card.card_id.clone(), Language::German, "Bisasam"),
            ],
            &[],
        )
        .unwrap();
        db.add_variant(&card.card_id, Variant::Normal, Language::German, 2)
            .unwrap();
        db.add_variant(&card.card_id, Variant::Holo, Language::German, 1)
            .unwrap();
        db
    }

    #[test]
    fn test_export_import_round_trip() {
        let source = seeded();
        let doc = source.export().unwrap();
        assert_eq!(doc.version, "2.0");

        let json = doc.to_json_pretty().unwrap();
        let parsed = ExportDocument::from_json(&json).unwrap();

        let target = Database::open_in_memory().unwrap();
        let summary = target.import(&parsed).unwrap();
        assert_eq!(summary.owned_entries, 2);
        assert_eq!(summary.localized_names, 2);

        let again = target.export().unwrap();
        assert_eq!(again.owned_entries, doc.owned_entries);
        assert_eq!(again.canonical_cards, doc.canonical_cards);
        assert_eq!(again.localized_names, doc.localized_names);
    }

    #[test]
    fn test_import_keeps_nanosecond_timestamps() {
        let at = |nanos| Utc.timestamp_opt(1_700_000_000, nanos).unwrap();
        let mut card = canonical("me01-136", "Bulbasaur");
        card.last_synced = at(987_654_321);
        let entry = |variant, added_at, updated_at| OwnedEntry {
            card_id: card.card_id.clone(),
            variant,
            language: Language::German,
            quantity: 1,
            added_at,
            updated_at,
        };
        let doc = ExportDocument {
            version: EXPORT_VERSION.to_string(),
            exported_at: at(0),
            owned_entries: vec![
                entry(Variant::Holo, at(123_456_789), at(123_456_790)),
                entry(Variant::Normal, at(1), at(999_999_999)),
            ],
            localized_names: vec![LocalizedName::new(
                card.card_id.clone(),
                Language::German,
                "Bisasam",
            )],
            canonical_cards: vec![card],
        };
        let parsed = ExportDocument::from_json(&doc.to_json_pretty().unwrap()).unwrap();

        let db = Database::open_in_memory().unwrap();
        db.import(&parsed).unwrap();

        let again = db.export().unwrap();
        assert_eq!(again.owned_entries, doc.owned_entries);
        assert_eq!(again.canonical_cards, doc.canonical_cards);
        assert_eq!(again.localized_names, doc.localized_names);
    }

    #[test]
    fn test_import_rejects_unknown_version() {
        let db = seeded();
        let mut doc = db.export().unwrap();
        doc.version = "99.0".to_string();
        doc.owned_entries.clear();

        let err = db.import(&doc).unwrap_err();
        assert!(matches!(err, Error::Version { .. }));
        assert_eq!(db.all_owned_entries().unwrap().len(), 2);
    }

    #[test]
    fn test_import_is_atomic() {
        let db = seeded();
        let before = db.export().unwrap();

        // An owned entry pointing at a card the document does not carry
        // violates the foreign key part-way through the import.
        let mut doc = before.clone();
        let mut orphan = doc.owned_entries[0].clone();
        orphan.card_id = CardId::parse("sv01-1").unwrap();
        doc.owned_entries.push(orphan);

        assert!(db.import(&doc).is_err());

        let after = db.export().unwrap();
        assert_eq!(after.owned_entries, before.owned_entries);
        assert_eq!(after.localized_names, before.localized_names);
    }
}
