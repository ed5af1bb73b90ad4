//! Conversion of a pkmdex 1.x database into the three-table layout.
//!
//! The 1.x layout kept ownership and a little card info in a single `cards`
//! table, with full card documents stored as flat JSON files next to the
//! database. Migration reads those rows, builds canonical cards from the
//! documents (falling back to the catalog), and writes each card in its own
//! transaction. The legacy tables are renamed, never dropped.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use pkmdex_core::model::{CanonicalCard, CardId, Language, LocalizedName, OwnedEntry, Variant};
use pkmdex_core::{Database, SchemaState};

use crate::catalog::{CardCatalog, CatalogCard};
use crate::config::Config;
use crate::error::{SyncError, SyncResult};

/// Where a canonical card came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardSource {
    FlatDocument,
    Catalog,
}

/// Where a localized name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    FlatDocument,
    Catalog,
    EnglishFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    /// Nothing to do; the reason says why.
    Skipped(String),
    /// A plan was built but nothing was written.
    DryRun,
    Completed,
}

/// Per-card result of planning and writing.
#[derive(Debug, Clone, PartialEq)]
pub struct CardOutcome {
    pub card_id: String,
    pub source: Option<CardSource>,
    pub names: Vec<(Language, NameSource)>,
    pub ownership_rows: usize,
    /// Set when the card could not be migrated.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationReport {
    pub status: MigrationStatus,
    pub legacy_rows: usize,
    pub cards_migrated: usize,
    pub cards_from_documents: usize,
    pub cards_from_catalog: usize,
    pub names_migrated: usize,
    pub ownership_rows_migrated: usize,
    pub cards: Vec<CardOutcome>,
    pub backup_path: Option<PathBuf>,
    /// Post-migration consistency problems. Advisory: nothing is rolled back.
    pub issues: Vec<String>,
}

impl MigrationReport {
    fn skipped(reason: &str) -> Self {
        Self {
            status: MigrationStatus::Skipped(reason.to_string()),
            legacy_rows: 0,
            cards_migrated: 0,
            cards_from_documents: 0,
            cards_from_catalog: 0,
            names_migrated: 0,
            ownership_rows_migrated: 0,
            cards: Vec::new(),
            backup_path: None,
            issues: Vec::new(),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &CardOutcome> {
        self.cards.iter().filter(|c| c.error.is_some())
    }

    /// The consistency issues as a single error, if there are any.
    pub fn consistency_error(&self) -> Option<pkmdex_core::Error> {
        (!self.issues.is_empty())
            .then(|| pkmdex_core::Error::Consistency(self.issues.join("; ")))
    }
}

/// Filesystem locations the migration works with.
#[derive(Debug, Clone)]
pub struct MigrationPaths {
    pub database: PathBuf,
    pub backups: PathBuf,
    pub raw_data: PathBuf,
}

impl MigrationPaths {
    pub fn from_config(config: &Config) -> Self {
        Self {
            database: config.database_path.clone(),
            backups: config.backups_path.clone(),
            raw_data: config.raw_data_path.clone(),
        }
    }

    fn card_document(&self, card_id: &str, language: Language) -> PathBuf {
        let file = if language.is_canonical() {
            format!("{card_id}.json")
        } else {
            format!("{card_id}.{}.json", language.code())
        };
        self.raw_data.join("cards").join(file)
    }
}

struct LegacyRow {
    card_id: CardId,
    variant: Variant,
    language: Language,
    quantity: u32,
    added_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct CardPlan {
    outcome: CardOutcome,
    card: Option<CanonicalCard>,
    names: Vec<LocalizedName>,
    owned: Vec<OwnedEntry>,
}

/// Runs the v1 to v2 migration.
pub struct Migrator<'a> {
    catalog: &'a dyn CardCatalog,
    paths: MigrationPaths,
}

impl std::fmt::Debug for Migrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

impl<'a> Migrator<'a> {
    pub fn new(catalog: &'a dyn CardCatalog, paths: MigrationPaths) -> Self {
        Self { catalog, paths }
    }

    /// Migrate the database. Empty and already-migrated databases are
    /// skipped; a dry run plans every card but writes nothing.
    pub async fn migrate(&self, dry_run: bool) -> SyncResult<MigrationReport> {
        let db = Database::open_raw(&self.paths.database)?;
        match db.schema_state()? {
            SchemaState::Empty => {
                return Ok(MigrationReport::skipped("database is empty (nothing to migrate)"))
            }
            SchemaState::Current => {
                return Ok(MigrationReport::skipped("database already uses the v2 schema"))
            }
            SchemaState::Unknown => {
                return Err(SyncError::Core(pkmdex_core::Error::InvalidData(
                    "unknown database schema (manual intervention required)".to_string(),
                )))
            }
            SchemaState::Legacy => {}
        }

        let (rows, unreadable) = read_legacy_rows(&db)?;
        let legacy_rows = rows.len() + unreadable.len();
        log::info!("Found {} legacy ownership rows", legacy_rows);

        let mut grouped: BTreeMap<CardId, Vec<LegacyRow>> = BTreeMap::new();
        for row in rows {
            grouped.entry(row.card_id.clone()).or_default().push(row);
        }

        let mut plans = Vec::with_capacity(grouped.len());
        for (card_id, rows) in &grouped {
            plans.push(self.plan_card(card_id, rows).await);
        }

        let mut report = MigrationReport {
            status: if dry_run {
                MigrationStatus::DryRun
            } else {
                MigrationStatus::Completed
            },
            legacy_rows,
            ..MigrationReport::skipped("")
        };
        for (card_id, reason) in unreadable {
            report.cards.push(CardOutcome {
                card_id,
                source: None,
                names: Vec::new(),
                ownership_rows: 0,
                error: Some(reason),
            });
        }

        if !dry_run {
            report.backup_path = Some(self.backup()?);
            convert_schema(&db)?;
        }

        for mut plan in plans {
            if let Some(card) = &plan.card {
                if !dry_run {
                    if let Err(e) = db.save_card_bundle(card, &plan.names, &plan.owned) {
                        log::warn!("Failed to write {}: {}", card.card_id, e);
                        plan.outcome.error = Some(e.to_string());
                        report.cards.push(plan.outcome);
                        continue;
                    }
                }
                report.cards_migrated += 1;
                match plan.outcome.source {
                    Some(CardSource::FlatDocument) => report.cards_from_documents += 1,
                    Some(CardSource::Catalog) => report.cards_from_catalog += 1,
                    None => {}
                }
                report.names_migrated += plan.names.len();
                report.ownership_rows_migrated += plan.owned.len();
            }
            report.cards.push(plan.outcome);
        }

        if !dry_run {
            report.issues = self.validate(&db, legacy_rows, &grouped)?;
            for issue in &report.issues {
                log::warn!("Consistency check: {}", issue);
            }
        }

        Ok(report)
    }

    async fn plan_card(&self, card_id: &CardId, rows: &[LegacyRow]) -> CardPlan {
        let mut outcome = CardOutcome {
            card_id: card_id.to_string(),
            source: None,
            names: Vec::new(),
            ownership_rows: rows.len(),
            error: None,
        };

        let english = match self.load_english(card_id).await {
            Ok((card, source)) => {
                outcome.source = Some(source);
                card
            }
            Err(e) => {
                log::warn!("Cannot migrate {}: {}", card_id, e);
                outcome.error = Some(e.to_string());
                return CardPlan {
                    outcome,
                    card: None,
                    names: Vec::new(),
                    owned: Vec::new(),
                };
            }
        };

        let mut names = vec![english.localized_name()];
        let english_source = match outcome.source {
            Some(CardSource::Catalog) => NameSource::Catalog,
            _ => NameSource::FlatDocument,
        };
        outcome.names.push((Language::English, english_source));
        let languages: BTreeSet<Language> = rows.iter().map(|r| r.language).collect();
        for language in languages.into_iter().filter(|l| !l.is_canonical()) {
            let (name, source) = self.load_name(card_id, language, &english.name).await;
            names.push(LocalizedName::new(card_id.clone(), language, name));
            outcome.names.push((language, source));
        }

        let owned = rows
            .iter()
            .map(|row| OwnedEntry {
                card_id: row.card_id.clone(),
                variant: row.variant,
                language: row.language,
                quantity: row.quantity,
                added_at: row.added_at,
                updated_at: row.updated_at,
            })
            .collect();

        CardPlan {
            outcome,
            card: Some(english.into_canonical(Utc::now())),
            names,
            owned,
        }
    }

    /// English card from its flat document, else from the catalog.
    async fn load_english(&self, card_id: &CardId) -> SyncResult<(CatalogCard, CardSource)> {
        let path = self.paths.card_document(card_id.as_str(), Language::English);
        if path.exists() {
            let parsed = fs::read_to_string(&path).map_err(SyncError::from).and_then(|json| {
                CatalogCard::from_json(
                    &path.display().to_string(),
                    &json,
                    Language::English,
                    Some(card_id),
                )
            });
            match parsed {
                Ok(card) => return Ok((card, CardSource::FlatDocument)),
                Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
            }
        }

        let card = self.catalog.fetch_card(Language::English, card_id).await?;
        Ok((card, CardSource::Catalog))
    }

    async fn load_name(
        &self,
        card_id: &CardId,
        language: Language,
        english_name: &str,
    ) -> (String, NameSource) {
        let path = self.paths.card_document(card_id.as_str(), language);
        if let Ok(json) = fs::read_to_string(&path) {
            let name = serde_json::from_str::<serde_json::Value>(&json)
                .ok()
                .and_then(|doc| doc.get("name")?.as_str().map(str::to_string))
                .filter(|name| !name.trim().is_empty());
            if let Some(name) = name {
                return (name, NameSource::FlatDocument);
            }
            log::warn!("{} has no usable name", path.display());
        }

        match self.catalog.fetch_card(language, card_id).await {
            Ok(card) => (card.name, NameSource::Catalog),
            Err(e) => {
                log::warn!(
                    "No {} name for {} ({}); using the English name",
                    language,
                    card_id,
                    e
                );
                (english_name.to_string(), NameSource::EnglishFallback)
            }
        }
    }

    fn backup(&self) -> SyncResult<PathBuf> {
        fs::create_dir_all(&self.paths.backups)?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let target = self
            .paths
            .backups
            .join(format!("pokedex_v1_backup_{stamp}.db"));
        fs::copy(&self.paths.database, &target)?;
        log::info!("Created backup: {}", target.display());
        Ok(target)
    }

    fn validate(
        &self,
        db: &Database,
        legacy_rows: usize,
        grouped: &BTreeMap<CardId, Vec<LegacyRow>>,
    ) -> SyncResult<Vec<String>> {
        let mut issues = Vec::new();
        let conn = db.conn();
        let count = |sql: &str| -> SyncResult<usize> {
            let n: i64 = conn
                .query_row(sql, [], |row| row.get(0))
                .map_err(pkmdex_core::Error::from)?;
            Ok(usize::try_from(n).unwrap_or(0))
        };

        let owned = count("SELECT COUNT(*) FROM owned_cards")?;
        if owned != legacy_rows {
            issues.push(format!(
                "owned_cards has {owned} rows but the legacy table had {legacy_rows}"
            ));
        }

        for (card_id, rows) in grouped {
            let languages: BTreeSet<Language> = rows.iter().map(|r| r.language).collect();
            for language in languages {
                if !self.paths.card_document(card_id.as_str(), language).exists() {
                    continue;
                }
                if db.get_localized_name(card_id, language)?.is_none() {
                    issues.push(format!("missing {language} name for {card_id}"));
                }
            }
        }

        let orphaned_owned = count(
            "SELECT COUNT(*) FROM owned_cards o
             LEFT JOIN cards c ON c.card_id = o.card_id WHERE c.card_id IS NULL",
        )?;
        if orphaned_owned > 0 {
            issues.push(format!("{orphaned_owned} orphaned owned_cards rows"));
        }
        let orphaned_names = count(
            "SELECT COUNT(*) FROM card_names n
             LEFT JOIN cards c ON c.card_id = n.card_id WHERE c.card_id IS NULL",
        )?;
        if orphaned_names > 0 {
            issues.push(format!("{orphaned_names} orphaned card_names rows"));
        }

        Ok(issues)
    }
}

/// Restore a pre-migration backup over the database.
///
/// An existing database is copied next to itself first and that copy's
/// path is returned; `None` means there was no database to keep.
pub fn rollback(backup_path: &Path, database_path: &Path) -> SyncResult<Option<PathBuf>> {
    if !backup_path.exists() {
        return Err(SyncError::Core(pkmdex_core::Error::not_found(
            "backup",
            backup_path.display().to_string(),
        )));
    }
    let safety = if database_path.exists() {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let safety = database_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("pokedex_before_rollback_{stamp}.db"));
        fs::copy(database_path, &safety)?;
        Some(safety)
    } else {
        None
    };
    fs::copy(backup_path, database_path)?;
    log::info!("Restored {} from {}", database_path.display(), backup_path.display());
    Ok(safety)
}

fn has_column(db: &Database, table: &str, column: &str) -> SyncResult<bool> {
    let n: i64 = db
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
            params![table, column],
            |row| row.get(0),
        )
        .map_err(pkmdex_core::Error::from)?;
    Ok(n > 0)
}

/// Read the legacy ownership rows. Rows that cannot be interpreted are
/// returned separately as `(card id, reason)`.
#[allow(clippy::type_complexity)]
fn read_legacy_rows(db: &Database) -> SyncResult<(Vec<LegacyRow>, Vec<(String, String)>)> {
    // Databases from before multi-language support have no language column;
    // everything in them was German.
    let language_column = if has_column(db, "cards", "language")? {
        "language"
    } else {
        "'de'"
    };
    let id_column = if has_column(db, "cards", "tcgdex_id")? {
        "COALESCE(tcgdex_id, set_id || '-' || card_number)"
    } else {
        "set_id || '-' || card_number"
    };
    let sql = format!(
        "SELECT {id_column}, variant, {language_column}, COALESCE(quantity, 1), added_at, updated_at
         FROM cards ORDER BY 1, 2, 3"
    );

    let mut stmt = db.conn().prepare(&sql).map_err(pkmdex_core::Error::from)?;
    let raw: Vec<(String, String, String, i64, Option<String>, Option<String>)> = stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })
        .map_err(pkmdex_core::Error::from)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(pkmdex_core::Error::from)?;

    let mut rows = Vec::with_capacity(raw.len());
    let mut unreadable = Vec::new();
    for (id, variant, language, quantity, added_at, updated_at) in raw {
        match parse_legacy_row(&id, &variant, &language, quantity, added_at, updated_at) {
            Ok(row) => rows.push(row),
            Err(e) => {
                log::warn!("Skipping legacy row {}: {}", id, e);
                unreadable.push((id, e.to_string()));
            }
        }
    }
    Ok((rows, unreadable))
}

fn parse_legacy_row(
    id: &str,
    variant: &str,
    language: &str,
    quantity: i64,
    added_at: Option<String>,
    updated_at: Option<String>,
) -> pkmdex_core::Result<LegacyRow> {
    let quantity = u32::try_from(quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or_else(|| pkmdex_core::Error::InvalidData(format!("quantity {quantity}")))?;
    Ok(LegacyRow {
        card_id: id.parse()?,
        variant: variant.parse()?,
        language: language.parse()?,
        quantity,
        added_at: parse_legacy_timestamp(added_at.as_deref()),
        updated_at: parse_legacy_timestamp(updated_at.as_deref()),
    })
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [table],
        |row| row.get(0),
    )
}

/// Rename the 1.x tables, create the current schema and carry the set cache
/// over, all in one transaction. A failure leaves the 1.x layout untouched.
fn convert_schema(db: &Database) -> SyncResult<()> {
    let tx = db
        .conn()
        .unchecked_transaction()
        .map_err(pkmdex_core::Error::from)?;

    let has_card_cache = table_exists(&tx, "card_cache").map_err(pkmdex_core::Error::from)?;
    let has_set_cache = table_exists(&tx, "set_cache").map_err(pkmdex_core::Error::from)?;
    if has_card_cache {
        tx.execute_batch("ALTER TABLE card_cache RENAME TO card_cache_v1_backup;")
            .map_err(pkmdex_core::Error::from)?;
    }
    if has_set_cache {
        tx.execute_batch("ALTER TABLE set_cache RENAME TO set_cache_v1_backup;")
            .map_err(pkmdex_core::Error::from)?;
    }
    tx.execute_batch("ALTER TABLE cards RENAME TO cards_v1_backup;")
        .map_err(pkmdex_core::Error::from)?;

    pkmdex_core::apply_pending_migrations(&tx)?;

    if has_set_cache {
        // 1.x stored CURRENT_TIMESTAMP text and allowed a NULL card count.
        let carried = tx
            .execute(
                "INSERT OR REPLACE INTO set_cache
                 (set_id, name, card_count, release_date, serie_id, serie_name, cached_at)
                 SELECT set_id, name, MAX(COALESCE(card_count, 0), 0),
                        release_date, serie_id, serie_name,
                        COALESCE(strftime('%Y-%m-%dT%H:%M:%S', cached_at),
                                 strftime('%Y-%m-%dT%H:%M:%S', 'now')) || '.000000000Z'
                 FROM set_cache_v1_backup
                 WHERE set_id IS NOT NULL AND name IS NOT NULL",
                [],
            )
            .map_err(pkmdex_core::Error::from)?;
        log::info!("Carried {} cached sets over", carried);
    }

    tx.commit().map_err(pkmdex_core::Error::from)?;
    log::info!("Renamed legacy tables to *_v1_backup");
    Ok(())
}

/// Legacy timestamps are SQLite `CURRENT_TIMESTAMP` text or ISO 8601.
fn parse_legacy_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Utc::now();
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.with_timezone(&Utc);
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return naive.and_utc();
        }
    }
    log::warn!("Unrecognised timestamp '{}'; using now", raw);
    Utc::now()
}
