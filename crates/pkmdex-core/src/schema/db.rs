use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

use super::migrations::MIGRATIONS;

/// Layout of an opened database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// No user tables yet.
    Empty,
    /// The single-table v1 layout (`cards` with a `quantity` column).
    Legacy,
    /// The three-table v2 layout with the migration marker.
    Current,
    /// Anything else.
    Unknown,
}

/// A database connection with CRUD methods for the collection tables.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a collection database and apply pending migrations.
    ///
    /// # Errors
    /// Returns `Error::LegacySchema` for a v1 database and
    /// `Error::InvalidData` for an unrecognised layout.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = Self::open_raw(path)?;
        match db.schema_state()? {
            SchemaState::Empty | SchemaState::Current => {
                db.apply_migrations()?;
                Ok(db)
            }
            SchemaState::Legacy => Err(Error::LegacySchema {
                path: path.display().to_string(),
            }),
            SchemaState::Unknown => Err(Error::InvalidData(format!(
                "{} does not look like a pkmdex database",
                path.display()
            ))),
        }
    }

    /// Open a database without inspecting or migrating its layout.
    ///
    /// Used by the v1 migration, which has to read the legacy tables
    /// before the current schema exists.
    pub fn open_raw(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Self::from_connection(Connection::open_in_memory()?)?;
        db.apply_migrations()?;
        Ok(db)
    }

    /// Wrap an existing connection, enabling foreign keys. No migrations run.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Inspect which layout the database currently has.
    pub fn schema_state(&self) -> Result<SchemaState> {
        detect_schema(&self.conn)
    }

    /// Apply every migration not yet recorded in `schema_migrations`, in
    /// one transaction.
    pub fn apply_migrations(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        apply_pending_migrations(&tx)?;
        tx.commit()?;
        Ok(())
    }
}

/// Apply pending migrations on `conn` without opening a transaction, so
/// callers can combine schema creation with their own changes.
pub fn apply_pending_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let applied: Vec<u32> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for migration in MIGRATIONS {
        if !applied.contains(&migration.version) {
            log::info!(
                "Applying migration {} ({})",
                migration.version,
                migration.name
            );
            conn.execute_batch(migration.sql)?;
            conn.execute(
                "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                rusqlite::params![migration.version, migration.name],
            )?;
        }
    }

    Ok(())
}

/// Classify the tables present in `conn`.
pub fn detect_schema(conn: &Connection) -> Result<SchemaState> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let tables: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    if tables.is_empty() {
        return Ok(SchemaState::Empty);
    }

    let has = |name: &str| tables.iter().any(|t| t == name);

    if has("schema_migrations") && has("owned_cards") && has("cards") && has("card_names") {
        return Ok(SchemaState::Current);
    }

    if has("cards") && !has("owned_cards") && table_has_column(conn, "cards", "quantity")? {
        return Ok(SchemaState::Legacy);
    }

    Ok(SchemaState::Unknown)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        rusqlite::params![table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Timestamps are stored as fixed-width RFC3339 text so they sort lexically.
/// Nanosecond precision keeps export documents lossless.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn optional_timestamp_column(
    row: &Row,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Read a TEXT column through the type's `FromStr`.
pub(crate) fn parsed_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = Error>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: Error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a JSON TEXT column.
pub(crate) fn json_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_in_memory_is_current() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.schema_state().unwrap(), SchemaState::Current);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let db = Database::open_in_memory().unwrap();
        let enabled: i64 = db
            .conn()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pokedex.db");
        drop(Database::open(&path).unwrap());
        let db = Database::open(&path).unwrap();
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_open_refuses_legacy_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE cards (
                id INTEGER PRIMARY KEY, set_id TEXT, card_number TEXT,
                tcgdex_id TEXT, variant TEXT, language TEXT, quantity INTEGER,
                added_at TEXT, updated_at TEXT
            );",
        )
        .unwrap();
        drop(conn);

        let err = Database::open(&path).unwrap_err();
        assert!(matches!(err, Error::LegacySchema { .. }));
        assert!(err.to_string().contains("pkm migrate"));
    }

    #[test]
    fn test_detect_unknown_layout() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY);")
            .unwrap();
        assert_eq!(detect_schema(&conn).unwrap(), SchemaState::Unknown);
    }

    #[test]
    fn test_detect_empty() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(detect_schema(&conn).unwrap(), SchemaState::Empty);
    }

    #[test]
    fn test_timestamps_keep_nanoseconds() {
        use chrono::TimeZone;
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let stored = format_timestamp(&ts);
        assert_eq!(stored, "2023-11-14T22:13:20.123456789Z");
        assert_eq!(DateTime::parse_from_rfc3339(&stored).unwrap(), ts);
        // Whole seconds still render with all nine digits.
        let whole = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(format_timestamp(&whole).len(), stored.len());
    }

    #[test]
    fn test_pending_migrations_roll_back_with_caller() {
        let conn = Connection::open_in_memory().unwrap();
        {
            let tx = conn.unchecked_transaction().unwrap();
            apply_pending_migrations(&tx).unwrap();
            // Dropped without commit.
        }
        assert_eq!(detect_schema(&conn).unwrap(), SchemaState::Empty);
    }

    #[test]
    fn test_timestamps_sort_lexically() {
        let early = Utc::now();
        let late = early + chrono::Duration::milliseconds(1);
        assert!(format_timestamp(&early) < format_timestamp(&late));
    }
}
