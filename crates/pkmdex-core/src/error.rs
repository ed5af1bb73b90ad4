use thiserror::Error;

/// Hint appended to lookups that fail because a card or set is unknown.
pub const DISCOVERY_HINT: &str = "Try 'pkm sets <name>' to search sets by name.";

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    Input(String),

    #[error("not found: {entity} {id}\n{hint}")]
    NotFound {
        entity: &'static str,
        id: String,
        hint: &'static str,
    },

    #[error("unsupported export version {found} (supported: {supported})")]
    Version { found: String, supported: String },

    #[error("consistency check failed: {0}")]
    Consistency(String),

    #[error(
        "database at {path} still uses the v1 layout\nRun 'pkm migrate' to convert it."
    )]
    LegacySchema { path: String },

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// A `NotFound` for an owned entry or card, with the discovery hint.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
            hint: DISCOVERY_HINT,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
