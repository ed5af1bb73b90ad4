//! Error types for catalog access, sync, migration and push.

use thiserror::Error;

/// Errors that can occur while talking to the card catalog or syncing.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The catalog answered with an unexpected HTTP status.
    #[error("HTTP {status} from {source_name}: {message}")]
    Http {
        source_name: String,
        status: u16,
        message: String,
    },

    /// The catalog returned a rate-limit response.
    #[error("rate limited by {source_name}")]
    RateLimited { source_name: String },

    /// The requested card or set does not exist at the catalog.
    #[error("not found: {entity} at {source_name}\n{}", pkmdex_core::error::DISCOVERY_HINT)]
    NotFound { entity: String, source_name: String },

    /// A response body could not be parsed.
    #[error("parse error from {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// A parsed response is missing a required field.
    #[error("invalid catalog data for {card_id}: {reason}")]
    Validation { card_id: String, reason: String },

    /// An error propagated from `reqwest` (timeouts, connection failures).
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// An error propagated from the core domain layer.
    #[error(transparent)]
    Core(#[from] pkmdex_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote viewer rejected a pushed export.
    #[error("push to {url} failed: {message}")]
    Push { url: String, message: String },
}

impl SyncError {
    /// Returns `true` when the error is transient and the operation may
    /// succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Returns `true` when the error indicates the entity was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Core(e) => e.is_not_found(),
            _ => false,
        }
    }
}

/// Convenience alias for sync results.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
