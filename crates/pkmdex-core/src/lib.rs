//! Core data model and storage for pkmdex.
//!
//! This crate defines the card identifiers and value types, the SQLite
//! schema (canonical cards, localized names, ownership, set cache), the
//! collection analysis filters, and the versioned export document.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod analysis;
pub mod error;
pub mod export;
pub mod model;
pub mod schema;

pub use error::{Error, Result};
pub use export::{ExportDocument, ImportSummary, EXPORT_VERSION};
pub use schema::{apply_pending_migrations, Database, SchemaState};
