//! Catalog access and data movement for pkmdex.
//!
//! Talks to the TCGdex API through the [`CardCatalog`] seam, keeps canonical
//! card data fresh ([`SyncEngine`]), converts 1.x databases ([`Migrator`]),
//! and pushes exports to the web viewer.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod migrate;
pub mod push;
pub mod resilience;
pub mod sync;
pub mod tcgdex;

pub use catalog::{CardCatalog, CatalogCard};
pub use config::Config;
pub use error::{SyncError, SyncResult};
pub use migrate::{rollback, MigrationPaths, MigrationReport, MigrationStatus, Migrator};
pub use push::push_export;
pub use sync::{EnsuredCard, SyncEngine, SyncReport};
pub use tcgdex::TcgdexClient;
