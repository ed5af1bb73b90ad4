mod catalog;
mod db;
pub mod migrations;
mod ownership;
mod stats;

pub use catalog::StaleCard;
pub use db::{apply_pending_migrations, detect_schema, Database, SchemaState};
pub use stats::CollectionStats;

pub(crate) use catalog::{upsert_card_row, upsert_name_row};
pub(crate) use ownership::insert_owned_row;
