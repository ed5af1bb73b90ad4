pub mod analyze;
pub mod backup;
pub mod cache;
pub mod collection;
pub mod config;
pub mod migrate;
pub mod sets;
pub mod stats;
pub mod sync;
