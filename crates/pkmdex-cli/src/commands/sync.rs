use anyhow::{bail, Result};

use pkmdex_core::Database;
use pkmdex_sync::{Config, SyncEngine, TcgdexClient};

/// Refresh canonical card data older than `days` (0 = everything).
pub async fn run_sync(config: &Config, db: &Database, days: u32, show_changes: bool) -> Result<()> {
    let catalog = TcgdexClient::new(config)?;
    let engine = SyncEngine::new(db, &catalog, config.staleness_days);

    if days == 0 {
        println!("\n🔄 Syncing all owned cards\n");
    } else {
        println!("\n🔄 Syncing cards older than {} day(s)\n", days);
    }

    let report = engine.sync_stale(days, show_changes).await?;

    if report.candidates == 0 {
        println!("  All card data is up to date.");
        return Ok(());
    }

    println!("  Synced: {}/{}", report.synced, report.candidates);

    if show_changes {
        if report.changes.is_empty() {
            println!("\n  No price or legality changes.");
        } else {
            println!("\n  Changes:");
            for change in &report.changes {
                println!("    {} ({})", change.name, change.card_id);
                for field in &change.fields {
                    println!("      {}: {} → {}", field.field, field.old, field.new);
                }
            }
        }
    }

    if !report.failures.is_empty() {
        println!("\n  Failed:");
        for failure in &report.failures {
            println!("    {}: {}", failure.card_id, failure.error);
        }
        bail!("{} card(s) could not be synced", report.failures.len());
    }

    Ok(())
}
