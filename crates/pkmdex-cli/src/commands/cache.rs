use anyhow::Result;
use chrono::{DateTime, Utc};

use pkmdex_core::Database;
use pkmdex_sync::Config;

use super::sets::refresh_set_cache;

/// A hint when the oldest cached set is older than `staleness_days`.
fn age_hint(oldest: DateTime<Utc>, now: DateTime<Utc>, staleness_days: u32) -> Option<String> {
    let days = (now - oldest).num_days();
    (days > i64::from(staleness_days)).then(|| {
        format!("Set list is {days} days old. Run 'pkm cache --refresh' to pick up new sets.")
    })
}

/// Show set cache statistics, or refresh or clear the cache.
pub async fn run_cache(config: &Config, db: &Database, refresh: bool, clear: bool) -> Result<()> {
    if clear {
        let removed = db.clear_set_cache()?;
        println!("✓ Cleared {} cached sets", removed);
        return Ok(());
    }
    if refresh {
        refresh_set_cache(config, db).await?;
        println!();
    }

    let stats = db.set_cache_stats()?;
    println!("Set Cache");
    println!("=========\n");
    println!("Cached sets: {}", stats.count);

    let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) else {
        println!("\nThe cache is empty. Run 'pkm sets' or 'pkm cache --refresh' to fill it.");
        return Ok(());
    };
    println!("Oldest entry: {}", oldest.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Newest entry: {}", newest.format("%Y-%m-%d %H:%M:%S UTC"));

    if let Some(hint) = age_hint(oldest, Utc::now(), config.staleness_days) {
        println!("\nTip: {hint}");
    }
    Ok(())
}
