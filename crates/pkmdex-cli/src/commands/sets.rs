use anyhow::{Context, Result};

use pkmdex_core::model::Language;
use pkmdex_core::Database;
use pkmdex_sync::{CardCatalog, Config, TcgdexClient};

use super::collection::truncate;

/// Reload the set list from TCGdex into the cache.
pub async fn refresh_set_cache(config: &Config, db: &Database) -> Result<usize> {
    println!("Fetching set list from TCGdex...");
    let catalog = TcgdexClient::new(config)?;
    let sets = catalog
        .list_sets(Language::English)
        .await
        .context("Failed to fetch the set list")?;
    db.cache_sets(&sets)?;
    println!("✓ Cached {} sets", sets.len());
    Ok(sets.len())
}

/// Search the cached set list, loading it from TCGdex when empty or when
/// `refresh` is set.
pub async fn run_sets(
    config: &Config,
    db: &Database,
    search: Option<&str>,
    refresh: bool,
) -> Result<()> {
    match db.set_cache_age()? {
        Some(cached_at) if !refresh => log::debug!("Using set list cached at {}", cached_at),
        _ => {
            refresh_set_cache(config, db).await?;
            println!();
        }
    }

    let sets = db.search_sets(search)?;
    if sets.is_empty() {
        match search {
            Some(query) => println!("No sets matching '{}'.", query),
            None => println!("No sets cached."),
        }
        println!("\nTry 'pkm sets --refresh' to reload the set list.");
        return Ok(());
    }

    println!("{:<12} {:<36} {:>6}  {}", "Set", "Name", "Cards", "Released");
    println!("{}", "-".repeat(70));
    for set in &sets {
        println!(
            "{:<12} {:<36} {:>6}  {}",
            set.set_id,
            truncate(&set.name, 36),
            set.card_count,
            set.release_date.as_deref().unwrap_or("-")
        );
    }
    println!("\n{} set(s). Add a card with: pkm add de:<set>:<number>", sets.len());
    Ok(())
}
