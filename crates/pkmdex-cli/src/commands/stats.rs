use anyhow::Result;
use pkmdex_core::Database;

pub fn show_stats(db: &Database) -> Result<()> {
    let stats = db.collection_stats()?;

    println!("\n📊 Collection Statistics\n");
    if stats.unique_cards == 0 {
        println!("  The collection is empty.");
        println!("\n  Run `pkm add <lang>:<set>:<number>` to add a card");
        return Ok(());
    }

    println!("  Unique cards:   {}", stats.unique_cards);
    println!("  Total cards:    {}", stats.total_quantity);
    println!("  Sets:           {}", stats.sets_count);
    if let Some((set_id, count)) = &stats.most_collected_set {
        println!("  Most collected: {} ({} cards)", set_id, count);
    }
    println!(
        "  Value:          €{:.2} / ${:.2}",
        stats.total_value_eur, stats.total_value_usd
    );

    println!("\n  By variant:");
    for (variant, count) in &stats.by_variant {
        println!("    {:<14} {}", variant, count);
    }
    println!("\n  By language:");
    for (language, count) in &stats.by_language {
        println!("    {:<14} {}", language, count);
    }
    if !stats.by_rarity.is_empty() {
        println!("\n  By rarity:");
        for (rarity, count) in &stats.by_rarity {
            println!("    {:<24} {}", rarity, count);
        }
    }

    Ok(())
}
