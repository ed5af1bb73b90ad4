use anyhow::Result;
use clap::Args;
use std::collections::BTreeMap;

use pkmdex_core::analysis::{analysis_stats, AnalysisFilter};
use pkmdex_core::model::{Category, Language};
use pkmdex_core::Database;

use super::collection::truncate;

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Evolution stage (Basic, Stage1, Stage2, ...)
    #[arg(long)]
    stage: Option<String>,

    /// Energy type (Fire, Water, Grass, ...)
    #[arg(long = "type")]
    card_type: Option<String>,

    #[arg(long)]
    rarity: Option<String>,

    #[arg(long)]
    hp_min: Option<u32>,

    #[arg(long)]
    hp_max: Option<u32>,

    /// Pokemon, Trainer or Energy
    #[arg(long)]
    category: Option<Category>,

    /// Language the card was collected in
    #[arg(long)]
    language: Option<Language>,

    #[arg(long = "set")]
    set_id: Option<String>,

    /// Regulation mark (D, E, F, ...)
    #[arg(long = "regulation")]
    regulation_mark: Option<String>,

    /// Part of the illustrator's name
    #[arg(long)]
    artist: Option<String>,

    /// Part of the card name in any stored language
    #[arg(long)]
    name: Option<String>,
}

impl From<FilterArgs> for AnalysisFilter {
    fn from(args: FilterArgs) -> Self {
        Self {
            stage: args.stage,
            card_type: args.card_type,
            rarity: args.rarity,
            hp_min: args.hp_min,
            hp_max: args.hp_max,
            category: args.category,
            language: args.language,
            set_id: args.set_id,
            regulation_mark: args.regulation_mark,
            artist: args.artist,
            name: args.name,
        }
    }
}

pub fn run_analyze(db: &Database, args: FilterArgs, show_stats: bool) -> Result<()> {
    let filter = AnalysisFilter::from(args);
    let cards = db.analyze(&filter)?;

    if cards.is_empty() {
        println!("No owned cards match the filters.");
        return Ok(());
    }

    if show_stats {
        let stats = analysis_stats(&cards);
        println!("\n📈 Analysis ({} cards, {} copies)\n", stats.total_cards, stats.total_quantity);
        if let Some(hp) = stats.average_hp {
            println!("  Average HP: {:.1}\n", hp);
        }
        print_breakdown("Category", &stats.by_category);
        print_breakdown("Stage", &stats.by_stage);
        print_breakdown("Type", &stats.by_type);
        print_breakdown("Rarity", &stats.by_rarity);
        print_breakdown("Set", &stats.by_set);
        return Ok(());
    }

    println!(
        "{:<6} {:<14} {:<28} {:<10} {:>4} {:<18} {:>4}",
        "Lang", "Card", "Name", "Stage", "HP", "Types", "Qty"
    );
    println!("{}", "-".repeat(92));
    for analyzed in &cards {
        let card = &analyzed.card;
        println!(
            "{:<6} {:<14} {:<28} {:<10} {:>4} {:<18} {:>4}",
            analyzed.language,
            card.card_id,
            truncate(&analyzed.display_name, 28),
            card.stage.as_deref().unwrap_or("-"),
            card.hp.map_or_else(|| "-".to_string(), |hp| hp.to_string()),
            truncate(&card.types.join("/"), 18),
            analyzed.quantity
        );
    }
    println!("\n{} card(s)", cards.len());
    Ok(())
}

fn print_breakdown(title: &str, counts: &BTreeMap<String, usize>) {
    if counts.is_empty() {
        return;
    }
    println!("  {}:", title);
    let mut sorted: Vec<_> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (key, count) in sorted {
        println!("    {:<20} {}", key, count);
    }
    println!();
}
