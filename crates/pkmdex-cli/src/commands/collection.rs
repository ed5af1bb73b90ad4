use anyhow::{bail, Context, Result};
use std::collections::HashMap;

use pkmdex_core::model::{CardId, CardRef, Language, OwnedCardView, OwnedFilter, RemoveOutcome, Variant};
use pkmdex_core::Database;
use pkmdex_sync::{CardCatalog, Config, SyncEngine, TcgdexClient};

/// Add copies of a card, fetching its data first when needed.
pub async fn run_add(
    config: &Config,
    db: &Database,
    card: &str,
    count: u32,
    force: bool,
) -> Result<()> {
    let card_ref = CardRef::parse(card)?;
    let variant = card_ref.variant_or_default();

    let catalog = TcgdexClient::new(config)?;
    let engine = SyncEngine::new(db, &catalog, config.staleness_days);
    let ensured = engine
        .ensure_card(&card_ref.card_id, card_ref.language)
        .await
        .with_context(|| format!("Failed to look up {}", card_ref.card_id))?;

    let variants = ensured.card.variants;
    if !variants.is_unknown() && !variants.is_available(variant) {
        let available = variants
            .available()
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        if force {
            eprintln!(
                "⚠ Warning: {} is not listed with a {} variant (available: {})",
                card_ref.card_id, variant, available
            );
        } else {
            bail!(
                "Variant '{}' is not available for {} ({})\nAvailable variants: {}\nUse --force to add it anyway.",
                variant,
                card_ref.card_id,
                ensured.display_name,
                available
            );
        }
    }

    let entry = db.add_variant(&card_ref.card_id, variant, card_ref.language, count)?;
    println!(
        "✓ Added {} x {} ({}) [{}, {}]",
        count, ensured.display_name, card_ref.card_id, variant, card_ref.language
    );
    println!("  Now owned: {}", entry.quantity);
    if ensured.fetched_canonical || ensured.fetched_localized {
        log::info!("Stored card data for {}", card_ref.card_id);
    }
    Ok(())
}

pub fn run_remove(db: &Database, card: &str, count: u32, all: bool) -> Result<()> {
    if all {
        let card_ref = CardRef::parse_lenient(card)?;
        let removed = db.remove_all_variants(&card_ref.card_id, card_ref.language)?;
        if removed == 0 {
            println!(
                "Nothing owned for {} in {}",
                card_ref.card_id, card_ref.language
            );
        } else {
            println!(
                "✓ Removed {} variant(s) of {} [{}]",
                removed, card_ref.card_id, card_ref.language
            );
        }
        return Ok(());
    }

    let card_ref = CardRef::parse(card)?;
    let variant = card_ref.variant_or_default();
    match db.remove_variant(&card_ref.card_id, variant, card_ref.language, count)? {
        RemoveOutcome::Removed => {
            println!(
                "✓ Removed {} [{}, {}] from the collection",
                card_ref.card_id, variant, card_ref.language
            );
        }
        RemoveOutcome::Remaining(quantity) => {
            println!(
                "✓ Removed {} x {} [{}, {}]",
                count, card_ref.card_id, variant, card_ref.language
            );
            println!("  Remaining: {}", quantity);
        }
    }
    Ok(())
}

fn filter_from_arg(arg: Option<&str>) -> OwnedFilter {
    match arg {
        None => OwnedFilter::default(),
        Some(value) => match value.parse::<Language>() {
            Ok(language) => OwnedFilter::language(language),
            Err(_) => OwnedFilter::set(value.to_lowercase()),
        },
    }
}

/// Owned rows grouped per card and language, in listing order.
fn group_rows(rows: &[OwnedCardView]) -> Vec<(&OwnedCardView, Vec<(Variant, u32)>)> {
    let mut groups: Vec<(&OwnedCardView, Vec<(Variant, u32)>)> = Vec::new();
    let mut index: HashMap<(&CardId, Language), usize> = HashMap::new();
    for row in rows {
        let idx = *index
            .entry((&row.entry.card_id, row.entry.language))
            .or_insert_with(|| {
                groups.push((row, Vec::new()));
                groups.len() - 1
            });
        groups[idx].1.push((row.entry.variant, row.entry.quantity));
    }
    groups
}

pub fn show_list(db: &Database, filter: Option<&str>) -> Result<()> {
    let rows = db.list_owned(&filter_from_arg(filter))?;

    if rows.is_empty() {
        println!("No cards in the collection{}.", match filter {
            Some(f) => format!(" matching '{f}'"),
            None => String::new(),
        });
        println!("\nAdd one with: pkm add de:me01:136");
        return Ok(());
    }

    println!(
        "{:<6} {:<10} {:<6} {:<28} {:<20} {:>5}  {}",
        "Lang", "Set", "No.", "Name", "Rarity", "Qty", "Variants"
    );
    println!("{}", "-".repeat(100));

    let mut total = 0u64;
    for (row, variants) in group_rows(&rows) {
        let quantity: u32 = variants.iter().map(|(_, q)| q).sum();
        total += u64::from(quantity);
        let summary = variants
            .iter()
            .map(|(v, q)| format!("{v}×{q}"))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{:<6} {:<10} {:<6} {:<28} {:<20} {:>5}  {}",
            row.entry.language,
            row.set_id,
            row.card_number,
            truncate(&row.display_name, 28),
            truncate(row.rarity.as_deref().unwrap_or("-"), 20),
            quantity,
            summary
        );
    }

    println!("\n{} entries, {} cards total", rows.len(), total);
    Ok(())
}

pub async fn show_info(config: &Config, db: &Database, card: &str) -> Result<()> {
    let card_ref = CardRef::parse(card)?;
    let catalog = TcgdexClient::new(config)?;
    let details = catalog
        .fetch_card(card_ref.language, &card_ref.card_id)
        .await
        .with_context(|| format!("Failed to fetch {}", card_ref.card_id))?;

    println!("\n{} ({})\n", details.name, details.card_id);
    println!("  Category:    {}", details.category);
    println!("  Rarity:      {}", details.rarity.as_deref().unwrap_or("-"));
    if !details.types.is_empty() {
        println!("  Types:       {}", details.types.join(", "));
    }
    if let Some(hp) = details.hp {
        println!("  HP:          {}", hp);
    }
    if let Some(stage) = &details.stage {
        println!("  Stage:       {}", stage);
    }
    if let Some(illustrator) = &details.illustrator {
        println!("  Illustrator: {}", illustrator);
    }
    if let Some(mark) = &details.regulation_mark {
        println!("  Regulation:  {}", mark);
    }
    let variants = details
        .variants
        .available()
        .iter()
        .map(|v| v.as_str())
        .collect::<Vec<_>>();
    println!(
        "  Variants:    {}",
        if variants.is_empty() {
            "unknown".to_string()
        } else {
            variants.join(", ")
        }
    );
    println!(
        "  Legal:       standard {}, expanded {}",
        yes_no(details.legal_standard),
        yes_no(details.legal_expanded)
    );
    if let Some(eur) = details.price_eur {
        println!("  Price:       €{:.2} (Cardmarket)", eur);
    }
    if let Some(usd) = details.price_usd {
        println!("               ${:.2} (TCGplayer)", usd);
    }
    if let Some(image) = &details.image_url {
        println!("  Image:       {}", image);
    }

    let owned: Vec<String> = Variant::ALL
        .into_iter()
        .filter_map(|variant| {
            match db.quantity(&card_ref.card_id, variant, card_ref.language) {
                Ok(0) => None,
                Ok(q) => Some(Ok(format!("{variant}×{q}"))),
                Err(e) => Some(Err(e)),
            }
        })
        .collect::<pkmdex_core::Result<_>>()?;
    if !owned.is_empty() {
        println!("\n  Owned ({}): {}", card_ref.language, owned.join(", "));
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

pub(crate) fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
