use anyhow::{bail, Result};
use std::path::Path;

use pkmdex_sync::migrate::{rollback, CardSource, NameSource};
use pkmdex_sync::{Config, MigrationPaths, MigrationReport, MigrationStatus, Migrator, TcgdexClient};

pub async fn run_migrate(config: &Config, dry_run: bool, verbose: bool) -> Result<()> {
    let catalog = TcgdexClient::new(config)?;
    let migrator = Migrator::new(&catalog, MigrationPaths::from_config(config));

    println!("\n📦 Migrating {}\n", config.database_path.display());
    let report = migrator.migrate(dry_run).await?;

    match &report.status {
        MigrationStatus::Skipped(reason) => {
            println!("  Nothing to do: {}", reason);
            return Ok(());
        }
        MigrationStatus::DryRun => println!("  Dry run, nothing was written.\n"),
        MigrationStatus::Completed => {}
    }

    print_summary(&report, dry_run);
    if verbose {
        print_cards(&report);
    }

    let failed = report.failures().count();
    if failed > 0 {
        println!("\n  ⚠ {} card(s) could not be migrated:", failed);
        for outcome in report.failures() {
            println!(
                "    {}: {}",
                outcome.card_id,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    if let Some(backup) = &report.backup_path {
        println!("\n  Backup: {}", backup.display());
        println!("  Undo with: pkm migrate --rollback {}", backup.display());
    }

    if let Some(error) = report.consistency_error() {
        return Err(error.into());
    }
    if failed > 0 && !dry_run {
        bail!("{} card(s) were not migrated", failed);
    }
    if !dry_run {
        println!("\n✓ Migration complete");
    }
    Ok(())
}

fn print_summary(report: &MigrationReport, dry_run: bool) {
    let verb = if dry_run { "Would migrate" } else { "Migrated" };
    println!("  Legacy rows:    {}", report.legacy_rows);
    println!(
        "  {} {} cards ({} from flat files, {} from TCGdex)",
        verb, report.cards_migrated, report.cards_from_documents, report.cards_from_catalog
    );
    println!("  Names:          {}", report.names_migrated);
    println!("  Ownership rows: {}", report.ownership_rows_migrated);
}

fn print_cards(report: &MigrationReport) {
    println!("\n  Cards:");
    for outcome in &report.cards {
        let source = match outcome.source {
            Some(CardSource::FlatDocument) => "file",
            Some(CardSource::Catalog) => "tcgdex",
            None => "-",
        };
        let names = outcome
            .names
            .iter()
            .map(|(language, source)| {
                let from = match source {
                    NameSource::FlatDocument => "file",
                    NameSource::Catalog => "tcgdex",
                    NameSource::EnglishFallback => "english",
                };
                format!("{language}={from}")
            })
            .collect::<Vec<_>>()
            .join(" ");
        let status = if outcome.error.is_some() { "✗" } else { "✓" };
        println!(
            "    {} {:<14} card={:<7} rows={} names: {}",
            status, outcome.card_id, source, outcome.ownership_rows, names
        );
    }
}

/// Put a pre-migration backup back in place of the database.
pub fn run_rollback(config: &Config, backup: &Path) -> Result<()> {
    let safety = rollback(backup, &config.database_path)?;
    println!("✓ Restored {}", config.database_path.display());
    println!("  from {}", backup.display());
    if let Some(safety) = safety {
        println!("  Previous database saved as {}", safety.display());
    }
    Ok(())
}
