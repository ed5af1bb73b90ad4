use anyhow::{bail, Context, Result};
use chrono::Local;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use pkmdex_core::{Database, ExportDocument};
use pkmdex_sync::{push_export, Config};

fn default_export_path(config: &Config) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    config
        .backups_path
        .join(format!("pkmdex_export_{stamp}.json"))
}

/// Write the whole collection to a JSON export file.
pub fn run_export(config: &Config, db: &Database, output: Option<PathBuf>) -> Result<()> {
    let path = output.unwrap_or_else(|| default_export_path(config));
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let doc = db.export()?;
    std::fs::write(&path, doc.to_json_pretty()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✓ Exported collection to {}", path.display());
    println!(
        "  {} owned entries, {} cards, {} names",
        doc.owned_entries.len(),
        doc.canonical_cards.len(),
        doc.localized_names.len()
    );
    Ok(())
}

fn read_export(path: &Path) -> Result<ExportDocument> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    ExportDocument::from_json(&json)
        .with_context(|| format!("{} is not a pkmdex export", path.display()))
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Replace the collection with an export file.
pub fn run_import(db: &Database, file: &Path, yes: bool) -> Result<()> {
    let doc = read_export(file)?;
    doc.check_version()?;

    let current = db.collection_stats()?;
    println!("Import {}", file.display());
    println!(
        "  File:    {} owned entries, {} cards (exported {})",
        doc.owned_entries.len(),
        doc.canonical_cards.len(),
        doc.exported_at.format("%Y-%m-%d %H:%M")
    );
    println!(
        "  Current: {} unique cards, {} total",
        current.unique_cards, current.total_quantity
    );

    if !yes && !confirm("This replaces the whole collection. Continue?")? {
        println!("Import cancelled.");
        return Ok(());
    }

    let summary = db.import(&doc).context("Import failed; nothing was changed")?;
    println!(
        "✓ Imported {} owned entries, {} cards, {} names",
        summary.owned_entries, summary.canonical_cards, summary.localized_names
    );
    Ok(())
}

/// Upload an export to the web viewer.
pub async fn run_push(
    config: &Config,
    file: Option<PathBuf>,
    url: Option<String>,
    api_key: Option<String>,
) -> Result<()> {
    let Some(url) = url.or_else(|| config.viewer_url.clone()) else {
        bail!("No viewer URL.\n\nPass --url or set viewer_url (PKM_VIEWER_URL).");
    };
    let Some(api_key) = api_key.or_else(|| config.viewer_api_key.clone()) else {
        bail!("No viewer API key.\n\nPass --api-key or set viewer_api_key (PKM_VIEWER_API_KEY).");
    };

    let doc = match file {
        Some(path) => read_export(&path)?,
        None => {
            let db = Database::open(&config.database_path).with_context(|| {
                format!("Failed to open database {}", config.database_path.display())
            })?;
            db.export()?
        }
    };

    push_export(&doc, &url, &api_key, config.request_timeout())
        .await
        .context("Push failed")?;
    println!(
        "✓ Pushed {} owned entries to {}",
        doc.owned_entries.len(),
        url
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_export_path() {
        let config = Config {
            backups_path: PathBuf::from("/data/backups"),
            ..Config::default()
        };
        let path = default_export_path(&config);
        assert_eq!(path.parent(), Some(Path::new("/data/backups")));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("pkmdex_export_"));
        assert!(name.ends_with(".json"));
    }
}
