use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use pkmdex_core::Database;
use pkmdex_sync::Config;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "pkm", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the database (default: ~/.local/share/pkmdex/pokedex.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Add cards to the collection
    ///
    /// Cards are named as <lang>:<set_id>:<card_number>[:<variant>], for
    /// example de:me01:136:holo. The variant defaults to normal.
    ///
    /// On first use the English card data is fetched from TCGdex and stored
    /// together with the name in the requested language. Later additions of
    /// the same card need no network access until the stored data is older
    /// than the configured staleness threshold.
    ///
    /// The variant must be one TCGdex lists for the card; use --force to add
    /// it anyway (a warning is printed).
    Add {
        /// Card reference (lang:set:number[:variant])
        card: String,

        /// Number of copies to add
        #[arg(long, short, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,

        /// Skip the variant availability check
        #[arg(long)]
        force: bool,
    },
    /// Remove cards from the collection
    ///
    /// Removing more copies than are owned deletes the entry. With --all,
    /// every variant of the card in that language is removed; the short
    /// set:number form then means German.
    Rm {
        /// Card reference (lang:set:number[:variant])
        card: String,

        /// Number of copies to remove
        #[arg(long, short, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,

        /// Remove every variant of the card
        #[arg(long)]
        all: bool,
    },
    /// List owned cards
    ///
    /// The optional filter is a language when it is a valid language code
    /// (de, en, fr, ...), otherwise a set id.
    List {
        /// Language code or set id
        filter: Option<String>,
    },
    /// Show TCGdex details for a card without changing the collection
    Info {
        /// Card reference (lang:set:number)
        card: String,
    },
    /// Search sets by name or id
    Sets {
        /// Part of a set name or id
        search: Option<String>,

        /// Reload the set list from TCGdex
        #[arg(long)]
        refresh: bool,
    },
    /// Show set cache statistics
    ///
    /// Prints how many sets are cached and when they were fetched, with a
    /// tip when the list is older than the staleness threshold.
    Cache {
        /// Reload the set list from TCGdex first
        #[arg(long, conflicts_with = "clear")]
        refresh: bool,

        /// Delete every cached set
        #[arg(long)]
        clear: bool,
    },
    /// Show collection statistics
    Stats,
    /// Filter the collection by card attributes
    ///
    /// All filters match against the English card data, so results are the
    /// same whichever language a card was collected in. --name also matches
    /// localized names. Filters combine with AND.
    Analyze {
        #[command(flatten)]
        filter: commands::analyze::FilterArgs,

        /// Show a breakdown instead of the card list
        #[arg(long)]
        stats: bool,
    },
    /// Refresh stored card data (prices, legality) from TCGdex
    Sync {
        /// Only cards last synced more than DAYS ago (0 = all; default from config)
        #[arg(long, value_name = "DAYS")]
        stale: Option<u32>,

        /// Print price and legality changes
        #[arg(long)]
        show_changes: bool,
    },
    /// Write the collection to a JSON file
    Export {
        /// Output file (default: <backups_path>/pkmdex_export_<timestamp>.json)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace the collection with the contents of an export file
    Import {
        /// Export file to restore
        file: PathBuf,

        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },
    /// Upload an export to the web viewer
    Push {
        /// Upload this export file instead of a fresh export
        #[arg(long)]
        file: Option<PathBuf>,

        /// Viewer upload URL (default: viewer_url from config)
        #[arg(long)]
        url: Option<String>,

        /// Viewer API key (default: viewer_api_key from config)
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Convert a pkmdex 1.x database to the current layout
    ///
    /// The database is copied to the backups directory first, and the old
    /// tables are kept as cards_v1_backup, card_cache_v1_backup and
    /// set_cache_v1_backup; cached sets are carried over. Card data
    /// comes from the 1.x flat JSON files under raw_data_path, falling back
    /// to TCGdex.
    Migrate {
        /// Show what would be migrated without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Print the outcome for every card
        #[arg(long, short)]
        verbose: bool,

        /// Restore a pre-migration backup instead of migrating
        #[arg(long, value_name = "BACKUP", conflicts_with = "dry_run")]
        rollback: Option<PathBuf>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print one value, or the whole config file
    Get {
        /// Config key
        key: Option<String>,
    },
    /// Set a value in the config file
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// Print the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file if it does not exist
    Init,
}

fn open_database(config: &Config) -> Result<Database> {
    Database::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open database {}",
            config.database_path.display()
        )
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.db {
        Some(path) => Config::load_with_db_path(path)?,
        None => Config::load()?,
    };

    if let Err(e) = twyg::setup(config.logging.clone()) {
        eprintln!("Warning: failed to set up logging: {e}");
    }

    match cli.command {
        Commands::Add { card, count, force } => {
            let db = open_database(&config)?;
            commands::collection::run_add(&config, &db, &card, count, force).await?;
        }
        Commands::Rm { card, count, all } => {
            let db = open_database(&config)?;
            commands::collection::run_remove(&db, &card, count, all)?;
        }
        Commands::List { filter } => {
            let db = open_database(&config)?;
            commands::collection::show_list(&db, filter.as_deref())?;
        }
        Commands::Info { card } => {
            let db = open_database(&config)?;
            commands::collection::show_info(&config, &db, &card).await?;
        }
        Commands::Sets { search, refresh } => {
            let db = open_database(&config)?;
            commands::sets::run_sets(&config, &db, search.as_deref(), refresh).await?;
        }
        Commands::Cache { refresh, clear } => {
            let db = open_database(&config)?;
            commands::cache::run_cache(&config, &db, refresh, clear).await?;
        }
        Commands::Stats => {
            let db = open_database(&config)?;
            commands::stats::show_stats(&db)?;
        }
        Commands::Analyze { filter, stats } => {
            let db = open_database(&config)?;
            commands::analyze::run_analyze(&db, filter, stats)?;
        }
        Commands::Sync {
            stale,
            show_changes,
        } => {
            let db = open_database(&config)?;
            let days = stale.unwrap_or(config.staleness_days);
            commands::sync::run_sync(&config, &db, days, show_changes).await?;
        }
        Commands::Export { output } => {
            let db = open_database(&config)?;
            commands::backup::run_export(&config, &db, output)?;
        }
        Commands::Import { file, yes } => {
            let db = open_database(&config)?;
            commands::backup::run_import(&db, &file, yes)?;
        }
        Commands::Push { file, url, api_key } => {
            commands::backup::run_push(&config, file, url, api_key).await?;
        }
        Commands::Migrate {
            dry_run,
            verbose,
            rollback,
        } => match rollback {
            Some(backup) => commands::migrate::run_rollback(&config, &backup)?,
            None => commands::migrate::run_migrate(&config, dry_run, verbose).await?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show_config(&config)?,
            ConfigAction::Get { key } => commands::config::get_config(&config, key)?,
            ConfigAction::Set { key, value } => commands::config::set_config(&key, &value)?,
            ConfigAction::Path => commands::config::show_path()?,
            ConfigAction::Example => commands::config::show_example()?,
            ConfigAction::Init => commands::config::init_config()?,
        },
    }

    Ok(())
}
