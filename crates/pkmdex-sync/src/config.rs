use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default TCGdex REST endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.tcgdex.net/v2";

/// Configuration for pkmdex.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (PKM_* prefix)
/// 3. Config file (~/.config/pkmdex/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/db
    /// - ENV: PKM_DATABASE_PATH
    /// - Config: database_path = "/path/to/db"
    /// - Default: ~/.local/share/pkmdex/pokedex.db
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,

    /// Where exports and pre-migration database copies are written.
    #[serde(default = "default_backups_path")]
    pub backups_path: PathBuf,

    /// Root of the flat JSON card documents written by pkmdex 1.x.
    /// Only read by `pkm migrate`.
    #[serde(default = "default_raw_data_path")]
    pub raw_data_path: PathBuf,

    /// TCGdex REST endpoint.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Canonical card data older than this many days is refetched.
    #[serde(default = "default_staleness_days")]
    pub staleness_days: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Extra attempts for timeouts, connection errors, 5xx and 429.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,

    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Upload endpoint of the web viewer used by `pkm push`.
    ///
    /// Can be set via:
    /// - CLI: pkm push --url https://...
    /// - ENV: PKM_VIEWER_URL
    #[serde(default)]
    pub viewer_url: Option<String>,

    /// Bearer token for the web viewer.
    ///
    /// Can be set via:
    /// - CLI: pkm push --api-key ...
    /// - ENV: PKM_VIEWER_API_KEY
    #[serde(default)]
    pub viewer_api_key: Option<String>,

    /// Log output options passed to twyg.
    #[serde(default)]
    pub logging: twyg::Opts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            backups_path: default_backups_path(),
            raw_data_path: default_raw_data_path(),
            api_base_url: default_api_base_url(),
            staleness_days: default_staleness_days(),
            request_timeout_secs: default_request_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            requests_per_second: default_requests_per_second(),
            viewer_url: None,
            viewer_api_key: None,
            logging: twyg::Opts::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/pkmdex/config.toml
    /// Reads environment variables with PKM_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("pkm");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder
            .build()
            .context("Failed to build configuration")?;

        Ok(config)
    }

    /// Load configuration with custom database path.
    ///
    /// This is used when the --db CLI flag is provided.
    pub fn load_with_db_path(db_path: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.database_path = db_path;
        Ok(config)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Staleness threshold as a chrono duration.
    #[must_use]
    pub fn staleness(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.staleness_days))
    }
}

fn data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pkmdex")
}

/// Get the default database path.
///
/// Returns: ~/.local/share/pkmdex/pokedex.db (or platform equivalent)
fn default_db_path() -> PathBuf {
    data_root().join("pokedex.db")
}

fn default_backups_path() -> PathBuf {
    data_root().join("backups")
}

fn default_raw_data_path() -> PathBuf {
    data_root().join("raw_data")
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

const fn default_staleness_days() -> u32 {
    7
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_retry_attempts() -> usize {
    1
}

const fn default_requests_per_second() -> u32 {
    5
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/pkmdex/config.toml
/// - macOS: ~/Library/Application Support/pkmdex/config.toml
/// - Windows: %APPDATA%\pkmdex\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pkmdex")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# pkmdex Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (PKM_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Path to the SQLite database
#
# Can also be set via:
# - CLI: pkm --db /custom/path.db list
# - Environment: PKM_DATABASE_PATH=/custom/path.db
#
# Default: Platform-specific data directory
#database_path = "/path/to/pokedex.db"

# Exports and pre-migration copies of the database
#backups_path = "/path/to/backups"

# Flat JSON card documents from pkmdex 1.x (read by 'pkm migrate')
#raw_data_path = "/path/to/raw_data"

# TCGdex API
#api_base_url = "https://api.tcgdex.net/v2"
#request_timeout_secs = 30
#retry_attempts = 1
#requests_per_second = 5

# Refetch card data (prices, legality) older than this many days
staleness_days = 7

# Web viewer used by 'pkm push'
#viewer_url = "https://pkmdex.example.com/api/upload"
#viewer_api_key = "your-api-key-here"
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
