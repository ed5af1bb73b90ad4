use anyhow::{Context, Result};
use toml_edit::{value, DocumentMut};

use pkmdex_sync::{config, Config};

const STRING_KEYS: &[&str] = &[
    "database_path",
    "backups_path",
    "raw_data_path",
    "api_base_url",
    "viewer_url",
    "viewer_api_key",
];

const INTEGER_KEYS: &[&str] = &[
    "staleness_days",
    "request_timeout_secs",
    "retry_attempts",
    "requests_per_second",
];

fn valid_keys() -> String {
    STRING_KEYS
        .iter()
        .chain(INTEGER_KEYS)
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}

fn mask(secret: Option<&str>) -> String {
    match secret {
        Some(s) if s.chars().count() > 4 => format!("{}…", s.chars().take(4).collect::<String>()),
        Some(_) => "****".to_string(),
        None => "<not set>".to_string(),
    }
}

/// Show the current effective configuration.
pub fn show_config(config: &Config) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    let path = config::config_file_path();
    println!("Config file: {}", path.display());
    println!(
        "File exists: {}\n",
        if path.exists() { "yes" } else { "no (using defaults)" }
    );

    println!("Settings:");
    println!("  database_path: {}", config.database_path.display());
    println!("  backups_path: {}", config.backups_path.display());
    println!("  raw_data_path: {}", config.raw_data_path.display());
    println!("  api_base_url: {}", config.api_base_url);
    println!("  staleness_days: {}", config.staleness_days);
    println!("  request_timeout_secs: {}", config.request_timeout_secs);
    println!("  retry_attempts: {}", config.retry_attempts);
    println!("  requests_per_second: {}", config.requests_per_second);
    println!(
        "  viewer_url: {}",
        config.viewer_url.as_deref().unwrap_or("<not set>")
    );
    println!("  viewer_api_key: {}", mask(config.viewer_api_key.as_deref()));
    println!("  logging.level: {:?}", config.logging.level());
    println!("  logging.coloured: {}", config.logging.coloured());
    println!("  logging.output: {:?}", config.logging.output());

    println!("\nPriority: CLI args > ENV vars (PKM_*) > Config file > Defaults");

    Ok(())
}

fn effective_value(config: &Config, key: &str) -> Option<String> {
    let value = match key {
        "database_path" => config.database_path.display().to_string(),
        "backups_path" => config.backups_path.display().to_string(),
        "raw_data_path" => config.raw_data_path.display().to_string(),
        "api_base_url" => config.api_base_url.clone(),
        "staleness_days" => config.staleness_days.to_string(),
        "request_timeout_secs" => config.request_timeout_secs.to_string(),
        "retry_attempts" => config.retry_attempts.to_string(),
        "requests_per_second" => config.requests_per_second.to_string(),
        "viewer_url" => config
            .viewer_url
            .clone()
            .unwrap_or_else(|| "<not set>".to_string()),
        "viewer_api_key" => config
            .viewer_api_key
            .clone()
            .unwrap_or_else(|| "<not set>".to_string()),
        _ => return None,
    };
    Some(value)
}

/// Get a specific config value, or print the config file.
pub fn get_config(config: &Config, key: Option<String>) -> Result<()> {
    if let Some(key) = key {
        match effective_value(config, &key) {
            Some(value) => println!("{}", value),
            None => anyhow::bail!("Unknown config key: {}\n\nValid keys: {}", key, valid_keys()),
        }
        return Ok(());
    }

    let config_path = config::config_file_path();
    if config_path.exists() {
        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        print!("{}", contents);
    } else {
        println!("Config file does not exist: {}", config_path.display());
        println!("\nRun 'pkm config init' to create it.");
    }

    Ok(())
}

/// Set `key` in a TOML document, keeping comments and layout intact.
fn set_key(contents: &str, key: &str, raw: &str) -> Result<String> {
    let mut doc: DocumentMut = contents.parse().context("Config file is not valid TOML")?;

    if INTEGER_KEYS.contains(&key) {
        let number: i64 = raw
            .parse()
            .with_context(|| format!("{} must be a whole number, got '{}'", key, raw))?;
        anyhow::ensure!(number >= 0, "{} must not be negative", key);
        doc[key] = value(number);
    } else if STRING_KEYS.contains(&key) {
        doc[key] = value(raw);
    } else {
        anyhow::bail!("Unknown config key: {}\n\nValid keys: {}", key, valid_keys());
    }

    Ok(doc.to_string())
}

/// Set a config value.
pub fn set_config(key: &str, raw: &str) -> Result<()> {
    let config_path = config::config_file_path();
    config::ensure_config_file()?;

    let contents = std::fs::read_to_string(&config_path).context("Failed to read config file")?;
    let updated = set_key(&contents, key, raw)?;
    std::fs::write(&config_path, updated).context("Failed to write config file")?;

    let shown = if key == "viewer_api_key" {
        mask(Some(raw))
    } else {
        raw.to_string()
    };
    println!("✓ Updated {} = {}", key, shown);
    println!("  in {}", config_path.display());

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    println!("{}", config::config_file_path().display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure pkmdex.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
