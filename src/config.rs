use std::path::PathBuf;

use billbook_core::{parse_date, DEFAULT_WEEK_ANCHOR};
use clap::Parser;
use serde::Deserialize;
use time::Date;

use crate::cli::Command;
use crate::error::ConfigError;

#[derive(Parser, Debug)]
#[command(name = "billbook", about = "Billbook - personal income and expense ledger")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "billbook.toml")]
    pub config: String,

    /// Database file (overrides config file)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Worker pool size (overrides config file)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub calendar: CalendarConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: Backend,

    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PoolConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CalendarConfig {
    /// First day of week 1, `YYYY-MM-DD`.
    #[serde(default = "default_week_anchor")]
    pub week_anchor: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("billbook.db")
}

fn default_workers() -> usize {
    2
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_week_anchor() -> String {
    billbook_core::format_date(DEFAULT_WEEK_ANCHOR)
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            backend: Backend::default(),
            path: default_db_path(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig { workers: default_workers() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        CalendarConfig { week_anchor: default_week_anchor() }
    }
}

impl Config {
    /// A config backed by an in-memory store.
    pub fn in_memory() -> Self {
        let mut config = Config::default();
        config.storage.backend = Backend::Memory;
        config
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(cli: &CliArgs) -> Self {
        let mut config = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => Config::from_toml_str(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config file: {}", e);
                Config::default()
            }),
            Err(_) => Config::default(),
        };

        // CLI overrides
        if let Some(ref path) = cli.db {
            config.storage.path = path.clone();
        }
        if let Some(workers) = cli.workers {
            config.pool.workers = workers.max(1);
        }
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        parse_date(&self.calendar.week_anchor)?;
        Ok(())
    }

    /// Falls back to the default anchor when the configured one does not parse.
    pub fn week_anchor(&self) -> Date {
        parse_date(&self.calendar.week_anchor).unwrap_or(DEFAULT_WEEK_ANCHOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.storage.backend, Backend::Sqlite);
        assert_eq!(config.storage.path, PathBuf::from("billbook.db"));
        assert_eq!(config.pool.workers, 2);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert_eq!(config.week_anchor(), date!(2026 - 01 - 01));
    }

    #[test]
    fn test_full_file() {
        let config = Config::from_toml_str(
            r#"
            [storage]
            backend = "memory"
            path = "/tmp/ledger.db"
            [pool]
            workers = 4
            [logging]
            level = "debug"
            json = true
            [calendar]
            week_anchor = "2024-01-01"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.backend, Backend::Memory);
        assert_eq!(config.pool.workers, 4);
        assert!(config.logging.json);
        assert_eq!(config.week_anchor(), date!(2024 - 01 - 01));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            Config::from_toml_str("[pool]\nworkers = 0"),
            Err(ConfigError::NoWorkers)
        ));
        assert!(matches!(
            Config::from_toml_str("[calendar]\nweek_anchor = \"soon\""),
            Err(ConfigError::Anchor(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[storage]\nbackend = \"postgres\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_cli_overrides() {
        let cli = CliArgs::parse_from([
            "billbook",
            "--config",
            "/nonexistent/billbook.toml",
            "--db",
            "other.db",
            "--workers",
            "3",
            "--log-level",
            "trace",
            "--json",
            "categories",
            "--direction",
            "income",
        ]);
        let config = Config::load(&cli);
        assert_eq!(config.storage.path, PathBuf::from("other.db"));
        assert_eq!(config.pool.workers, 3);
        assert_eq!(config.logging.level, "trace");
        assert!(cli.json);
        assert!(!config.logging.json);
    }
}
