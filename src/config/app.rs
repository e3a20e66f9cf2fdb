//! Application configuration loading from config.toml
//!
//! Settings come from a TOML file whose path is taken from `FLOCK_LEDGER_CONFIG`
//! (default `config.toml`). Every section has defaults, so a missing file yields a working
//! configuration. `DATABASE_URL`, when set, overrides `database.url`.

use crate::core::retry::RetryPolicy;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::env::VarError;
use std::path::Path;
use tracing::{debug, info, warn};

const CONFIG_PATH_VAR: &str = "FLOCK_LEDGER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";
const DEFAULT_DATABASE_URL: &str = "sqlite://data/flock_ledger.sqlite?mode=rwc";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Store connection settings
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Conflict retry policy shared by the transactional workflows
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Subscription plans and their dealer capacity limits
    #[serde(default)]
    pub plans: Vec<PlanConfig>,
}

/// `[database]` section
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// sea-orm connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Log every SQL statement through `sqlx`
    #[serde(default)]
    pub sql_logging: bool,
    /// Pool size; `sea-orm` keeps a single `SQLite` connection when unset
    #[serde(default)]
    pub max_connections: Option<u32>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            sql_logging: false,
            max_connections: None,
        }
    }
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

/// One `[[plans]]` entry
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PlanConfig {
    /// Plan name as stored on the user record
    pub name: String,
    /// Maximum approved farmer connections for a dealer on this plan; absent means unlimited
    #[serde(default)]
    pub max_farmers: Option<u32>,
}

impl AppConfig {
    /// Rejects settings the workflows cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::Config {
                message: "retry.max_attempts must be at least 1".to_string(),
            });
        }
        if self.database.url.trim().is_empty() {
            return Err(Error::Config {
                message: "database.url cannot be empty".to_string(),
            });
        }
        if self.database.max_connections == Some(0) {
            return Err(Error::Config {
                message: "database.max_connections must be at least 1".to_string(),
            });
        }
        for (i, plan) in self.plans.iter().enumerate() {
            if self.plans[..i].iter().any(|p| p.name == plan.name) {
                return Err(Error::Config {
                    message: format!("plan '{}' is defined more than once", plan.name),
                });
            }
        }
        Ok(())
    }
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read (`Error::Io`)
/// - The TOML syntax is invalid
/// - A value fails validation
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref)?;
    parse_config(&contents)
}

/// Reads an optional environment variable. Unset is `None`; a non-UTF-8 value is an error.
fn env_var(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Loads the application configuration the binary runs with.
///
/// Reads the file named by `FLOCK_LEDGER_CONFIG` (or `config.toml`), falling back to
/// defaults when the file does not exist, then applies the `DATABASE_URL` override.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = env_var(CONFIG_PATH_VAR)?.unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let mut config = if Path::new(&path).exists() {
        load_config(&path)?
    } else {
        warn!("Config file {} not found, using defaults", path);
        AppConfig::default()
    };

    if let Some(url) = env_var("DATABASE_URL")? {
        debug!("DATABASE_URL overrides database.url");
        config.database.url = url;
    }

    config.validate()?;
    info!(
        plans = config.plans.len(),
        retry_attempts = config.retry.max_attempts,
        "Configuration loaded"
    );
    Ok(config)
}
