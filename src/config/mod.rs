/// Application settings loaded from `config.toml` and the environment
pub mod app;

/// Database connection and schema management
pub mod database;

pub use app::{AppConfig, DatabaseConfig, PlanConfig, load_app_configuration, load_config};
