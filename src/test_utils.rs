//! Shared test utilities.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test records with sensible defaults.

use crate::{
    config::{
        AppConfig, DatabaseConfig, PlanConfig,
        database::{create_connection, create_tables},
    },
    core::{
        Services,
        connection::ConnectionWorkflow,
        ledger::LedgerAccount,
        retry::RetryPolicy,
        user::{NewUser, register_user},
    },
    entities::{self, Role},
    errors::Result,
};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Plan name whose dealers may hold a single approved farmer.
pub const TEST_LIMITED_PLAN: &str = "trial";

/// Installs a test-writer subscriber once per process.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<Arc<DatabaseConnection>> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    create_tables(&db).await?;
    Ok(Arc::new(db))
}

/// Creates a WAL-mode `SQLite` file database in `dir` with a pool of `max_connections`.
///
/// Unlike the in-memory database, transactions on different pooled connections overlap
/// here, so concurrent writers really race.
pub async fn setup_file_db(dir: &Path, max_connections: u32) -> Result<Arc<DatabaseConnection>> {
    let config = DatabaseConfig {
        url: format!(
            "sqlite://{}?mode=rwc",
            dir.join("flock_ledger.sqlite").display()
        ),
        sql_logging: false,
        max_connections: Some(max_connections),
    };
    let db = create_connection(&config).await?;
    db.execute_unprepared("PRAGMA journal_mode=WAL").await?;
    create_tables(&db).await?;
    Ok(Arc::new(db))
}

/// Retry budget for tests where many writers contend for one file database.
pub const fn contended_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 25,
        backoff_ms: 2,
    }
}

/// Configuration used by the test services: no backoff, one limited plan.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.retry.backoff_ms = 0;
    config.plans = vec![PlanConfig {
        name: TEST_LIMITED_PLAN.to_string(),
        max_farmers: Some(1),
    }];
    config
}

/// Both workflows over `db` with the test configuration.
pub fn test_services(db: &Arc<DatabaseConnection>) -> Services {
    Services::new(Arc::clone(db), &test_config())
}

/// The ledger component from [`test_services`].
pub fn test_ledger(db: &Arc<DatabaseConnection>) -> LedgerAccount {
    test_services(db).ledger
}

/// The connection workflow from [`test_services`].
pub fn test_workflow(db: &Arc<DatabaseConnection>) -> ConnectionWorkflow {
    test_services(db).connections
}

/// Registers a user with no plan; the display name mirrors the id.
pub async fn create_test_user(
    db: &DatabaseConnection,
    id: &str,
    role: Role,
) -> Result<entities::user::Model> {
    register_user(
        db,
        NewUser {
            id: id.to_string(),
            role,
            plan: None,
            display_name: id.to_string(),
        },
    )
    .await
}

/// Registers a dealer on the given plan.
pub async fn create_dealer_on_plan(
    db: &DatabaseConnection,
    id: &str,
    plan: &str,
) -> Result<entities::user::Model> {
    register_user(
        db,
        NewUser {
            id: id.to_string(),
            role: Role::Dealer,
            plan: Some(plan.to_string()),
            display_name: id.to_string(),
        },
    )
    .await
}

/// Sets up a database holding one registered user.
/// Returns (db, user) for common test scenarios.
pub async fn setup_with_user(
    id: &str,
    role: Role,
) -> Result<(Arc<DatabaseConnection>, entities::user::Model)> {
    let db = setup_test_db().await?;
    let user = create_test_user(&db, id, role).await?;
    Ok((db, user))
}
