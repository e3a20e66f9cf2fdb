//! Core business logic - framework-agnostic ledger and connection workflows.
//!
//! Components receive their store connection at construction; nothing here holds global
//! state or caches records between calls.

/// Farmer/dealer connection approval workflow
pub mod connection;
/// Balance-chained ledger
pub mod ledger;
/// Decimal to minor-unit conversion
pub mod money;
/// Bounded retry for conflicting transactions
pub mod retry;
/// User registry and membership sets
pub mod user;

use crate::config::AppConfig;
use connection::{CapacityPolicy, ConnectionWorkflow};
use ledger::LedgerAccount;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Both workflows sharing one store connection pool.
#[derive(Debug, Clone)]
pub struct Services {
    /// Running-balance ledger
    pub ledger: LedgerAccount,
    /// Farmer/dealer connection handshake
    pub connections: ConnectionWorkflow,
}

impl Services {
    /// Builds the workflows from the application configuration.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, config: &AppConfig) -> Self {
        Self {
            ledger: LedgerAccount::new(Arc::clone(&db), config.retry),
            connections: ConnectionWorkflow::new(
                db,
                config.retry,
                CapacityPolicy::from_plans(&config.plans),
            ),
        }
    }
}
