//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. The composite unique indexes the
//! workflows rely on for conflict detection are created here as well:
//!
//! * `(user_id, sequence)` on `ledger_entries`, so two appends chained from the same head
//!   cannot both commit
//! * `(user_id, member_id)` on `memberships`, giving each membership list set semantics
//!
//! Every statement is `IF NOT EXISTS`, so bootstrapping an existing database is a no-op.

use super::app::DatabaseConfig;
use crate::entities::{Connection, LedgerEntry, Membership, User, ledger_entry, membership};
use crate::errors::Result;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info, instrument};

/// Establishes a connection to the database described by `config`.
///
/// Fails with [`crate::errors::Error::StorageUnavailable`] when the store cannot be reached.
#[instrument(skip(config), fields(url = %config.url, max_connections = ?config.max_connections))]
pub async fn create_connection(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(config.url.clone());
    options.sqlx_logging(config.sql_logging);
    if let Some(max) = config.max_connections {
        options.max_connections(max);
    }

    let db = Database::connect(options).await?;
    info!("Database connection established");
    Ok(db)
}

/// Creates all tables and indexes.
///
/// `users` is created first because the other tables reference it.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tables = [
        schema.create_table_from_entity(User),
        schema.create_table_from_entity(LedgerEntry),
        schema.create_table_from_entity(Connection),
        schema.create_table_from_entity(Membership),
    ];
    for mut table in tables {
        table.if_not_exists();
        db.execute(builder.build(&table)).await?;
    }

    for index in unique_indexes() {
        db.execute(builder.build(&index)).await?;
    }

    debug!("Tables and indexes ensured");
    Ok(())
}

fn unique_indexes() -> [IndexCreateStatement; 2] {
    [
        Index::create()
            .if_not_exists()
            .name("idx_ledger_entries_user_sequence")
            .table(LedgerEntry)
            .col(ledger_entry::Column::UserId)
            .col(ledger_entry::Column::Sequence)
            .unique()
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_memberships_user_member")
            .table(Membership)
            .col(membership::Column::UserId)
            .col(membership::Column::MemberId)
            .unique()
            .to_owned(),
    ]
}
