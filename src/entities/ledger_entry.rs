//! Ledger entry entity - One immutable debit or credit in a user's running ledger.
//!
//! Money is stored as signed integer minor units (hundredths). `sequence` is the entry's
//! 1-based position in the user's chain; `(user_id, sequence)` carries a unique index so two
//! writers chaining from the same head cannot both commit.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Money out; subtracts from the balance
    #[sea_orm(string_value = "debit")]
    Debit,
    /// Money in; adds to the balance
    #[sea_orm(string_value = "credit")]
    Credit,
}

/// Ledger entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning account
    pub user_id: String,
    /// Position in the owner's chain, starting at 1
    pub sequence: i64,
    /// Debit or credit
    pub entry_type: EntryType,
    /// Positive amount in minor units
    pub amount_minor: i64,
    /// Free-text label
    pub description: String,
    /// When the transaction happened; the ordering key
    pub occurred_at: DateTimeUtc,
    /// Running balance after this entry, in minor units
    pub balance_after_minor: i64,
    /// When the entry was written
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `LedgerEntry` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
