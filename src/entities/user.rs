//! User entity - Accounts referenced by the ledger and connection workflows.
//!
//! The full account lifecycle (signup, profile, billing) lives outside this crate; only
//! the fields the workflows read are stored here. Ids are opaque strings issued by the
//! identity provider.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role an account plays on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Runs flocks and buys from dealers
    #[sea_orm(string_value = "farmer")]
    Farmer,
    /// Supplies feed, chicks and medicine to farmers
    #[sea_orm(string_value = "dealer")]
    Dealer,
    /// Platform operator
    #[sea_orm(string_value = "admin")]
    Admin,
}

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Identity-provider id of the account
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Farmer, dealer or admin
    pub role: Role,
    /// Subscription plan name, used by the dealer capacity policy
    pub plan: Option<String>,
    /// Human-readable name
    pub display_name: String,
    /// When the account was registered here
    pub created_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user has many ledger entries
    #[sea_orm(has_many = "super::ledger_entry::Entity")]
    LedgerEntries,
    /// One user has many membership rows
    #[sea_orm(has_many = "super::membership::Entity")]
    Memberships,
}

impl Related<super::ledger_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LedgerEntries.def()
    }
}

impl Related<super::membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
