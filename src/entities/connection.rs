//! Connection entity - A farmer/dealer link request and its resolution.
//!
//! `Pending` is the only initial status. `Approved` and `Rejected` are terminal.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Awaiting a decision
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Both membership sets were linked
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Declined; nothing was linked
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl ConnectionStatus {
    /// `Approved` and `Rejected` accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Which side of the pair opened the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum Initiator {
    /// Requested by the farmer
    #[sea_orm(string_value = "farmer")]
    Farmer,
    /// Requested by the dealer
    #[sea_orm(string_value = "dealer")]
    Dealer,
}

/// Connection database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "connections")]
pub struct Model {
    /// Unique identifier for the connection
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Farmer side of the pair
    pub farmer_uid: String,
    /// Dealer side of the pair
    pub dealer_uid: String,
    /// Current lifecycle state
    pub status: ConnectionStatus,
    /// Which party asked
    pub requested_by: Initiator,
    /// When the request was made
    pub created_at: DateTimeUtc,
    /// When the request left `Pending`
    pub resolved_at: Option<DateTimeUtc>,
}

/// `Connection` has no declared relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
