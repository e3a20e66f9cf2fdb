//! Membership entity - The connected-farmers / connected-dealers sets of a user.
//!
//! A row `(user_id, member_id)` means `member_id` is in `user_id`'s set. The pair is
//! unique, so adding an existing member is a no-op rather than a duplicate.

use super::user::Role;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Membership database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "memberships")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the set
    pub user_id: String,
    /// The connected party
    pub member_id: String,
    /// Role of the connected party (dealer rows form a farmer's dealer set, and vice versa)
    pub member_role: Role,
    /// When the link was made
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Membership and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each membership row belongs to the user owning the set
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
