//! User registry and membership sets.
//!
//! Accounts are owned by the identity provider; this module keeps the minimal record the
//! workflows need (role and plan) and the connected-farmers / connected-dealers sets that
//! connection approval writes to.

use crate::{
    entities::{Membership, Role, User, membership, user},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

/// Fields needed to register an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Identity-provider id
    pub id: String,
    /// Farmer, dealer or admin
    pub role: Role,
    /// Subscription plan name, if any
    pub plan: Option<String>,
    /// Human-readable name
    pub display_name: String,
}

/// Registers an account so the workflows can reference it.
///
/// Fails with `InvalidArgument` if the id is blank or already registered.
#[instrument(skip(db, new_user), fields(user_id = %new_user.id, role = ?new_user.role))]
pub async fn register_user<C>(db: &C, new_user: NewUser) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    let id = new_user.id.trim().to_string();
    if id.is_empty() {
        return Err(Error::invalid_argument("user id cannot be empty"));
    }

    if User::find_by_id(id.clone()).one(db).await?.is_some() {
        return Err(Error::invalid_argument(format!(
            "user {id} is already registered"
        )));
    }

    let model = user::ActiveModel {
        id: Set(id),
        role: Set(new_user.role),
        plan: Set(new_user.plan),
        display_name: Set(new_user.display_name),
        created_at: Set(chrono::Utc::now()),
    }
    .insert(db)
    .await?;

    info!("Registered user");
    Ok(model)
}

/// Finds a user by id.
pub async fn get_user<C>(db: &C, user_id: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a user by id, failing with `NotFound` when absent.
pub async fn require_user<C>(db: &C, user_id: &str) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    get_user(db, user_id)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))
}

/// Adds `member_id` to `user_id`'s membership set. Adding an existing member is a no-op.
///
/// Meant to run inside the caller's transaction.
pub async fn add_member<C>(db: &C, user_id: &str, member_id: &str, member_role: Role) -> Result<()>
where
    C: ConnectionTrait,
{
    let existing = Membership::find()
        .filter(membership::Column::UserId.eq(user_id))
        .filter(membership::Column::MemberId.eq(member_id))
        .one(db)
        .await?;
    if existing.is_some() {
        debug!(user_id, member_id, "Member already present");
        return Ok(());
    }

    membership::ActiveModel {
        user_id: Set(user_id.to_string()),
        member_id: Set(member_id.to_string()),
        member_role: Set(member_role),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Ids in `user_id`'s membership set whose role is `member_role`.
pub async fn members_with_role<C>(
    db: &C,
    user_id: &str,
    member_role: Role,
) -> Result<BTreeSet<String>>
where
    C: ConnectionTrait,
{
    let rows = Membership::find()
        .filter(membership::Column::UserId.eq(user_id))
        .filter(membership::Column::MemberRole.eq(member_role))
        .order_by_asc(membership::Column::MemberId)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|row| row.member_id).collect())
}

/// The farmer's `connectedDealers` set.
pub async fn connected_dealers<C>(db: &C, farmer_uid: &str) -> Result<BTreeSet<String>>
where
    C: ConnectionTrait,
{
    members_with_role(db, farmer_uid, Role::Dealer).await
}

/// The dealer's `connectedFarmers` set.
pub async fn connected_farmers<C>(db: &C, dealer_uid: &str) -> Result<BTreeSet<String>>
where
    C: ConnectionTrait,
{
    members_with_role(db, dealer_uid, Role::Farmer).await
}
