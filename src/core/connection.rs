//! Connection business logic - The farmer/dealer approval handshake.
//!
//! A request creates a `Pending` connection after checking the pair has no pending or
//! approved connection and the dealer's plan has room. Resolution moves a `Pending`
//! connection to `Approved` or `Rejected` with a conditional update (`WHERE status =
//! 'pending'`), so only one concurrent resolution can win. On approval the same transaction
//! adds each party to the other's membership set; a reader never sees an approved status
//! with only one side linked.

use super::{
    retry::RetryPolicy,
    user::{add_member, require_user},
};
use crate::{
    config::PlanConfig,
    entities::{Connection, ConnectionStatus, Initiator, Role, connection, user},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Condition, PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Maximum approved farmers per dealer, keyed by plan name.
///
/// Dealers without a plan, or on a plan with no limit, are unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapacityPolicy {
    limits: HashMap<String, u32>,
}

impl CapacityPolicy {
    /// Builds the policy from the configured plans.
    #[must_use]
    pub fn from_plans(plans: &[PlanConfig]) -> Self {
        let limits = plans
            .iter()
            .filter_map(|plan| plan.max_farmers.map(|max| (plan.name.clone(), max)))
            .collect();
        Self { limits }
    }

    /// The limit that applies to a dealer on `plan`, if any.
    #[must_use]
    pub fn limit_for(&self, plan: Option<&str>) -> Option<u32> {
        plan.and_then(|name| self.limits.get(name).copied())
    }
}

/// Farmer/dealer connection workflow.
#[derive(Debug, Clone)]
pub struct ConnectionWorkflow {
    db: Arc<DatabaseConnection>,
    retry: RetryPolicy,
    capacity: CapacityPolicy,
}

impl ConnectionWorkflow {
    /// Creates the component over a shared store connection.
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        retry: RetryPolicy,
        capacity: CapacityPolicy,
    ) -> Self {
        Self {
            db,
            retry,
            capacity,
        }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Opens a `Pending` connection between a farmer and a dealer.
    ///
    /// The duplicate check, the capacity check and the insert share one transaction.
    ///
    /// # Errors
    /// * `InvalidArgument` - same user on both sides, or a party with the wrong role
    /// * `NotFound` - either user is not registered
    /// * `AlreadyConnected` / `RequestAlreadyPending` - the pair already has an active connection
    /// * `CapacityExceeded` - the dealer's plan has no room for another farmer
    #[instrument(skip(self))]
    pub async fn request_connection(
        &self,
        initiator: Initiator,
        farmer_uid: &str,
        dealer_uid: &str,
    ) -> Result<connection::Model> {
        if farmer_uid == dealer_uid {
            return Err(Error::invalid_argument(
                "farmer and dealer must be different accounts",
            ));
        }
        self.retry
            .run("request_connection", || {
                self.request_once(initiator, farmer_uid, dealer_uid)
            })
            .await
    }

    async fn request_once(
        &self,
        initiator: Initiator,
        farmer_uid: &str,
        dealer_uid: &str,
    ) -> Result<connection::Model> {
        let txn = self.db().begin().await?;

        let farmer = require_user(&txn, farmer_uid).await?;
        let dealer = require_user(&txn, dealer_uid).await?;
        ensure_role(&farmer, Role::Farmer)?;
        ensure_role(&dealer, Role::Dealer)?;

        let existing = Connection::find()
            .filter(connection::Column::FarmerUid.eq(farmer_uid))
            .filter(connection::Column::DealerUid.eq(dealer_uid))
            .all(&txn)
            .await?;
        if existing
            .iter()
            .any(|c| c.status == ConnectionStatus::Approved)
        {
            return Err(Error::AlreadyConnected {
                farmer_uid: farmer_uid.to_string(),
                dealer_uid: dealer_uid.to_string(),
            });
        }
        if let Some(pending) = existing
            .iter()
            .find(|c| c.status == ConnectionStatus::Pending)
        {
            return Err(Error::RequestAlreadyPending {
                connection_id: pending.id,
            });
        }

        self.ensure_capacity(&txn, &dealer).await?;

        let created = connection::ActiveModel {
            farmer_uid: Set(farmer_uid.to_string()),
            dealer_uid: Set(dealer_uid.to_string()),
            status: Set(ConnectionStatus::Pending),
            requested_by: Set(initiator),
            created_at: Set(Utc::now()),
            resolved_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        info!(connection_id = created.id, "Connection requested");
        Ok(created)
    }

    /// Moves a `Pending` connection to `decision` and, on approval, links both parties.
    ///
    /// Returns the connection as committed.
    ///
    /// # Errors
    /// * `InvalidArgument` - `decision` is `Pending`
    /// * `NotFound` - no connection with this id
    /// * `InvalidState` - the connection was already resolved, including by a concurrent call
    /// * `CapacityExceeded` - approving would take the dealer over its plan limit
    #[instrument(skip(self))]
    pub async fn resolve_connection(
        &self,
        connection_id: i64,
        decision: ConnectionStatus,
    ) -> Result<connection::Model> {
        if !decision.is_terminal() {
            return Err(Error::invalid_argument(
                "a connection can only be resolved to approved or rejected",
            ));
        }
        self.retry
            .run("resolve_connection", || {
                self.resolve_once(connection_id, decision)
            })
            .await
    }

    async fn resolve_once(
        &self,
        connection_id: i64,
        decision: ConnectionStatus,
    ) -> Result<connection::Model> {
        let txn = self.db().begin().await?;

        let current = Connection::find_by_id(connection_id)
            .one(&txn)
            .await?
            .ok_or_else(|| Error::not_found("connection", connection_id))?;
        if current.status != ConnectionStatus::Pending {
            return Err(Error::InvalidState {
                connection_id,
                status: current.status,
            });
        }

        if decision == ConnectionStatus::Approved {
            let dealer = require_user(&txn, &current.dealer_uid).await?;
            self.ensure_capacity(&txn, &dealer).await?;
        }

        let resolved_at = Utc::now();
        let updated = Connection::update_many()
            .set(connection::ActiveModel {
                status: Set(decision),
                resolved_at: Set(Some(resolved_at)),
                ..Default::default()
            })
            .filter(connection::Column::Id.eq(connection_id))
            .filter(connection::Column::Status.eq(ConnectionStatus::Pending))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            let status = Connection::find_by_id(connection_id)
                .one(&txn)
                .await?
                .map_or(current.status, |c| c.status);
            return Err(Error::InvalidState {
                connection_id,
                status,
            });
        }

        if decision == ConnectionStatus::Approved {
            add_member(&txn, &current.farmer_uid, &current.dealer_uid, Role::Dealer).await?;
            add_member(&txn, &current.dealer_uid, &current.farmer_uid, Role::Farmer).await?;
        }

        txn.commit().await?;
        info!(status = ?decision, "Connection resolved");

        Ok(connection::Model {
            status: decision,
            resolved_at: Some(resolved_at),
            ..current
        })
    }

    async fn ensure_capacity<C>(&self, db: &C, dealer: &user::Model) -> Result<()>
    where
        C: ConnectionTrait,
    {
        let Some(limit) = self.capacity.limit_for(dealer.plan.as_deref()) else {
            return Ok(());
        };

        let approved = Connection::find()
            .filter(connection::Column::DealerUid.eq(dealer.id.as_str()))
            .filter(connection::Column::Status.eq(ConnectionStatus::Approved))
            .count(db)
            .await?;
        debug!(dealer_uid = %dealer.id, approved, limit, "Checked dealer capacity");

        if approved >= u64::from(limit) {
            return Err(Error::CapacityExceeded {
                dealer_uid: dealer.id.clone(),
                limit,
            });
        }
        Ok(())
    }

    /// Finds a connection by id.
    pub async fn get_connection(&self, connection_id: i64) -> Result<Option<connection::Model>> {
        Connection::find_by_id(connection_id)
            .one(self.db())
            .await
            .map_err(Into::into)
    }

    /// Every connection the user is a party to, newest first.
    pub async fn connections_for_user(&self, user_id: &str) -> Result<Vec<connection::Model>> {
        Connection::find()
            .filter(
                Condition::any()
                    .add(connection::Column::FarmerUid.eq(user_id))
                    .add(connection::Column::DealerUid.eq(user_id)),
            )
            .order_by_desc(connection::Column::CreatedAt)
            .order_by_desc(connection::Column::Id)
            .all(self.db())
            .await
            .map_err(Into::into)
    }

    /// Pending requests opened by the other party and awaiting this user's decision.
    pub async fn pending_requests_for(&self, user_id: &str) -> Result<Vec<connection::Model>> {
        Connection::find()
            .filter(connection::Column::Status.eq(ConnectionStatus::Pending))
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(connection::Column::FarmerUid.eq(user_id))
                            .add(connection::Column::RequestedBy.eq(Initiator::Dealer)),
                    )
                    .add(
                        Condition::all()
                            .add(connection::Column::DealerUid.eq(user_id))
                            .add(connection::Column::RequestedBy.eq(Initiator::Farmer)),
                    ),
            )
            .order_by_desc(connection::Column::CreatedAt)
            .all(self.db())
            .await
            .map_err(Into::into)
    }
}

fn ensure_role(user: &user::Model, expected: Role) -> Result<()> {
    if user.role == expected {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!(
            "user {} is a {:?}, expected {expected:?}",
            user.id, user.role
        )))
    }
}
