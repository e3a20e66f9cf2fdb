//! Ledger business logic - Append-only, balance-chained financial entries per user.
//!
//! Each entry records the running balance immediately after it is applied. An append reads
//! the user's most recent entry (the head), computes the new balance from it, and inserts the
//! next entry in the same store transaction. The new entry takes the head's `sequence + 1`;
//! the unique `(user_id, sequence)` index turns a second writer chaining from the same head
//! into a `TransactionConflict`, and the retry policy re-runs the append from a fresh read.
//! Balances are never cached between calls.

use super::{
    money::{from_minor_units, to_minor_units},
    retry::RetryPolicy,
    user::require_user,
};
use crate::{
    entities::{EntryType, ledger_entry},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, SqlErr, TransactionTrait, prelude::*};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Request to append one entry.
#[derive(Debug, Clone)]
pub struct NewEntry {
    /// Owning account; must already be registered
    pub user_id: String,
    /// Free-text label, must not be blank
    pub description: String,
    /// Strictly positive amount with at most two decimal places
    pub amount: Decimal,
    /// Debit or credit
    pub entry_type: EntryType,
    /// When the transaction happened; defaults to the time of the append
    pub date: Option<DateTime<Utc>>,
}

/// A committed ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    /// Store-assigned id
    pub id: i64,
    /// Owning account
    pub user_id: String,
    /// Position in the owner's chain, starting at 1
    pub sequence: i64,
    /// Debit or credit
    pub entry_type: EntryType,
    /// Positive amount
    pub amount: Decimal,
    /// Free-text label
    pub description: String,
    /// When the transaction happened
    pub date: DateTime<Utc>,
    /// Running balance after this entry
    pub balance_after: Decimal,
}

impl LedgerEntry {
    /// The amount with its direction applied: credits positive, debits negative.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Credit => self.amount,
            EntryType::Debit => -self.amount,
        }
    }
}

impl From<ledger_entry::Model> for LedgerEntry {
    fn from(model: ledger_entry::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            sequence: model.sequence,
            entry_type: model.entry_type,
            amount: from_minor_units(model.amount_minor),
            description: model.description,
            date: model.occurred_at,
            balance_after: from_minor_units(model.balance_after_minor),
        }
    }
}

/// Result of replaying a user's chain from zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainAudit {
    /// Number of entries replayed
    pub entries: usize,
    /// Balance obtained by replaying every signed amount from zero
    pub replayed_balance: Decimal,
    /// First entry whose stored balance disagrees with the replay
    pub first_mismatch: Option<i64>,
}

impl ChainAudit {
    /// True when every stored balance matches the replay.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.first_mismatch.is_none()
    }
}

/// A validated append, in storage units.
#[derive(Debug, Clone)]
pub(crate) struct EntryDraft {
    pub(crate) user_id: String,
    pub(crate) description: String,
    pub(crate) amount_minor: i64,
    pub(crate) entry_type: EntryType,
    pub(crate) date: Option<DateTime<Utc>>,
}

impl EntryDraft {
    pub(crate) fn validate(entry: NewEntry) -> Result<Self> {
        if entry.amount <= Decimal::ZERO {
            return Err(Error::invalid_argument(format!(
                "amount must be positive, got {}",
                entry.amount
            )));
        }
        let description = entry.description.trim().to_string();
        if description.is_empty() {
            return Err(Error::invalid_argument("description cannot be empty"));
        }
        Ok(Self {
            user_id: entry.user_id,
            description,
            amount_minor: to_minor_units(entry.amount)?,
            entry_type: entry.entry_type,
            date: entry.date,
        })
    }

    const fn signed_minor(&self) -> i64 {
        match self.entry_type {
            EntryType::Credit => self.amount_minor,
            EntryType::Debit => -self.amount_minor,
        }
    }
}

/// Builds the entry that follows `head` in the chain.
///
/// An omitted date resolves to `now`, but never earlier than the head. An explicit date
/// earlier than the head is rejected.
pub(crate) fn chain_entry(
    head: Option<&ledger_entry::Model>,
    draft: &EntryDraft,
    now: DateTime<Utc>,
) -> Result<ledger_entry::ActiveModel> {
    let (prior_balance, prior_sequence) =
        head.map_or((0, 0), |h| (h.balance_after_minor, h.sequence));

    let occurred_at = match (draft.date, head) {
        (Some(date), Some(h)) if date < h.occurred_at => {
            return Err(Error::invalid_argument(format!(
                "date {date} is earlier than the latest entry ({})",
                h.occurred_at
            )));
        }
        (Some(date), _) => date,
        (None, Some(h)) => now.max(h.occurred_at),
        (None, None) => now,
    };

    let balance_after = prior_balance
        .checked_add(draft.signed_minor())
        .ok_or_else(|| Error::invalid_argument("balance would overflow"))?;

    Ok(ledger_entry::ActiveModel {
        user_id: Set(draft.user_id.clone()),
        sequence: Set(prior_sequence + 1),
        entry_type: Set(draft.entry_type),
        amount_minor: Set(draft.amount_minor),
        description: Set(draft.description.clone()),
        occurred_at: Set(occurred_at),
        balance_after_minor: Set(balance_after),
        created_at: Set(now),
        ..Default::default()
    })
}

/// The user's most recent entry, by date and then chain position.
pub(crate) async fn latest_entry<C>(db: &C, user_id: &str) -> Result<Option<ledger_entry::Model>>
where
    C: ConnectionTrait,
{
    ledger_entry::Entity::find()
        .filter(ledger_entry::Column::UserId.eq(user_id))
        .order_by_desc(ledger_entry::Column::OccurredAt)
        .order_by_desc(ledger_entry::Column::Sequence)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Inserts a chained entry. Losing the race for its `sequence` is a conflict.
pub(crate) async fn insert_chained<C>(
    db: &C,
    entry: ledger_entry::ActiveModel,
    user_id: &str,
) -> Result<ledger_entry::Model>
where
    C: ConnectionTrait,
{
    entry.insert(db).await.map_err(|err| match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => Error::TransactionConflict {
            resource: format!("ledger of {user_id}"),
        },
        _ => err.into(),
    })
}

/// Per-user running-balance ledger.
#[derive(Debug, Clone)]
pub struct LedgerAccount {
    db: Arc<DatabaseConnection>,
    retry: RetryPolicy,
}

impl LedgerAccount {
    /// Creates the component over a shared store connection.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Appends an entry and records the balance after it.
    ///
    /// # Errors
    /// * `InvalidArgument` - non-positive amount, sub-cent precision, blank description, or a
    ///   date earlier than the latest entry
    /// * `NotFound` - the user is not registered
    /// * `TransactionConflict` - still contended after the retry budget
    /// * `StorageUnavailable` - the store cannot be reached
    #[instrument(skip(self, entry), fields(user_id = %entry.user_id, entry_type = ?entry.entry_type))]
    pub async fn append_entry(&self, entry: NewEntry) -> Result<LedgerEntry> {
        let draft = EntryDraft::validate(entry)?;
        let draft = &draft;
        self.retry
            .run("append_entry", || self.append_once(draft))
            .await
    }

    async fn append_once(&self, draft: &EntryDraft) -> Result<LedgerEntry> {
        let txn = self.db().begin().await?;

        require_user(&txn, &draft.user_id).await?;
        let head = latest_entry(&txn, &draft.user_id).await?;
        let next = chain_entry(head.as_ref(), draft, Utc::now())?;
        let model = insert_chained(&txn, next, &draft.user_id).await?;

        txn.commit().await?;

        let entry = LedgerEntry::from(model);
        info!(
            entry_id = entry.id,
            sequence = entry.sequence,
            amount = %entry.amount,
            balance_after = %entry.balance_after,
            "Appended ledger entry"
        );
        Ok(entry)
    }

    /// All entries for the user, newest first.
    pub async fn list_entries(&self, user_id: &str) -> Result<Vec<LedgerEntry>> {
        let entries = ledger_entry::Entity::find()
            .filter(ledger_entry::Column::UserId.eq(user_id))
            .order_by_desc(ledger_entry::Column::OccurredAt)
            .order_by_desc(ledger_entry::Column::Sequence)
            .all(self.db())
            .await?;
        debug!(user_id, count = entries.len(), "Listed ledger entries");
        Ok(entries.into_iter().map(LedgerEntry::from).collect())
    }

    /// Balance after the latest entry, zero for an empty ledger.
    pub async fn current_balance(&self, user_id: &str) -> Result<Decimal> {
        Ok(latest_entry(self.db(), user_id)
            .await?
            .map_or(Decimal::ZERO, |head| from_minor_units(head.balance_after_minor)))
    }

    /// Replays the user's entries oldest-first and checks every stored balance.
    pub async fn audit_chain(&self, user_id: &str) -> Result<ChainAudit> {
        let mut entries = self.list_entries(user_id).await?;
        entries.reverse();

        let mut balance = Decimal::ZERO;
        let mut first_mismatch = None;
        for entry in &entries {
            balance += entry.signed_amount();
            if first_mismatch.is_none() && entry.balance_after != balance {
                first_mismatch = Some(entry.id);
            }
        }

        Ok(ChainAudit {
            entries: entries.len(),
            replayed_balance: balance,
            first_mismatch,
        })
    }
}
